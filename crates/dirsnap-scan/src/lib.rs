//! File system scanning engine for dirsnap.
//!
//! This crate walks a directory tree and builds a [`SnapshotNode`] tree with
//! aggregated sizes, file counts and modification times.
//!
//! # Overview
//!
//! - **Best effort**: an unreadable directory or entry is logged, counted in
//!   [`ScanStats::scan_errors`] and contributes nothing; it never aborts the
//!   scan. Only a root that is missing or not a directory is an error.
//! - **Parallel**: sibling subdirectories are scanned on rayon and joined at
//!   their parent before its totals are computed.
//! - **Ordered**: every directory's children are sorted by size, largest first.
//!
//! # Example
//!
//! ```rust,no_run
//! use dirsnap_scan::{ScanConfig, SnapshotScanner};
//!
//! let config = ScanConfig::new("/path/to/scan");
//! let scanner = SnapshotScanner::new();
//! let tree = scanner.scan(&config).unwrap();
//!
//! println!("Total size: {} bytes", tree.total_size());
//! println!("Empty files: {}", tree.stats.empty_files);
//! println!("Scan errors: {}", tree.stats.scan_errors);
//! ```
//!
//! # Progress Monitoring
//!
//! ```rust,no_run
//! use dirsnap_scan::{ScanConfig, SnapshotScanner};
//!
//! let scanner = SnapshotScanner::new();
//! let mut progress_rx = scanner.subscribe();
//!
//! std::thread::spawn(move || {
//!     while let Ok(progress) = progress_rx.blocking_recv() {
//!         println!("Scanned {} files", progress.files_scanned);
//!     }
//! });
//! ```

mod progress;
mod scanner;

pub use progress::ScanProgress;
pub use scanner::{DirListing, SnapshotScanner};

// Re-export core types for convenience
pub use dirsnap_core::{
    ScanConfig, ScanError, ScanStats, ScanWarning, ScannedTree, SnapshotNode, WarningKind,
};
