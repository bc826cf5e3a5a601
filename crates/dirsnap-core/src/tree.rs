//! Scanned tree container and statistics.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::ScanConfig;
use crate::error::ScanWarning;
use crate::node::SnapshotNode;

/// Counters collected during one scan.
///
/// `empty_files` and `scan_errors` are diagnostics only; they are never
/// stored in the snapshot itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanStats {
    /// Total size in bytes.
    pub total_size: u64,
    /// Total number of files.
    pub total_files: u64,
    /// Total number of directories, including the root.
    pub total_dirs: u64,
    /// Files with a length of zero.
    pub empty_files: u64,
    /// Directory listings or entries that could not be read.
    pub scan_errors: u64,
    /// Symlinks and special files left out of the tree.
    pub skipped_entries: u64,
}

impl ScanStats {
    /// Create new empty stats.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a file.
    pub fn record_file(&mut self, size: u64) {
        self.total_files += 1;
        self.total_size += size;
        if size == 0 {
            self.empty_files += 1;
        }
    }

    /// Record a directory.
    pub fn record_dir(&mut self) {
        self.total_dirs += 1;
    }

    /// Record an unreadable listing or entry.
    pub fn record_error(&mut self) {
        self.scan_errors += 1;
    }

    /// Record an entry that was deliberately left out.
    pub fn record_skipped(&mut self) {
        self.skipped_entries += 1;
    }

    /// Fold the counters of another branch into these.
    pub fn merge(&mut self, other: &ScanStats) {
        self.total_size += other.total_size;
        self.total_files += other.total_files;
        self.total_dirs += other.total_dirs;
        self.empty_files += other.empty_files;
        self.scan_errors += other.scan_errors;
        self.skipped_entries += other.skipped_entries;
    }
}

/// Result of one scan: the snapshot tree plus run diagnostics.
#[derive(Debug, Clone, Serialize)]
pub struct ScannedTree {
    /// Root node of the tree.
    pub root: SnapshotNode,

    /// Root path that was scanned.
    pub root_path: PathBuf,

    /// When this scan started.
    pub scanned_at: DateTime<Utc>,

    /// Duration of the scan.
    pub scan_duration: Duration,

    /// Scan configuration used.
    pub config: ScanConfig,

    /// Summary statistics.
    pub stats: ScanStats,

    /// Warnings encountered during scan.
    pub warnings: Vec<ScanWarning>,
}

impl ScannedTree {
    /// Get the total size of the tree.
    pub fn total_size(&self) -> u64 {
        self.root.total_size()
    }

    /// Get the total number of files.
    pub fn total_files(&self) -> u64 {
        self.root.file_count()
    }

    /// Check if there were any warnings during scanning.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Take the root node, dropping diagnostics.
    pub fn into_root(self) -> SnapshotNode {
        self.root
    }
}
