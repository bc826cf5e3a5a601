//! Snapshot comparison for dirsnap.
//!
//! Comparing two snapshots happens in two steps:
//!
//! 1. [`TreeComparer::compare`] walks both trees, matching children by name,
//!    and annotates every node with a [`NodeStatus`] and size and file count
//!    deltas.
//! 2. [`reduce`] prunes the result so only the paths leading to a change are
//!    left.
//!
//! ```rust,no_run
//! use dirsnap_diff::compare_and_reduce;
//! use dirsnap_scan::{ScanConfig, SnapshotScanner};
//!
//! let scanner = SnapshotScanner::new();
//! let before = scanner.scan(&ScanConfig::new("/data")).unwrap();
//! // ... time passes ...
//! let after = scanner.scan(&ScanConfig::new("/data")).unwrap();
//!
//! let report = compare_and_reduce(Some(&before.root), Some(&after.root)).unwrap();
//! println!("{} ({:+} bytes)", report.status, report.total_size_diff);
//! ```
//!
//! A name that is a file in one snapshot and a directory in the other aborts
//! the comparison unless [`KindMismatchPolicy::SplitRemovedAdded`] is set.

mod compare;
mod error;
mod reduce;
mod report;

pub use compare::{
    CompareConfig, CompareConfigBuilder, KindMismatchPolicy, TreeComparer, compare,
    compare_and_reduce,
};
pub use error::CompareError;
pub use reduce::reduce;
pub use report::{CompareReportNode, NodeStatus};

// Re-export core types
pub use dirsnap_core::SnapshotNode;
