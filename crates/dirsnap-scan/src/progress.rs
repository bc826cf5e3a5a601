//! Scan progress reporting.
//!
//! Progress is published on a broadcast channel while a scan runs; see
//! [`SnapshotScanner::subscribe`](crate::SnapshotScanner::subscribe).

use std::path::PathBuf;
use std::time::Duration;

/// Running totals of a scan in flight.
#[derive(Debug, Clone, Default)]
pub struct ScanProgress {
    /// Directories listed so far.
    pub dirs_scanned: u64,
    /// Files recorded so far.
    pub files_scanned: u64,
    /// Bytes in the files recorded so far.
    pub bytes_scanned: u64,
    /// Unreadable directories and entries so far.
    pub errors_count: u64,
    /// Directory listed most recently.
    pub current_path: PathBuf,
    /// Time since the scan started.
    pub elapsed: Duration,
    /// Set on the last update of a scan only.
    pub finished: bool,
}

impl ScanProgress {
    /// Directories listed per second.
    pub fn dirs_per_second(&self) -> f64 {
        per_second(self.dirs_scanned, self.elapsed)
    }

    /// Bytes recorded per second.
    pub fn bytes_per_second(&self) -> f64 {
        per_second(self.bytes_scanned, self.elapsed)
    }
}

fn per_second(count: u64, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs > 0.0 { count as f64 / secs } else { 0.0 }
}
