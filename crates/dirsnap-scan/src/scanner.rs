//! Recursive, parallel directory scanner.

use std::fs::{self, DirEntry, Metadata};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use rayon::prelude::*;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use dirsnap_core::{
    ScanConfig, ScanError, ScanStats, ScanWarning, ScannedTree, SnapshotNode, snapshot_time,
};

use crate::progress::ScanProgress;

/// Outcome of listing one directory.
///
/// A listing either succeeds as a whole or is treated as empty; the caller
/// decides how to account for the failure.
#[derive(Debug)]
pub enum DirListing {
    /// All entries of the directory.
    Entries(Vec<DirEntry>),
    /// The directory could not be listed.
    Unreadable(io::Error),
}

impl DirListing {
    /// List the entries of `path`.
    pub fn read(path: &Path) -> Self {
        match fs::read_dir(path).and_then(|entries| entries.collect::<io::Result<Vec<_>>>()) {
            Ok(entries) => Self::Entries(entries),
            Err(err) => Self::Unreadable(err),
        }
    }
}

/// Best-effort scanner producing [`SnapshotNode`] trees.
///
/// Unreadable directories and entries below the root are logged, counted and
/// contribute nothing to the tree. Sibling subdirectories are scanned in
/// parallel on rayon.
pub struct SnapshotScanner {
    progress_tx: broadcast::Sender<ScanProgress>,
}

impl SnapshotScanner {
    /// Create a new scanner.
    pub fn new() -> Self {
        let (progress_tx, _) = broadcast::channel(100);
        Self { progress_tx }
    }

    /// Subscribe to scan progress updates.
    pub fn subscribe(&self) -> broadcast::Receiver<ScanProgress> {
        self.progress_tx.subscribe()
    }

    /// Perform a scan of the configured root.
    pub fn scan(&self, config: &ScanConfig) -> Result<ScannedTree, ScanError> {
        let start = Instant::now();
        let scanned_at = Utc::now();
        let root_path = config
            .root
            .canonicalize()
            .map_err(|e| ScanError::io(&config.root, e))?;

        let root_metadata = fs::metadata(&root_path).map_err(|e| ScanError::io(&root_path, e))?;
        if !root_metadata.is_dir() {
            return Err(ScanError::NotADirectory { path: root_path });
        }

        let run = ScanRun {
            config,
            progress_tx: &self.progress_tx,
            start,
            dirs_seen: AtomicU64::new(0),
            files_seen: AtomicU64::new(0),
            bytes_seen: AtomicU64::new(0),
            errors_seen: AtomicU64::new(0),
        };

        let name = root_name(&root_path);
        let modified = modified_time(&root_metadata);

        let branch = match config.threads {
            0 => run.scan_dir(&root_path, name, modified, None),
            n => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(n)
                    .build()
                    .map_err(|e| ScanError::ThreadPool {
                        message: e.to_string(),
                    })?;
                pool.install(|| run.scan_dir(&root_path, name, modified, None))
            }
        };

        run.publish(&root_path, true);

        let scan_duration = start.elapsed();
        debug!(
            path = %root_path.display(),
            files = branch.stats.total_files,
            dirs = branch.stats.total_dirs,
            errors = branch.stats.scan_errors,
            empty_files = branch.stats.empty_files,
            elapsed_ms = scan_duration.as_millis() as u64,
            "scan finished"
        );

        Ok(ScannedTree {
            root: branch.node,
            root_path,
            scanned_at,
            scan_duration,
            config: config.clone(),
            stats: branch.stats,
            warnings: branch.warnings,
        })
    }
}

impl Default for SnapshotScanner {
    fn default() -> Self {
        Self::new()
    }
}

/// A scanned subtree with the diagnostics gathered while scanning it.
struct Branch {
    node: SnapshotNode,
    stats: ScanStats,
    warnings: Vec<ScanWarning>,
}

/// Canonical paths of the directories from the root down to the one being
/// scanned, innermost first.
struct Ancestry<'p> {
    path: &'p Path,
    parent: Option<&'p Ancestry<'p>>,
}

impl Ancestry<'_> {
    fn contains(&self, path: &Path) -> bool {
        let mut link = Some(self);
        while let Some(current) = link {
            if current.path == path {
                return true;
            }
            link = current.parent;
        }
        false
    }
}

/// State shared by every branch of one scan call.
struct ScanRun<'a> {
    config: &'a ScanConfig,
    progress_tx: &'a broadcast::Sender<ScanProgress>,
    start: Instant,
    dirs_seen: AtomicU64,
    files_seen: AtomicU64,
    bytes_seen: AtomicU64,
    errors_seen: AtomicU64,
}

impl ScanRun<'_> {
    /// Scan one directory and, in parallel, all of its subdirectories.
    ///
    /// `path` is canonical, so a followed symlink is compared against the
    /// branch by its resolved target.
    fn scan_dir(
        &self,
        path: &Path,
        name: CompactString,
        modified: DateTime<Utc>,
        parent: Option<&Ancestry<'_>>,
    ) -> Branch {
        let ancestry = Ancestry { path, parent };
        let mut stats = ScanStats::new();
        let mut warnings = Vec::new();
        let mut files = Vec::new();
        let mut subdirs: Vec<(PathBuf, CompactString, DateTime<Utc>)> = Vec::new();

        stats.record_dir();

        match DirListing::read(path) {
            DirListing::Unreadable(err) => {
                warn!(path = %path.display(), error = %err, "can't list directory");
                stats.record_error();
                warnings.push(ScanWarning::unreadable_dir(path, &err));
            }
            DirListing::Entries(entries) => {
                for entry in entries {
                    let entry_path = entry.path();
                    let (metadata, via_symlink) = match self.entry_metadata(&entry) {
                        Ok(Some(found)) => found,
                        Ok(None) => {
                            stats.record_skipped();
                            continue;
                        }
                        Err(err) => {
                            warn!(path = %entry_path.display(), error = %err, "can't read metadata");
                            stats.record_error();
                            warnings.push(ScanWarning::metadata_error(&entry_path, &err));
                            continue;
                        }
                    };

                    let entry_name = CompactString::new(entry.file_name().to_string_lossy());
                    let entry_modified = modified_time(&metadata);

                    if metadata.is_dir() {
                        let sub_path = if via_symlink {
                            match fs::canonicalize(&entry_path) {
                                Ok(target) if ancestry.contains(&target) => {
                                    debug!(
                                        path = %entry_path.display(),
                                        target = %target.display(),
                                        "skipping symlink loop"
                                    );
                                    stats.record_skipped();
                                    warnings.push(ScanWarning::symlink_loop(&entry_path, &target));
                                    continue;
                                }
                                Ok(target) => target,
                                Err(err) => {
                                    warn!(path = %entry_path.display(), error = %err, "can't resolve symlink");
                                    stats.record_error();
                                    warnings.push(ScanWarning::metadata_error(&entry_path, &err));
                                    continue;
                                }
                            }
                        } else {
                            entry_path
                        };
                        subdirs.push((sub_path, entry_name, entry_modified));
                    } else if metadata.is_file() {
                        let size = metadata.len();
                        stats.record_file(size);
                        files.push(SnapshotNode::file(entry_name, size, entry_modified));
                    } else {
                        stats.record_skipped();
                    }
                }
            }
        }

        self.record_progress(path, &stats);

        let branches: Vec<Branch> = subdirs
            .into_par_iter()
            .map(|(sub_path, sub_name, sub_modified)| {
                self.scan_dir(&sub_path, sub_name, sub_modified, Some(&ancestry))
            })
            .collect();

        let mut children = Vec::with_capacity(branches.len() + files.len());
        for branch in branches {
            stats.merge(&branch.stats);
            warnings.extend(branch.warnings);
            children.push(branch.node);
        }
        children.extend(files);

        // Sort children by size (descending)
        children.sort_by(|a, b| b.total_size().cmp(&a.total_size()));

        Branch {
            node: SnapshotNode::directory(name, modified, children),
            stats,
            warnings,
        }
    }

    /// Metadata for an entry and whether it was reached through a symlink,
    /// or `None` if the entry is left out of the tree.
    fn entry_metadata(&self, entry: &DirEntry) -> io::Result<Option<(Metadata, bool)>> {
        let file_type = entry.file_type()?;
        if file_type.is_symlink() {
            if self.config.follow_symlinks {
                return fs::metadata(entry.path()).map(|m| Some((m, true)));
            }
            return Ok(None);
        }
        entry.metadata().map(|m| Some((m, false)))
    }

    /// Add one directory's own counters and publish progress periodically.
    ///
    /// An interval of 0 leaves only the final update.
    fn record_progress(&self, path: &Path, own: &ScanStats) {
        self.files_seen.fetch_add(own.total_files, Ordering::Relaxed);
        self.bytes_seen.fetch_add(own.total_size, Ordering::Relaxed);
        self.errors_seen.fetch_add(own.scan_errors, Ordering::Relaxed);

        let count = self.dirs_seen.fetch_add(1, Ordering::Relaxed) + 1;
        if count.checked_rem(self.config.progress_interval) == Some(0) {
            self.publish(path, false);
        }
    }

    fn publish(&self, current_path: &Path, finished: bool) {
        // No receivers is fine
        let _ = self.progress_tx.send(ScanProgress {
            files_scanned: self.files_seen.load(Ordering::Relaxed),
            dirs_scanned: self.dirs_seen.load(Ordering::Relaxed),
            bytes_scanned: self.bytes_seen.load(Ordering::Relaxed),
            current_path: current_path.to_path_buf(),
            errors_count: self.errors_seen.load(Ordering::Relaxed),
            elapsed: self.start.elapsed(),
            finished,
        });
    }
}

/// Name of the root node: its final component, or the whole path for `/`.
fn root_name(path: &Path) -> CompactString {
    path.file_name()
        .map(|n| CompactString::new(n.to_string_lossy()))
        .unwrap_or_else(|| CompactString::new(path.to_string_lossy()))
}

fn modified_time(metadata: &Metadata) -> DateTime<Utc> {
    metadata
        .modified()
        .map(snapshot_time)
        .unwrap_or(DateTime::UNIX_EPOCH)
}
