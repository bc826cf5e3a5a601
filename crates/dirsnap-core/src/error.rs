//! Failures and warnings produced while scanning.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that abort a scan.
///
/// Only the root path can fail a scan. Everything below it is recovered and
/// reported as a [`ScanWarning`].
#[derive(Debug, Error)]
pub enum ScanError {
    /// The root exists but may not be read.
    #[error("Permission denied: {path}")]
    PermissionDenied { path: PathBuf },

    /// The root does not exist.
    #[error("Path not found: {path}")]
    NotFound { path: PathBuf },

    /// Any other failure to inspect the root.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The root is a file or some other non-directory.
    #[error("Root path is not a directory: {path}")]
    NotADirectory { path: PathBuf },

    /// The scan thread pool could not be created.
    #[error("Failed to start scan thread pool: {message}")]
    ThreadPool { message: String },
}

impl ScanError {
    /// Classify an I/O failure on `path` by its error kind.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied { path },
            std::io::ErrorKind::NotFound => Self::NotFound { path },
            _ => Self::Io { path, source },
        }
    }
}

/// What went wrong with a recovered path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarningKind {
    /// Listing the directory was not permitted.
    PermissionDenied,
    /// Directory vanished between listing and reading.
    NotFound,
    /// Error listing a directory.
    ReadError,
    /// Error reading metadata of a single entry.
    MetadataError,
    /// A followed symlink leads back to a directory being scanned.
    SymlinkLoop,
}

/// Non-fatal problem encountered during a scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanWarning {
    /// Entry or directory that was recovered from.
    pub path: PathBuf,
    /// Description including the underlying error.
    pub message: String,
    /// Category used to group warnings.
    pub kind: WarningKind,
}

impl ScanWarning {
    /// Warning of an arbitrary kind.
    pub fn new(path: impl Into<PathBuf>, message: impl Into<String>, kind: WarningKind) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
            kind,
        }
    }

    /// Create a warning for a directory that could not be listed.
    pub fn unreadable_dir(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        let kind = match error.kind() {
            std::io::ErrorKind::PermissionDenied => WarningKind::PermissionDenied,
            std::io::ErrorKind::NotFound => WarningKind::NotFound,
            _ => WarningKind::ReadError,
        };
        Self::new(path, format!("Can't list directory: {error}"), kind)
    }

    /// Create a warning for an entry whose metadata could not be read.
    pub fn metadata_error(path: impl Into<PathBuf>, error: &std::io::Error) -> Self {
        Self::new(
            path,
            format!("Can't read metadata: {error}"),
            WarningKind::MetadataError,
        )
    }

    /// Warning for a symlink that was skipped because it forms a loop.
    pub fn symlink_loop(path: impl Into<PathBuf>, target: &std::path::Path) -> Self {
        Self::new(
            path,
            format!("Symlink loops back to {}", target.display()),
            WarningKind::SymlinkLoop,
        )
    }
}
