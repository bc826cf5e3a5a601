//! Error types for reading and writing snapshots.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while encoding or decoding a snapshot.
///
/// Every decode error is fatal; no partial tree is returned.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The stream is empty.
    #[error("Snapshot stream is empty")]
    MissingMarker,

    /// The first byte is not the format marker.
    #[error("Invalid snapshot format marker: expected {expected:#04x}, found {found:#04x}")]
    InvalidMarker { expected: u8, found: u8 },

    /// The stream ended inside a node.
    #[error("Unexpected end of snapshot stream")]
    UnexpectedEof,

    /// A variable-length integer does not fit in 64 bits.
    #[error("Variable-length integer exceeds 64 bits")]
    VarintOverflow,

    /// A header declares a value that cannot be represented.
    #[error("Malformed snapshot: {message}")]
    Malformed { message: &'static str },

    /// A node name is not valid UTF-8.
    #[error("Node name is not valid UTF-8")]
    InvalidName(#[source] std::string::FromUtf8Error),

    /// Bytes remain after the last declared node.
    #[error("Unexpected data after the last snapshot node")]
    TrailingData,

    /// A file time cannot be stored as seconds since the Unix epoch.
    #[error("Modification time of {name} is before the Unix epoch")]
    TimestampBeforeEpoch { name: String },

    /// A directory is older than one of its children.
    #[error("Directory {name} is older than its newest child")]
    TimestampOrder { name: String },

    /// A decoded timestamp is outside the supported range.
    #[error("Decoded timestamp is out of range")]
    TimestampOutOfRange,

    /// Opening or creating a snapshot file failed.
    #[error("I/O error at {path}: {source}")]
    File {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Generic I/O error while streaming.
    #[error("I/O error: {0}")]
    Io(#[source] io::Error),
}

impl CodecError {
    /// Create a file error with path context.
    pub fn file(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::File {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn malformed(message: &'static str) -> Self {
        Self::Malformed { message }
    }
}

impl From<io::Error> for CodecError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::UnexpectedEof => Self::UnexpectedEof,
            _ => Self::Io(err),
        }
    }
}
