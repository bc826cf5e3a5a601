//! Compact binary format for dirsnap snapshots.
//!
//! # Format
//!
//! A stream starts with the marker byte [`FORMAT_MARKER`] (`0x40`), followed
//! by every node of the tree in level order. Each node begins with one header
//! byte whose bit 7 selects the layout:
//!
//! | Kind | Bit 6 | Bit 5 | Low bits | Followed by |
//! |---|---|---|---|---|
//! | Directory (`1`) | time delta present | extended count present | child count & `0x1f` | count `>> 5`, time delta, name |
//! | File (`0`) | extended size present | - | size & `0x3f` | size `>> 6`, seconds since epoch, name |
//!
//! A directory's time is stored as seconds after its newest child (after the
//! epoch when it has no children). Directory sizes and file counts are not
//! stored; they are recomputed when the tree is read back.
//!
//! # Example
//!
//! ```rust,no_run
//! use dirsnap_codec::{read_snapshot_file, write_snapshot_file};
//! use dirsnap_scan::{ScanConfig, SnapshotScanner};
//!
//! let tree = SnapshotScanner::new().scan(&ScanConfig::new("/data")).unwrap();
//! write_snapshot_file("data.ssf", &tree.root).unwrap();
//!
//! let restored = read_snapshot_file("data.ssf").unwrap();
//! assert_eq!(restored.total_size(), tree.root.total_size());
//! ```

mod decode;
mod encode;
mod error;
mod wire;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use dirsnap_core::SnapshotNode;

pub use decode::{SnapshotReader, decode};
pub use encode::{SnapshotWriter, encode};
pub use error::CodecError;
pub use wire::{FORMAT_MARKER, read_varint, write_varint};

/// Conventional extension for snapshot files.
pub const SNAPSHOT_EXTENSION: &str = "ssf";

/// Write `root` to a snapshot file, creating parent directories as needed.
pub fn write_snapshot_file(path: impl AsRef<Path>, root: &SnapshotNode) -> Result<(), CodecError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| CodecError::file(parent, e))?;
    }

    let file = File::create(path).map_err(|e| CodecError::file(path, e))?;
    SnapshotWriter::new(BufWriter::new(file)).write(root)
}

/// Read a snapshot file.
pub fn read_snapshot_file(path: impl AsRef<Path>) -> Result<SnapshotNode, CodecError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| CodecError::file(path, e))?;
    SnapshotReader::new(BufReader::new(file)).read()
}
