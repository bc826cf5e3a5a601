//! Level-order snapshot encoder.

use std::collections::VecDeque;
use std::io::Write;

use chrono::DateTime;
use tracing::debug;

use dirsnap_core::{DirectorySnapshot, FileSnapshot, SnapshotNode};

use crate::error::CodecError;
use crate::wire::{
    COUNT_BITS, COUNT_MASK, FORMAT_MARKER, HAS_EXTENDED_COUNT, HAS_EXTENDED_SIZE,
    HAS_MODIFIED_DELTA, IS_DIRECTORY, SIZE_BITS, SIZE_MASK, write_name, write_varint,
};

/// Writes a snapshot tree to a byte stream.
///
/// Nodes are emitted breadth first from an explicit queue, so stack use does
/// not depend on tree depth. Directory sizes and file counts are not written;
/// the reader recomputes them.
pub struct SnapshotWriter<W: Write> {
    writer: W,
}

impl<W: Write> SnapshotWriter<W> {
    /// Create a writer over `writer`.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Write the format marker followed by every node of `root`.
    pub fn write(&mut self, root: &SnapshotNode) -> Result<(), CodecError> {
        self.writer.write_all(&[FORMAT_MARKER])?;

        let mut queue = VecDeque::from([root]);
        let mut written: u64 = 0;

        while let Some(node) = queue.pop_front() {
            match node {
                SnapshotNode::Directory(dir) => {
                    self.write_directory(dir)?;
                    queue.extend(dir.children());
                }
                SnapshotNode::File(file) => self.write_file(file)?,
            }
            written += 1;
        }

        self.writer.flush()?;
        debug!(nodes = written, "snapshot encoded");
        Ok(())
    }

    /// Unwrap the underlying writer.
    pub fn into_inner(self) -> W {
        self.writer
    }

    fn write_directory(&mut self, dir: &DirectorySnapshot) -> Result<(), CodecError> {
        if dir.modified() < DateTime::UNIX_EPOCH {
            return Err(CodecError::TimestampBeforeEpoch {
                name: dir.name().to_string(),
            });
        }

        // Empty directories delta against the epoch
        let base = dir.newest_child_modified().unwrap_or(DateTime::UNIX_EPOCH);
        let delta = u64::try_from((dir.modified() - base).num_seconds()).map_err(|_| {
            CodecError::TimestampOrder {
                name: dir.name().to_string(),
            }
        })?;

        let count = dir.children().len() as u64;
        let extended_count = count >> COUNT_BITS;

        let mut header = IS_DIRECTORY | (count as u8 & COUNT_MASK);
        if extended_count != 0 {
            header |= HAS_EXTENDED_COUNT;
        }
        if delta != 0 {
            header |= HAS_MODIFIED_DELTA;
        }

        self.writer.write_all(&[header])?;
        if extended_count != 0 {
            write_varint(&mut self.writer, extended_count)?;
        }
        if delta != 0 {
            write_varint(&mut self.writer, delta)?;
        }
        write_name(&mut self.writer, dir.name())?;
        Ok(())
    }

    fn write_file(&mut self, file: &FileSnapshot) -> Result<(), CodecError> {
        let seconds =
            u64::try_from(file.modified().timestamp()).map_err(|_| CodecError::TimestampBeforeEpoch {
                name: file.name().to_string(),
            })?;

        let size = file.size();
        let extended_size = size >> SIZE_BITS;

        let mut header = size as u8 & SIZE_MASK;
        if extended_size != 0 {
            header |= HAS_EXTENDED_SIZE;
        }

        self.writer.write_all(&[header])?;
        if extended_size != 0 {
            write_varint(&mut self.writer, extended_size)?;
        }
        write_varint(&mut self.writer, seconds)?;
        write_name(&mut self.writer, file.name())?;
        Ok(())
    }
}

/// Encode a snapshot tree into a new buffer.
pub fn encode(root: &SnapshotNode) -> Result<Vec<u8>, CodecError> {
    let mut writer = SnapshotWriter::new(Vec::new());
    writer.write(root)?;
    Ok(writer.into_inner())
}
