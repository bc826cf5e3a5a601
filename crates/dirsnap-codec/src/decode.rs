//! Level-order snapshot decoder.

use std::collections::VecDeque;
use std::io::Read;
use std::ops::Range;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use dirsnap_core::SnapshotNode;

use crate::error::CodecError;
use crate::wire::{
    COUNT_MASK, FORMAT_MARKER, HAS_EXTENDED_COUNT, HAS_EXTENDED_SIZE, HAS_MODIFIED_DELTA,
    IS_DIRECTORY, SIZE_MASK, read_name, read_u8, read_varint,
};

/// Upper bound on speculative allocation from a declared child count.
const MAX_PREALLOCATED_CHILDREN: usize = 1024;

/// A node as read from the stream, before its subtree is assembled.
#[derive(Debug)]
enum Placeholder {
    File {
        name: String,
        size: u64,
        modified: DateTime<Utc>,
    },
    Directory {
        name: String,
        child_count: usize,
        modified_delta: u64,
        /// Arena indices of the children, filled in when the directory is dequeued.
        children: Range<usize>,
    },
}

impl Placeholder {
    fn is_dir(&self) -> bool {
        matches!(self, Self::Directory { .. })
    }
}

/// Reads a snapshot tree from a byte stream.
///
/// Nodes arrive breadth first. Each one is stored as a placeholder in an
/// arena; a directory's children occupy a contiguous index range that is
/// linked when the directory is dequeued. Once the stream is exhausted, the
/// arena is assembled from the last index back to the first, so every
/// directory is built after all of its descendants and its totals come from
/// finished children.
pub struct SnapshotReader<R: Read> {
    reader: R,
}

impl<R: Read> SnapshotReader<R> {
    /// Create a reader over `reader`.
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Read and validate a complete snapshot.
    pub fn read(mut self) -> Result<SnapshotNode, CodecError> {
        self.read_marker()?;

        let mut arena = vec![self.read_node()?];
        let mut queue = VecDeque::new();
        if arena[0].is_dir() {
            queue.push_back(0);
        }

        while let Some(parent) = queue.pop_front() {
            let Placeholder::Directory { child_count, .. } = arena[parent] else {
                continue;
            };

            let start = arena.len();
            arena.reserve(child_count.min(MAX_PREALLOCATED_CHILDREN));
            for _ in 0..child_count {
                let node = self.read_node()?;
                if node.is_dir() {
                    queue.push_back(arena.len());
                }
                arena.push(node);
            }

            let end = arena.len();
            if let Placeholder::Directory { children, .. } = &mut arena[parent] {
                *children = start..end;
            }
        }

        self.expect_end()?;
        debug!(nodes = arena.len(), "snapshot decoded");
        assemble(arena)
    }

    fn read_marker(&mut self) -> Result<(), CodecError> {
        let found = match read_u8(&mut self.reader) {
            Ok(byte) => byte,
            Err(CodecError::UnexpectedEof) => return Err(CodecError::MissingMarker),
            Err(err) => return Err(err),
        };
        if found != FORMAT_MARKER {
            return Err(CodecError::InvalidMarker {
                expected: FORMAT_MARKER,
                found,
            });
        }
        Ok(())
    }

    fn read_node(&mut self) -> Result<Placeholder, CodecError> {
        let header = read_u8(&mut self.reader)?;

        if header & IS_DIRECTORY != 0 {
            let mut count = u64::from(header & COUNT_MASK);
            if header & HAS_EXTENDED_COUNT != 0 {
                count = read_varint(&mut self.reader)?
                    .checked_mul(u64::from(COUNT_MASK) + 1)
                    .and_then(|high| high.checked_add(count))
                    .ok_or_else(|| CodecError::malformed("child count overflows"))?;
            }
            let child_count = usize::try_from(count)
                .map_err(|_| CodecError::malformed("child count overflows"))?;

            let modified_delta = if header & HAS_MODIFIED_DELTA != 0 {
                read_varint(&mut self.reader)?
            } else {
                0
            };

            let name = read_name(&mut self.reader)?;
            Ok(Placeholder::Directory {
                name,
                child_count,
                modified_delta,
                children: 0..0,
            })
        } else {
            let mut size = u64::from(header & SIZE_MASK);
            if header & HAS_EXTENDED_SIZE != 0 {
                size = read_varint(&mut self.reader)?
                    .checked_mul(u64::from(SIZE_MASK) + 1)
                    .and_then(|high| high.checked_add(size))
                    .ok_or_else(|| CodecError::malformed("file size overflows"))?;
            }

            let seconds = read_varint(&mut self.reader)?;
            let modified = i64::try_from(seconds)
                .ok()
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .ok_or(CodecError::TimestampOutOfRange)?;

            let name = read_name(&mut self.reader)?;
            Ok(Placeholder::File {
                name,
                size,
                modified,
            })
        }
    }

    fn expect_end(&mut self) -> Result<(), CodecError> {
        let mut extra = [0u8; 1];
        loop {
            match self.reader.read(&mut extra) {
                Ok(0) => return Ok(()),
                Ok(_) => return Err(CodecError::TrailingData),
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err.into()),
            }
        }
    }
}

/// Build the final tree bottom-up from the arena.
///
/// Children always sit at higher indices than their parent, so walking the
/// arena backwards finishes every child before its parent needs it.
fn assemble(arena: Vec<Placeholder>) -> Result<SnapshotNode, CodecError> {
    let mut built: Vec<Option<SnapshotNode>> = Vec::with_capacity(arena.len());
    built.resize_with(arena.len(), || None);

    for (index, placeholder) in arena.into_iter().enumerate().rev() {
        let node = match placeholder {
            Placeholder::File {
                name,
                size,
                modified,
            } => SnapshotNode::file(name, size, modified),
            Placeholder::Directory {
                name,
                modified_delta,
                children,
                ..
            } => {
                let children: Vec<SnapshotNode> = built[children]
                    .iter_mut()
                    .filter_map(Option::take)
                    .collect();

                let base = children
                    .iter()
                    .map(SnapshotNode::modified)
                    .max()
                    .unwrap_or(DateTime::UNIX_EPOCH);
                let modified = i64::try_from(modified_delta)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|delta| base.checked_add_signed(delta))
                    .ok_or(CodecError::TimestampOutOfRange)?;

                SnapshotNode::try_directory(name, modified, children)
                    .ok_or_else(|| CodecError::malformed("directory totals overflow"))?
            }
        };
        built[index] = Some(node);
    }

    built
        .into_iter()
        .next()
        .flatten()
        .ok_or(CodecError::UnexpectedEof)
}

/// Decode a snapshot from an in-memory buffer.
pub fn decode(bytes: &[u8]) -> Result<SnapshotNode, CodecError> {
    SnapshotReader::new(bytes).read()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn test_decode_single_file() {
        let node = decode(&[FORMAT_MARKER, 0b0000_0101, 3, 1, b'a']).unwrap();
        assert!(node.is_file());
        assert_eq!(node.name(), "a");
        assert_eq!(node.total_size(), 5);
        assert_eq!(node.modified(), at(3));
    }

    #[test]
    fn test_decode_directory_rebuilds_totals_and_time() {
        let bytes = [
            FORMAT_MARKER,
            IS_DIRECTORY | HAS_MODIFIED_DELTA | 2,
            3,
            1,
            b'd',
            HAS_EXTENDED_SIZE | 36,
            1,
            7,
            1,
            b'x',
            0,
            2,
            1,
            b'y',
        ];
        let node = decode(&bytes).unwrap();

        assert_eq!(node.total_size(), 100);
        assert_eq!(node.file_count(), 2);
        assert_eq!(node.modified(), at(10));
        let names: Vec<_> = node.children().unwrap().iter().map(SnapshotNode::name).collect();
        assert_eq!(names, ["x", "y"]);
    }

    #[test]
    fn test_decode_rejects_bad_marker() {
        assert!(matches!(decode(&[]), Err(CodecError::MissingMarker)));
        assert!(matches!(
            decode(&[0x41, 0, 0, 1, b'a']),
            Err(CodecError::InvalidMarker { found: 0x41, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_truncated_children() {
        // Directory declares two children but only one follows
        let bytes = [FORMAT_MARKER, IS_DIRECTORY | 2, 1, b'd', 0, 0, 1, b'x'];
        assert!(matches!(decode(&bytes), Err(CodecError::UnexpectedEof)));
    }

    #[test]
    fn test_decode_rejects_trailing_data() {
        let bytes = [FORMAT_MARKER, 0, 0, 1, b'a', 0xff];
        assert!(matches!(decode(&bytes), Err(CodecError::TrailingData)));
    }

    #[test]
    fn test_decode_rejects_overflowing_size() {
        // Extended size of 2^63 shifted left by six bits
        let mut bytes = vec![FORMAT_MARKER, HAS_EXTENDED_SIZE];
        bytes.extend([0x80; 9]);
        bytes.push(0x01);
        bytes.extend([0, 1, b'a']);
        assert!(matches!(decode(&bytes), Err(CodecError::Malformed { .. })));
    }

    #[test]
    fn test_decode_rejects_directory_totals_overflow() {
        // A directory holding files of u64::MAX bytes each
        let directory_of = |names: &[u8]| {
            let count = u8::try_from(names.len()).unwrap();
            let mut bytes = vec![FORMAT_MARKER, IS_DIRECTORY | count, 1, b'd'];
            for &name in names {
                bytes.push(HAS_EXTENDED_SIZE | SIZE_MASK);
                crate::wire::write_varint(&mut bytes, u64::MAX >> 6).unwrap();
                bytes.extend([0, 1, name]);
            }
            bytes
        };

        let node = decode(&directory_of(b"a")).unwrap();
        assert_eq!(node.total_size(), u64::MAX);

        assert!(matches!(
            decode(&directory_of(b"ab")),
            Err(CodecError::Malformed { .. })
        ));
    }
}
