//! Snapshot tree node types.

use std::time::SystemTime;

use chrono::{DateTime, SubsecRound, Utc};
use compact_str::CompactString;
use serde::Serialize;

/// Convert a filesystem time to snapshot resolution.
///
/// Snapshots keep whole seconds since the Unix epoch. Times before the epoch
/// are clamped to it.
pub fn snapshot_time(time: SystemTime) -> DateTime<Utc> {
    DateTime::<Utc>::from(time)
        .max(DateTime::UNIX_EPOCH)
        .trunc_subsecs(0)
}

/// A file captured in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileSnapshot {
    name: CompactString,
    size: u64,
    modified: DateTime<Utc>,
}

impl FileSnapshot {
    /// File name (not full path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Length in bytes.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Last modification time, whole seconds.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }
}

/// A directory captured in a snapshot, with aggregates over its subtree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectorySnapshot {
    name: CompactString,
    modified: DateTime<Utc>,
    total_size: u64,
    file_count: u64,
    children: Vec<SnapshotNode>,
}

impl DirectorySnapshot {
    /// Directory name (not full path).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Newest modification time in this subtree, including the directory itself.
    pub fn modified(&self) -> DateTime<Utc> {
        self.modified
    }

    /// Sum of all descendant file sizes.
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// Number of descendant files. Directories are not counted.
    pub fn file_count(&self) -> u64 {
        self.file_count
    }

    /// Direct children in stored order.
    pub fn children(&self) -> &[SnapshotNode] {
        &self.children
    }

    /// Newest modification time among direct children, if any.
    pub fn newest_child_modified(&self) -> Option<DateTime<Utc>> {
        self.children.iter().map(SnapshotNode::modified).max()
    }
}

/// A single file or directory in a snapshot tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SnapshotNode {
    File(FileSnapshot),
    Directory(DirectorySnapshot),
}

impl SnapshotNode {
    /// Create a file node.
    pub fn file(name: impl Into<CompactString>, size: u64, modified: DateTime<Utc>) -> Self {
        Self::File(FileSnapshot {
            name: name.into(),
            size,
            modified: modified.trunc_subsecs(0),
        })
    }

    /// Create a directory node from its children.
    ///
    /// Size and file count are summed from `children`, and the recorded time
    /// becomes the newest of `modified` and every child's time. Children keep
    /// the order they are given in. Totals that don't fit in a `u64` saturate;
    /// use [`SnapshotNode::try_directory`] for children of untrusted origin.
    pub fn directory(
        name: impl Into<CompactString>,
        modified: DateTime<Utc>,
        children: Vec<SnapshotNode>,
    ) -> Self {
        let (total_size, file_count, newest) =
            aggregate(&children, modified, |a, b| Some(a.saturating_add(b)))
                .unwrap_or((u64::MAX, u64::MAX, modified.trunc_subsecs(0)));
        Self::Directory(DirectorySnapshot {
            name: name.into(),
            modified: newest,
            total_size,
            file_count,
            children,
        })
    }

    /// Like [`SnapshotNode::directory`], but `None` if the summed size or
    /// file count overflows a `u64`.
    pub fn try_directory(
        name: impl Into<CompactString>,
        modified: DateTime<Utc>,
        children: Vec<SnapshotNode>,
    ) -> Option<Self> {
        let (total_size, file_count, newest) = aggregate(&children, modified, u64::checked_add)?;
        Some(Self::Directory(DirectorySnapshot {
            name: name.into(),
            modified: newest,
            total_size,
            file_count,
            children,
        }))
    }

    /// Node name (not full path).
    pub fn name(&self) -> &str {
        match self {
            Self::File(file) => file.name(),
            Self::Directory(dir) => dir.name(),
        }
    }

    /// Check if this node is a directory.
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Check if this node is a file.
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    /// Last modification time, whole seconds.
    pub fn modified(&self) -> DateTime<Utc> {
        match self {
            Self::File(file) => file.modified(),
            Self::Directory(dir) => dir.modified(),
        }
    }

    /// Own size for files, aggregate size for directories.
    pub fn total_size(&self) -> u64 {
        match self {
            Self::File(file) => file.size(),
            Self::Directory(dir) => dir.total_size(),
        }
    }

    /// 1 for files, descendant file count for directories.
    pub fn file_count(&self) -> u64 {
        match self {
            Self::File(_) => 1,
            Self::Directory(dir) => dir.file_count(),
        }
    }

    /// Children of a directory; `None` for files.
    pub fn children(&self) -> Option<&[SnapshotNode]> {
        match self {
            Self::File(_) => None,
            Self::Directory(dir) => Some(dir.children()),
        }
    }

    /// Get the number of direct children.
    pub fn child_count(&self) -> usize {
        self.children().map_or(0, <[SnapshotNode]>::len)
    }

    /// Borrow the directory variant.
    pub fn as_directory(&self) -> Option<&DirectorySnapshot> {
        match self {
            Self::Directory(dir) => Some(dir),
            Self::File(_) => None,
        }
    }
}

/// Summed size, summed file count and newest time of a directory's children.
fn aggregate(
    children: &[SnapshotNode],
    modified: DateTime<Utc>,
    add: impl Fn(u64, u64) -> Option<u64>,
) -> Option<(u64, u64, DateTime<Utc>)> {
    let mut total_size: u64 = 0;
    let mut file_count: u64 = 0;
    let mut newest = modified.trunc_subsecs(0);

    for child in children {
        total_size = add(total_size, child.total_size())?;
        file_count = add(file_count, child.file_count())?;
        newest = newest.max(child.modified());
    }

    Some((total_size, file_count, newest))
}
