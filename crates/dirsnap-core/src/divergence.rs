//! Structural comparison of two snapshot trees.
//!
//! Used to verify that a persisted snapshot reads back as the tree that was
//! written. This is not the change report; see `dirsnap-diff` for that.

use std::fmt;

use crate::node::SnapshotNode;

/// First point at which two trees differ.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Divergence {
    /// Slash-separated path from the root to the differing node.
    pub path: String,
    /// What differs at that node.
    pub reason: DivergenceReason,
}

/// Kind of structural difference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DivergenceReason {
    Kind,
    Name,
    Size,
    FileCount,
    ChildCount,
    Modified,
}

impl fmt::Display for Divergence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.reason {
            DivergenceReason::Kind => "node kind",
            DivergenceReason::Name => "name",
            DivergenceReason::Size => "total size",
            DivergenceReason::FileCount => "file count",
            DivergenceReason::ChildCount => "child count",
            DivergenceReason::Modified => "modification time",
        };
        write!(f, "{what} differs at {}", self.path)
    }
}

impl SnapshotNode {
    /// Find the first node where `self` and `other` differ.
    ///
    /// Children are compared pairwise in stored order. Timestamps may differ
    /// by less than one second.
    pub fn find_divergence(&self, other: &SnapshotNode) -> Option<Divergence> {
        divergence_at(self, other, String::new())
    }
}

fn divergence_at(one: &SnapshotNode, other: &SnapshotNode, parent: String) -> Option<Divergence> {
    let path = if parent.is_empty() {
        one.name().to_string()
    } else {
        format!("{parent}/{}", one.name())
    };

    let reason = if one.is_dir() != other.is_dir() {
        Some(DivergenceReason::Kind)
    } else if one.name() != other.name() {
        Some(DivergenceReason::Name)
    } else if one.total_size() != other.total_size() {
        Some(DivergenceReason::Size)
    } else if one.file_count() != other.file_count() {
        Some(DivergenceReason::FileCount)
    } else if (one.modified() - other.modified()).num_seconds().abs() >= 1 {
        Some(DivergenceReason::Modified)
    } else if one.child_count() != other.child_count() {
        Some(DivergenceReason::ChildCount)
    } else {
        None
    };

    if let Some(reason) = reason {
        return Some(Divergence { path, reason });
    }

    let (Some(ours), Some(theirs)) = (one.children(), other.children()) else {
        return None;
    };

    ours.iter()
        .zip(theirs)
        .find_map(|(a, b)| divergence_at(a, b, path.clone()))
}
