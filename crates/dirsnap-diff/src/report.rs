//! Compare tree node types.

use chrono::{DateTime, Utc};
use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use strum::Display;

/// How a node differs between the old and current snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum NodeStatus {
    /// Only present in the current snapshot.
    New,
    /// Only present in the old snapshot.
    Removed,
    /// Present in both, with differences inside.
    Changed,
    /// Present in both, with nothing to report.
    Unchanged,
}

/// One node of a compare tree.
///
/// Serializes with the camelCase field names used by the JSON report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompareReportNode {
    pub status: NodeStatus,
    pub is_directory: bool,
    pub name: CompactString,
    /// Modification time from the current snapshot, or the old one if removed.
    pub last_modified_utc: DateTime<Utc>,
    pub total_files_count: u64,
    pub total_add_files_count: u64,
    pub total_removed_files_count: u64,
    /// Size in the current snapshot; zero for removed nodes.
    pub total_size: u64,
    /// Current size minus old size.
    pub total_size_diff: i64,
    /// Child reports; `None` for files.
    pub sub_items: Option<Vec<CompareReportNode>>,
}

impl CompareReportNode {
    /// Child reports, empty for files.
    pub fn children(&self) -> &[CompareReportNode] {
        self.sub_items.as_deref().unwrap_or_default()
    }

    /// Find a direct child by name.
    pub fn child(&self, name: &str) -> Option<&CompareReportNode> {
        self.children().iter().find(|c| c.name == name)
    }

    /// Files added minus files removed.
    pub fn files_count_diff(&self) -> i64 {
        signed(self.total_add_files_count).saturating_sub(signed(self.total_removed_files_count))
    }

    /// Check whether this node reports any difference.
    pub fn is_changed(&self) -> bool {
        self.status != NodeStatus::Unchanged
    }
}

/// Convert a byte or file count to a signed value, saturating.
pub(crate) fn signed(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}
