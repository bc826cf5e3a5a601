//! Structural comparison of two snapshot trees.

use std::collections::HashMap;

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use strum::Display;
use tracing::{debug, trace};

use dirsnap_core::SnapshotNode;

use crate::error::CompareError;
use crate::report::{CompareReportNode, NodeStatus, signed};

/// What to do when a name is a file on one side and a directory on the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum KindMismatchPolicy {
    /// Abort the whole comparison.
    #[default]
    Fail,
    /// Report the old entry as removed and the current one as new.
    SplitRemovedAdded,
}

/// Configuration for tree comparison.
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[builder(setter(into))]
pub struct CompareConfig {
    /// Handling of entries whose kind changed. The compared roots must
    /// always have the same kind regardless of this setting.
    #[builder(default)]
    #[serde(default)]
    pub kind_mismatch: KindMismatchPolicy,
}

impl CompareConfig {
    /// Create a new config builder.
    pub fn builder() -> CompareConfigBuilder {
        CompareConfigBuilder::default()
    }
}

/// Compares two snapshot trees into a compare tree.
///
/// Children are matched by name. Reports for current children keep the
/// current order; old children with no match are appended after them as
/// removed.
pub struct TreeComparer {
    config: CompareConfig,
}

impl TreeComparer {
    /// Create a new comparer with default config.
    pub fn new() -> Self {
        Self {
            config: CompareConfig::default(),
        }
    }

    /// Create a new comparer with custom config.
    pub fn with_config(config: CompareConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Compare `old` against `current`.
    ///
    /// A missing side reports the other as entirely new or removed.
    pub fn compare(
        &self,
        old: Option<&SnapshotNode>,
        current: Option<&SnapshotNode>,
    ) -> Result<CompareReportNode, CompareError> {
        let report = match (old, current) {
            (None, None) => return Err(CompareError::BothAbsent),
            (None, Some(current)) => added(current),
            (Some(old), None) => removed(old),
            (Some(old), Some(current)) => self.compare_matched(old, current)?,
        };

        debug!(
            name = %report.name,
            status = %report.status,
            size_diff = report.total_size_diff,
            "snapshots compared"
        );
        Ok(report)
    }

    /// Compare and then prune everything that did not change.
    pub fn compare_and_reduce(
        &self,
        old: Option<&SnapshotNode>,
        current: Option<&SnapshotNode>,
    ) -> Result<CompareReportNode, CompareError> {
        self.compare(old, current).map(crate::reduce)
    }

    fn compare_matched(
        &self,
        old: &SnapshotNode,
        current: &SnapshotNode,
    ) -> Result<CompareReportNode, CompareError> {
        if old.is_dir() != current.is_dir() {
            return Err(CompareError::KindMismatch {
                path: current.name().to_string(),
            });
        }

        let sub_items = match (old.children(), current.children()) {
            (Some(old_children), Some(current_children)) => Some(
                self.compare_children(old_children, current_children)
                    .map_err(|e| e.within(current.name()))?,
            ),
            _ => None,
        };

        let (added_files, removed_files) = sub_items.as_deref().map_or((0, 0), |items| {
            items.iter().fold((0, 0), |(added, removed), item| {
                (
                    added + item.total_add_files_count,
                    removed + item.total_removed_files_count,
                )
            })
        });

        // Provisional; reduce decides the final status of directories
        let status = if old.total_size() != current.total_size() || old.modified() != current.modified() {
            NodeStatus::Changed
        } else {
            NodeStatus::Unchanged
        };

        Ok(CompareReportNode {
            status,
            is_directory: current.is_dir(),
            name: current.name().into(),
            last_modified_utc: current.modified(),
            total_files_count: current.file_count(),
            total_add_files_count: added_files,
            total_removed_files_count: removed_files,
            total_size: current.total_size(),
            total_size_diff: signed(current.total_size()).saturating_sub(signed(old.total_size())),
            sub_items,
        })
    }

    fn compare_children(
        &self,
        old: &[SnapshotNode],
        current: &[SnapshotNode],
    ) -> Result<Vec<CompareReportNode>, CompareError> {
        let by_name: HashMap<&str, usize> = old
            .iter()
            .enumerate()
            .map(|(index, node)| (node.name(), index))
            .collect();
        let mut matched = vec![false; old.len()];
        let mut reports = Vec::with_capacity(old.len().max(current.len()));

        for child in current {
            let Some(&index) = by_name.get(child.name()) else {
                reports.push(added(child));
                continue;
            };

            let previous = &old[index];
            if previous.is_dir() != child.is_dir()
                && self.config.kind_mismatch == KindMismatchPolicy::SplitRemovedAdded
            {
                // Left unmatched so it is reported as removed below
                trace!(name = child.name(), "entry changed kind");
                reports.push(added(child));
                continue;
            }

            matched[index] = true;
            reports.push(self.compare_matched(previous, child)?);
        }

        reports.extend(
            old.iter()
                .zip(&matched)
                .filter(|(_, matched)| !**matched)
                .map(|(node, _)| removed(node)),
        );

        Ok(reports)
    }
}

impl Default for TreeComparer {
    fn default() -> Self {
        Self::new()
    }
}

/// Report a subtree that exists only in the current snapshot.
fn added(node: &SnapshotNode) -> CompareReportNode {
    CompareReportNode {
        status: NodeStatus::New,
        is_directory: node.is_dir(),
        name: node.name().into(),
        last_modified_utc: node.modified(),
        total_files_count: node.file_count(),
        total_add_files_count: node.file_count(),
        total_removed_files_count: 0,
        total_size: node.total_size(),
        total_size_diff: signed(node.total_size()),
        sub_items: node.children().map(|c| c.iter().map(added).collect()),
    }
}

/// Report a subtree that exists only in the old snapshot.
fn removed(node: &SnapshotNode) -> CompareReportNode {
    CompareReportNode {
        status: NodeStatus::Removed,
        is_directory: node.is_dir(),
        name: node.name().into(),
        last_modified_utc: node.modified(),
        total_files_count: node.file_count(),
        total_add_files_count: 0,
        total_removed_files_count: node.file_count(),
        total_size: 0,
        total_size_diff: -signed(node.total_size()),
        sub_items: node.children().map(|c| c.iter().map(removed).collect()),
    }
}

/// Compare two trees with the default configuration.
pub fn compare(
    old: Option<&SnapshotNode>,
    current: Option<&SnapshotNode>,
) -> Result<CompareReportNode, CompareError> {
    TreeComparer::new().compare(old, current)
}

/// Compare two trees with the default configuration and reduce the result.
pub fn compare_and_reduce(
    old: Option<&SnapshotNode>,
    current: Option<&SnapshotNode>,
) -> Result<CompareReportNode, CompareError> {
    TreeComparer::new().compare_and_reduce(old, current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn names(report: &CompareReportNode) -> Vec<&str> {
        report.children().iter().map(|c| c.name.as_str()).collect()
    }

    #[test]
    fn test_both_absent() {
        assert!(matches!(compare(None, None), Err(CompareError::BothAbsent)));
    }

    #[test]
    fn test_matched_file_status() {
        let old = SnapshotNode::file("a", 10, at(5));

        let same = compare(Some(&old), Some(&old)).unwrap();
        assert_eq!(same.status, NodeStatus::Unchanged);
        assert_eq!(same.total_size_diff, 0);
        assert!(same.sub_items.is_none());

        let touched = SnapshotNode::file("a", 10, at(6));
        assert_eq!(
            compare(Some(&old), Some(&touched)).unwrap().status,
            NodeStatus::Changed
        );

        let shrunk = SnapshotNode::file("a", 4, at(5));
        let report = compare(Some(&old), Some(&shrunk)).unwrap();
        assert_eq!(report.status, NodeStatus::Changed);
        assert_eq!(report.total_size_diff, -6);
    }

    #[test]
    fn test_children_keep_current_order_then_removed() {
        let old = SnapshotNode::directory(
            "d",
            at(0),
            vec![
                SnapshotNode::file("gone", 9, at(0)),
                SnapshotNode::file("kept", 5, at(0)),
                SnapshotNode::file("also-gone", 1, at(0)),
            ],
        );
        let current = SnapshotNode::directory(
            "d",
            at(0),
            vec![
                SnapshotNode::file("fresh", 20, at(0)),
                SnapshotNode::file("kept", 5, at(0)),
            ],
        );

        let report = compare(Some(&old), Some(&current)).unwrap();
        assert_eq!(names(&report), ["fresh", "kept", "gone", "also-gone"]);
        assert_eq!(report.total_add_files_count, 1);
        assert_eq!(report.total_removed_files_count, 2);
        assert_eq!(report.total_size_diff, 10);
        assert_eq!(report.files_count_diff(), -1);
    }

    #[test]
    fn test_kind_mismatch_fails_with_path() {
        let old = SnapshotNode::directory(
            "root",
            at(0),
            vec![SnapshotNode::directory("sub", at(0), vec![SnapshotNode::file("x", 1, at(0))])],
        );
        let current = SnapshotNode::directory(
            "root",
            at(0),
            vec![SnapshotNode::directory(
                "sub",
                at(0),
                vec![SnapshotNode::directory("x", at(0), Vec::new())],
            )],
        );

        match compare(Some(&old), Some(&current)) {
            Err(CompareError::KindMismatch { path }) => assert_eq!(path, "root/sub/x"),
            other => panic!("expected kind mismatch, got {other:?}"),
        }
    }

    #[test]
    fn test_split_policy_reports_removed_and_new() {
        let old = SnapshotNode::directory("root", at(0), vec![SnapshotNode::file("x", 8, at(0))]);
        let current = SnapshotNode::directory(
            "root",
            at(0),
            vec![SnapshotNode::directory(
                "x",
                at(0),
                vec![SnapshotNode::file("inner", 3, at(0))],
            )],
        );

        let config = CompareConfig::builder()
            .kind_mismatch(KindMismatchPolicy::SplitRemovedAdded)
            .build()
            .unwrap();
        let report = TreeComparer::with_config(config)
            .compare(Some(&old), Some(&current))
            .unwrap();

        let children = report.children();
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].status, NodeStatus::New);
        assert!(children[0].is_directory);
        assert_eq!(children[1].status, NodeStatus::Removed);
        assert!(!children[1].is_directory);
        assert_eq!(report.total_size_diff, -5);
    }

    #[test]
    fn test_split_policy_still_rejects_root_mismatch() {
        let config = CompareConfig {
            kind_mismatch: KindMismatchPolicy::SplitRemovedAdded,
        };
        let old = SnapshotNode::file("r", 1, at(0));
        let current = SnapshotNode::directory("r", at(0), Vec::new());
        assert!(matches!(
            TreeComparer::with_config(config).compare(Some(&old), Some(&current)),
            Err(CompareError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_default_policy() {
        assert_eq!(
            CompareConfig::builder().build().unwrap().kind_mismatch,
            KindMismatchPolicy::Fail
        );
        assert_eq!(TreeComparer::default().config().kind_mismatch, KindMismatchPolicy::Fail);
    }
}
