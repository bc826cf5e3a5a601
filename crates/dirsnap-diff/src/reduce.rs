//! Pruning of compare trees down to what changed.

use crate::report::{CompareReportNode, NodeStatus};

/// Reduce a compare tree to the paths that lead to a change.
///
/// Works bottom-up. Directory children that reduce to [`NodeStatus::Unchanged`]
/// are dropped, as are file children whose size did not change. A directory
/// that keeps any child is [`NodeStatus::Changed`] unless it is already new or
/// removed; one that keeps nothing becomes [`NodeStatus::Unchanged`] unless it
/// is new or removed.
pub fn reduce(mut node: CompareReportNode) -> CompareReportNode {
    let Some(children) = node.sub_items.take() else {
        return node;
    };

    let kept: Vec<CompareReportNode> = children
        .into_iter()
        .filter_map(|child| {
            if child.is_directory {
                let child = reduce(child);
                child.is_changed().then_some(child)
            } else {
                (child.total_size_diff != 0).then_some(child)
            }
        })
        .collect();

    let settled = matches!(node.status, NodeStatus::New | NodeStatus::Removed);
    if kept.is_empty() {
        if !settled {
            node.status = NodeStatus::Unchanged;
        }
    } else if node.status == NodeStatus::Unchanged {
        node.status = NodeStatus::Changed;
    }

    node.sub_items = Some(kept);
    node
}
