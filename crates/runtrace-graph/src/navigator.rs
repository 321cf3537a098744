//! Breadth-first navigation and selection over a built graph forest.
//!
//! Traversal order is the declaration order of the forest: top-level
//! entries first, then each node's own children before its siblings'
//! children -- a plain queue-based level order. Every operation runs a
//! fresh traversal over the immutable forest; there is no shared iterator
//! state to invalidate.

use std::collections::VecDeque;

use runtrace_core::trace::TraceRecord;

use crate::node::{GraphNode, Selection};

/// A node paired with its tracked flag, as produced by [`all_nodes`].
///
/// Tracked here means exactly "the node's path is a key of the trace
/// record" -- synthetic edge/marker annotations on the node itself are
/// not consulted.
#[derive(Debug, Clone, Copy)]
pub struct FlatNode<'g> {
    pub node: &'g GraphNode,
    pub is_tracked: bool,
}

/// All nodes of the forest in BFS order.
pub fn bfs_nodes(forest: &[GraphNode]) -> Vec<&GraphNode> {
    let mut queue: VecDeque<&GraphNode> = forest.iter().collect();
    let mut out = Vec::new();
    while let Some(node) = queue.pop_front() {
        out.push(node);
        queue.extend(node.child_nodes());
    }
    out
}

/// The BFS-ordered flat sequence of all nodes, each paired with whether
/// its path is tracked by `trace`. A fresh, restartable sequence per call.
pub fn all_nodes<'g>(forest: &'g [GraphNode], trace: Option<&TraceRecord>) -> Vec<FlatNode<'g>> {
    bfs_nodes(forest)
        .into_iter()
        .map(|node| FlatNode {
            node,
            is_tracked: trace.is_some_and(|t| t.contains_path(&node.path)),
        })
        .collect()
}

/// Selects the first node whose computed path equals `path`, or the empty
/// selection when no node matches.
pub fn select_by_path(forest: &[GraphNode], path: &str) -> Selection {
    bfs_nodes(forest)
        .into_iter()
        .find(|node| node.path == path)
        .map(GraphNode::selection)
        .unwrap_or_else(Selection::empty)
}

/// Selects the next tracked node in BFS order.
///
/// With `after` given, scanning starts strictly past the first node whose
/// path matches it (so the returned node never sits at or before `after`);
/// without it, scanning starts at the beginning. Returns the empty
/// selection when nothing tracked remains. This underlies the "step
/// forward through the trace" control.
pub fn select_next_tracked(
    forest: &[GraphNode],
    trace: &TraceRecord,
    after: Option<&str>,
) -> Selection {
    let nodes = all_nodes(forest, Some(trace));
    let start = match after {
        Some(path) => match nodes.iter().position(|f| f.node.path == path) {
            Some(i) => i + 1,
            // Everything is "before" a path that never occurs.
            None => nodes.len(),
        },
        None => 0,
    };
    nodes[start..]
        .iter()
        .find(|f| f.is_tracked)
        .map(|f| f.node.selection())
        .unwrap_or_else(Selection::empty)
}

/// Selects the closest tracked node strictly before `before` in BFS order,
/// or the empty selection. The "step backward" counterpart of
/// [`select_next_tracked`].
pub fn select_previous_tracked(
    forest: &[GraphNode],
    trace: &TraceRecord,
    before: &str,
) -> Selection {
    let nodes = all_nodes(forest, Some(trace));
    let Some(end) = nodes.iter().position(|f| f.node.path == before) else {
        return Selection::empty();
    };
    nodes[..end]
        .iter()
        .rev()
        .find(|f| f.is_tracked)
        .map(|f| f.node.selection())
        .unwrap_or_else(Selection::empty)
}
