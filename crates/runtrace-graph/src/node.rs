//! Graph node model and selection addressing.
//!
//! A [`GraphNode`] is UI-agnostic: it carries the node's kind (what a
//! renderer would pick an icon from), its config path, a clone of the
//! underlying config slice, its hierarchical selection index, and its
//! tracked/selected state. Topology mirrors the config tree but is
//! enriched with synthetic nodes: condition outcome edges, a repeat
//! loop's return edge, choice/default markers of a choose block.

use serde::Serialize;
use serde_json::Value;
use smallvec::SmallVec;

/// Hierarchical index of a node within the forest: one branch-selector per
/// nesting level. Selectors are forest/sequence positions, except the two
/// sentinels below.
pub type SelectorIndex = SmallVec<[i32; 8]>;

/// Selector for a container's own root marker (the repeat return edge).
pub const ROOT_MARKER: i32 = -1;

/// Selector for a choose block's implicit default branch.
pub const DEFAULT_BRANCH: i32 = -2;

/// What a node represents; renderers map this to visual styling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Empty `{}` placeholder action.
    New,
    Trigger,
    Condition,
    /// Synthetic TRUE outcome edge of a condition.
    ConditionTrue,
    /// Synthetic FALSE outcome edge of a condition.
    ConditionFalse,
    Delay,
    DeviceId,
    Event,
    Scene,
    Service,
    WaitTemplate,
    Repeat,
    /// Synthetic loop-back edge of a repeat block.
    RepeatReturn,
    Choose,
    /// Marker leaf for a numbered choose branch.
    ChooseChoice,
    /// Marker leaf for the implicit default branch.
    ChooseDefault,
    /// Unrecognized config shape, shown as raw YAML.
    Yaml,
}

/// The current selection cursor: hierarchical index plus computed path.
///
/// Empty means nothing is selected. The cursor is the only piece of graph
/// state that changes after construction, and it lives outside the forest:
/// callers hold a `Selection` and rebuild/restyle from it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Selection {
    pub indices: SelectorIndex,
    pub path: String,
}

impl Selection {
    /// The empty selection (nothing selected).
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty() && self.path.is_empty()
    }
}

/// A child slot of a graph node: either a single synthetic/marker node or
/// a chain of sequence nodes built from a nested config sequence.
#[derive(Debug, Clone, Serialize)]
pub enum Branch {
    Node(GraphNode),
    Chain(Vec<GraphNode>),
}

/// One node of the rebuilt control-flow graph.
#[derive(Debug, Clone, Serialize)]
pub struct GraphNode {
    pub kind: NodeKind,
    /// Slash-delimited address of the config slice this node represents.
    /// Synthetic outcome/marker nodes share their parent's path.
    pub path: String,
    /// Clone of the underlying config slice.
    pub config: Value,
    /// Hierarchical selection index; parents prefix their children.
    pub indices: SelectorIndex,
    /// Whether this path was visited by the run (or, for synthetic nodes,
    /// whether their edge was the one taken).
    pub is_tracked: bool,
    /// Whether this node is the current selection.
    pub is_active: bool,
    pub children: Vec<Branch>,
}

impl GraphNode {
    /// The selection event this node emits when activated.
    pub fn selection(&self) -> Selection {
        Selection {
            indices: self.indices.clone(),
            path: self.path.clone(),
        }
    }

    /// Child nodes in declaration order, flattening chains.
    pub fn child_nodes(&self) -> impl Iterator<Item = &GraphNode> {
        self.children.iter().flat_map(|branch| match branch {
            Branch::Node(node) => std::slice::from_ref(node).iter(),
            Branch::Chain(chain) => chain.iter(),
        })
    }

    /// Total node count of this subtree, itself included.
    pub fn subtree_len(&self) -> usize {
        1 + self.child_nodes().map(GraphNode::subtree_len).sum::<usize>()
    }
}
