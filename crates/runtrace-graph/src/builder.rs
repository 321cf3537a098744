//! Builds the [`GraphNode`] forest from a config tree and a recorded run.
//!
//! The builder walks an ordered action list and the trace together, one
//! node per action, recursing into the nested sequences of `repeat` and
//! `choose` blocks. Selection state is wired as pure data: every
//! node carries its computed path and hierarchical index (parents prefix
//! their children at build time), so activating a node is just reading
//! [`GraphNode::selection`] -- there are no callbacks threaded through the
//! tree. Edit-mode mutation goes through
//! [`runtrace_core::path::update_at`] / [`insert_at`](runtrace_core::path::insert_at)
//! with the selection's path.

use serde_json::Value;
use smallvec::smallvec;

use runtrace_core::action::{
    branch_sequence, choose_branches, choose_default, ensure_list, repeat_sequence, ActionKind,
};
use runtrace_core::trace::{Choice, TraceRecord, ACTION_PREFIX};

use crate::node::{Branch, GraphNode, NodeKind, SelectorIndex, DEFAULT_BRANCH, ROOT_MARKER};

/// Builds graph forests for one view: the trace (if any), the selected
/// path (if any), and whether edit-mode additions are allowed.
///
/// `allow_add` changes topology in one place: a choose block without a
/// configured `default` branch still gets a default pair, so the editor
/// has a slot to add into.
#[derive(Debug, Default, Clone, Copy)]
pub struct GraphBuilder<'a> {
    trace: Option<&'a TraceRecord>,
    selected: Option<&'a str>,
    allow_add: bool,
}

impl<'a> GraphBuilder<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_trace(mut self, trace: &'a TraceRecord) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_selected(mut self, path: &'a str) -> Self {
        self.selected = Some(path);
        self
    }

    pub fn editable(mut self, allow_add: bool) -> Self {
        self.allow_add = allow_add;
        self
    }

    /// Builds the forest for an ordered action list addressed under
    /// `path_prefix` (e.g. `action/` or `action/1/sequence/`).
    ///
    /// When the prefix is the automation's canonical action prefix and the
    /// traced config carries a top-level `condition` list, those conditions
    /// are prepended as `condition/<i>` rows.
    pub fn build(&self, actions: &[&Value], path_prefix: &str) -> Vec<GraphNode> {
        self.build_with_offset(actions, path_prefix, 0)
    }

    fn build_with_offset(
        &self,
        actions: &[&Value],
        path_prefix: &str,
        offset: usize,
    ) -> Vec<GraphNode> {
        let mut forest = Vec::new();

        if path_prefix == ACTION_PREFIX {
            if let Some(conditions) = self.trace.and_then(|t| t.config.get("condition")) {
                for (i, condition) in ensure_list(conditions).into_iter().enumerate() {
                    let indices: SelectorIndex = smallvec![(offset + forest.len()) as i32];
                    // TODO: look up the real outcome from the run's
                    // condition_trace instead of always drawing the TRUE
                    // edge active.
                    forest.push(self.condition_node(
                        condition,
                        format!("condition/{i}"),
                        indices,
                        true,
                    ));
                }
            }
        }

        let start = offset + forest.len();
        forest.extend(self.build_sequence(actions, path_prefix, &SelectorIndex::new(), start));
        forest
    }

    fn build_sequence(
        &self,
        actions: &[&Value],
        prefix: &str,
        idx_prefix: &SelectorIndex,
        start: usize,
    ) -> Vec<GraphNode> {
        actions
            .iter()
            .enumerate()
            .map(|(i, action)| {
                let path = format!("{prefix}{i}");
                let mut indices = idx_prefix.clone();
                indices.push((start + i) as i32);
                self.action_node(action, path, indices)
            })
            .collect()
    }

    fn action_node(&self, action: &Value, path: String, indices: SelectorIndex) -> GraphNode {
        match ActionKind::classify(action) {
            ActionKind::Condition => self.condition_node(action, path, indices, false),
            ActionKind::Repeat => self.repeat_node(action, path, indices),
            ActionKind::Choose => self.choose_node(action, path, indices),
            kind => self.leaf(kind_to_node(kind), action, path, indices),
        }
    }

    fn leaf(&self, kind: NodeKind, action: &Value, path: String, indices: SelectorIndex) -> GraphNode {
        GraphNode {
            kind,
            is_tracked: self.is_tracked(&path),
            is_active: self.is_active(&path),
            config: action.clone(),
            path,
            indices,
            children: Vec::new(),
        }
    }

    /// A condition node with its two fixed outcome children. The config
    /// does not branch data-wise; both children continue the same sequence
    /// and activating either selects the condition itself. Which edge is
    /// drawn active comes from the trace's boolean result at this path,
    /// defaulting to TRUE when no trace is loaded. `assume_true` skips the
    /// trace lookup entirely (top-level condition rows).
    fn condition_node(
        &self,
        action: &Value,
        path: String,
        indices: SelectorIndex,
        assume_true: bool,
    ) -> GraphNode {
        let result = if assume_true {
            None
        } else {
            self.trace
                .and_then(|t| t.first_step(&path))
                .and_then(|step| step.condition_result())
        };
        let tracked = !assume_true && self.is_tracked(&path);
        let active = self.is_active(&path);

        let true_active = assume_true
            || match (self.trace, result) {
                (None, _) => true,
                (Some(_), Some(true)) => true,
                _ => false,
            };
        let false_active = result == Some(false);

        let outcome = |kind: NodeKind, taken: bool| GraphNode {
            kind,
            path: path.clone(),
            config: action.clone(),
            indices: indices.clone(),
            is_tracked: taken,
            is_active: active,
            children: Vec::new(),
        };

        GraphNode {
            kind: NodeKind::Condition,
            children: vec![
                Branch::Node(outcome(NodeKind::ConditionTrue, true_active)),
                Branch::Node(outcome(NodeKind::ConditionFalse, false_active)),
            ],
            config: action.clone(),
            is_tracked: tracked,
            is_active: active,
            path,
            indices,
        }
    }

    /// A repeat node: a return-edge marker (selector `-1`) plus the nested
    /// sub-graph of `repeat.sequence`, defaulting to a single empty action.
    fn repeat_node(&self, action: &Value, path: String, indices: SelectorIndex) -> GraphNode {
        let tracked = self.is_tracked(&path);
        let active = self.is_active(&path);

        let empty = empty_action();
        let sequence = sequence_or_placeholder(repeat_sequence(action), &empty);
        let chain = self.build_sequence(&sequence, &format!("{path}/sequence/"), &indices, 0);

        let mut marker_indices = indices.clone();
        marker_indices.push(ROOT_MARKER);

        GraphNode {
            kind: NodeKind::Repeat,
            children: vec![
                Branch::Node(GraphNode {
                    kind: NodeKind::RepeatReturn,
                    path: path.clone(),
                    config: action.clone(),
                    indices: marker_indices,
                    is_tracked: tracked,
                    is_active: false,
                    children: Vec::new(),
                }),
                Branch::Chain(chain),
            ],
            config: action.clone(),
            is_tracked: tracked,
            is_active: active,
            path,
            indices,
        }
    }

    /// A choose node: for every `choose[]` entry a (choice marker, nested
    /// sub-graph) pair, plus a default pair (selector `-2`) when the config
    /// has a `default` branch or edit mode allows adding one. The default
    /// branch uses its own addressing scheme: `<path>/default`, not
    /// `<path>/choose/<n>`.
    fn choose_node(&self, action: &Value, path: String, indices: SelectorIndex) -> GraphNode {
        let choice = self
            .trace
            .and_then(|t| t.first_step(&path))
            .and_then(|step| step.choice());
        let tracked = self.is_tracked(&path);
        let active = self.is_active(&path);
        let empty = empty_action();

        let mut children = Vec::new();
        for (ci, branch) in choose_branches(action).into_iter().enumerate() {
            let choice_path = format!("{path}/choose/{ci}");
            let mut branch_indices = indices.clone();
            branch_indices.push(ci as i32);

            children.push(Branch::Node(GraphNode {
                kind: NodeKind::ChooseChoice,
                path: choice_path.clone(),
                config: branch.clone(),
                indices: branch_indices.clone(),
                is_tracked: self.is_tracked(&choice_path),
                is_active: self.is_active(&choice_path),
                children: Vec::new(),
            }));

            let sequence = sequence_or_placeholder(branch_sequence(branch), &empty);
            children.push(Branch::Chain(self.build_sequence(
                &sequence,
                &format!("{choice_path}/sequence/"),
                &branch_indices,
                0,
            )));
        }

        if choose_default(action).is_some() || self.allow_add {
            let default_path = format!("{path}/default");
            let default_config = choose_default(action)
                .cloned()
                .unwrap_or_else(|| Value::Array(vec![empty.clone()]));
            let mut default_indices = indices.clone();
            default_indices.push(DEFAULT_BRANCH);

            children.push(Branch::Node(GraphNode {
                kind: NodeKind::ChooseDefault,
                path: default_path.clone(),
                config: default_config.clone(),
                indices: default_indices.clone(),
                // Never present in the trace itself; the taken default is
                // detected via the parent's recorded choice sentinel.
                is_tracked: choice == Some(Choice::Default),
                is_active: self.is_active(&default_path),
                children: Vec::new(),
            }));

            let sequence = sequence_or_placeholder(Some(&default_config), &empty);
            children.push(Branch::Chain(self.build_sequence(
                &sequence,
                &format!("{path}/default/"),
                &default_indices,
                0,
            )));
        }

        GraphNode {
            kind: NodeKind::Choose,
            children,
            config: action.clone(),
            is_tracked: tracked,
            is_active: active,
            path,
            indices,
        }
    }

    fn is_tracked(&self, path: &str) -> bool {
        self.trace.is_some_and(|t| t.contains_path(path))
    }

    fn is_active(&self, path: &str) -> bool {
        self.selected == Some(path)
    }
}

/// Builds the full graph for a recorded run: trigger rows, top-level
/// condition rows, then the action forest, with the action prefix derived
/// from the config shape (`action/` for automations, `sequence/` for
/// scripts).
pub fn build_automation(
    trace: &TraceRecord,
    selected: Option<&str>,
    allow_add: bool,
) -> Vec<GraphNode> {
    let mut builder = GraphBuilder::new().with_trace(trace).editable(allow_add);
    if let Some(path) = selected {
        builder = builder.with_selected(path);
    }

    let mut forest = Vec::new();
    if let Some(triggers) = trace.config.get("trigger") {
        for (i, trigger) in ensure_list(triggers).into_iter().enumerate() {
            let path = format!("trigger/{i}");
            let indices: SelectorIndex = smallvec![forest.len() as i32];
            forest.push(builder.leaf(NodeKind::Trigger, trigger, path, indices));
        }
    }

    let offset = forest.len();
    let actions = trace.actions();
    forest.extend(builder.build_with_offset(&actions, trace.action_prefix(), offset));

    tracing::debug!(
        run_id = %trace.run_id,
        nodes = forest.iter().map(GraphNode::subtree_len).sum::<usize>(),
        "built run graph"
    );
    forest
}

fn kind_to_node(kind: ActionKind) -> NodeKind {
    match kind {
        ActionKind::New => NodeKind::New,
        ActionKind::Delay => NodeKind::Delay,
        ActionKind::DeviceId => NodeKind::DeviceId,
        ActionKind::Event => NodeKind::Event,
        ActionKind::Scene => NodeKind::Scene,
        ActionKind::Service => NodeKind::Service,
        ActionKind::WaitTemplate => NodeKind::WaitTemplate,
        // Condition/Repeat/Choose have dedicated constructors.
        ActionKind::Condition | ActionKind::Repeat | ActionKind::Choose | ActionKind::Yaml => {
            NodeKind::Yaml
        }
    }
}

fn empty_action() -> Value {
    Value::Object(serde_json::Map::new())
}

/// A nested sequence as a borrow list, substituting a single empty action
/// when the sequence is missing or empty.
fn sequence_or_placeholder<'v>(sequence: Option<&'v Value>, empty: &'v Value) -> Vec<&'v Value> {
    let items = sequence.map(ensure_list).unwrap_or_default();
    if items.is_empty() {
        vec![empty]
    } else {
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// The worked scenario: service, choose (one branch + default), service.
    fn scenario_trace() -> TraceRecord {
        serde_json::from_value(json!({
            "trace": {
                "action/0": [{"path": "action/0", "timestamp": "2024-03-01T12:00:00+00:00"}],
                "action/1": [{"path": "action/1", "timestamp": "2024-03-01T12:00:01+00:00",
                              "result": {"choice": 0}}],
                "action/1/choose/0": [{"path": "action/1/choose/0",
                                       "timestamp": "2024-03-01T12:00:01+00:00",
                                       "result": {"result": true}}],
                "action/1/choose/0/conditions/0": [{"path": "action/1/choose/0/conditions/0",
                                                    "timestamp": "2024-03-01T12:00:01+00:00",
                                                    "result": {"result": true}}],
                "action/1/choose/0/sequence/0": [{"path": "action/1/choose/0/sequence/0",
                                                  "timestamp": "2024-03-01T12:00:02+00:00"}],
                "action/1/choose/0/sequence/1": [{"path": "action/1/choose/0/sequence/1",
                                                  "timestamp": "2024-03-01T12:00:03+00:00"}],
                "action/2": [{"path": "action/2", "timestamp": "2024-03-01T12:00:04+00:00"}]
            },
            "config": {
                "action": [
                    {"service": "light.toggle", "target": {"entity_id": "light.toggle_4"}},
                    {"choose": [
                        {"conditions": [{"condition": "state"}],
                         "sequence": [{"service": "light.toggle", "target": {"entity_id": "light.toggle_2"}},
                                      {"service": "light.toggle", "target": {"entity_id": "light.toggle_3"}}]}
                     ],
                     "default": [{"service": "light.toggle", "target": {"entity_id": "light.toggle_2"}}]},
                    {"service": "light.toggle", "target": {"entity_id": "light.toggle_4"}}
                ]
            },
            "domain": "automation",
            "run_id": "run-1",
            "state": "stopped",
            "timestamp": {"start": "2024-03-01T12:00:00+00:00", "finish": "2024-03-01T12:00:05+00:00"}
        }))
        .unwrap()
    }

    fn same_topology(a: &GraphNode, b: &GraphNode) -> bool {
        a.kind == b.kind
            && a.path == b.path
            && a.indices == b.indices
            && a.children.len() == b.children.len()
            && a.child_nodes().count() == b.child_nodes().count()
            && a.child_nodes()
                .zip(b.child_nodes())
                .all(|(x, y)| same_topology(x, y))
    }

    #[test]
    fn scenario_builds_three_top_level_nodes() {
        let trace = scenario_trace();
        let forest = build_automation(&trace, None, false);

        assert_eq!(forest.len(), 3);
        assert_eq!(forest[0].kind, NodeKind::Service);
        assert_eq!(forest[1].kind, NodeKind::Choose);
        assert_eq!(forest[2].kind, NodeKind::Service);

        // Choice pair + default pair.
        let choose = &forest[1];
        assert_eq!(choose.children.len(), 4);
        let child_paths: Vec<&str> = choose.child_nodes().map(|n| n.path.as_str()).collect();
        assert_eq!(
            child_paths,
            vec![
                "action/1/choose/0",
                "action/1/choose/0/sequence/0",
                "action/1/choose/0/sequence/1",
                "action/1/default",
                "action/1/default/0",
            ]
        );
    }

    #[test]
    fn scenario_tracked_flags() {
        let trace = scenario_trace();
        let forest = build_automation(&trace, None, false);

        assert!(forest[0].is_tracked);
        assert!(forest[1].is_tracked);
        assert!(forest[2].is_tracked);

        let choose = &forest[1];
        let by_path = |p: &str| {
            choose
                .child_nodes()
                .find(|n| n.path == p)
                .unwrap_or_else(|| panic!("no node at {p}"))
        };
        assert!(by_path("action/1/choose/0").is_tracked);
        assert!(by_path("action/1/choose/0/sequence/0").is_tracked);
        assert!(by_path("action/1/choose/0/sequence/1").is_tracked);
        // Choice 0 ran, so the default branch stays untracked.
        assert!(!by_path("action/1/default").is_tracked);
        assert!(!by_path("action/1/default/0").is_tracked);
    }

    #[test]
    fn default_marker_tracks_choice_sentinel() {
        let mut trace = scenario_trace();
        trace.trace.get_mut("action/1").unwrap()[0].result = Some(json!({"choice": "default"}));
        let forest = build_automation(&trace, None, false);
        let default = forest[1]
            .child_nodes()
            .find(|n| n.path == "action/1/default")
            .unwrap();
        assert!(default.is_tracked);
    }

    #[test]
    fn topology_is_independent_of_trace() {
        let trace = scenario_trace();
        let with_trace = build_automation(&trace, None, false);

        let actions = trace.actions();
        let without_trace = GraphBuilder::new().build(&actions, ACTION_PREFIX);

        assert_eq!(with_trace.len(), without_trace.len());
        for (a, b) in with_trace.iter().zip(&without_trace) {
            assert!(same_topology(a, b), "topology diverged at {}", a.path);
        }
    }

    #[test]
    fn selected_path_marks_node_active() {
        let trace = scenario_trace();
        let forest = build_automation(&trace, Some("action/1/choose/0"), false);
        let marker = forest[1]
            .child_nodes()
            .find(|n| n.path == "action/1/choose/0")
            .unwrap();
        assert!(marker.is_active);
        assert!(!forest[0].is_active);
    }

    #[test]
    fn empty_action_classifies_as_new_leaf() {
        let actions_json = json!([{}]);
        let actions: Vec<&Value> = ensure_list(&actions_json);
        let forest = GraphBuilder::new().build(&actions, "sequence/");
        assert_eq!(forest[0].kind, NodeKind::New);
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn repeat_gets_return_marker_and_placeholder_sequence() {
        let actions_json = json!([{"repeat": {"count": 3, "sequence": []}}]);
        let actions: Vec<&Value> = ensure_list(&actions_json);
        let forest = GraphBuilder::new().build(&actions, "action/");

        let repeat = &forest[0];
        assert_eq!(repeat.kind, NodeKind::Repeat);
        let children: Vec<&GraphNode> = repeat.child_nodes().collect();
        assert_eq!(children[0].kind, NodeKind::RepeatReturn);
        assert_eq!(children[0].indices.as_slice(), &[0, ROOT_MARKER]);
        // Empty sequence becomes a single placeholder action.
        assert_eq!(children[1].kind, NodeKind::New);
        assert_eq!(children[1].path, "action/0/sequence/0");
    }

    #[test]
    fn choose_without_default_synthesizes_one_only_in_edit_mode() {
        let actions_json = json!([{"choose": [{"sequence": [{"delay": 1}]}]}]);
        let actions: Vec<&Value> = ensure_list(&actions_json);

        let read_only = GraphBuilder::new().build(&actions, "action/");
        assert!(read_only[0]
            .child_nodes()
            .all(|n| n.kind != NodeKind::ChooseDefault));

        let editable = GraphBuilder::new().editable(true).build(&actions, "action/");
        let default = editable[0]
            .child_nodes()
            .find(|n| n.kind == NodeKind::ChooseDefault)
            .unwrap();
        assert_eq!(default.path, "action/0/default");
        assert_eq!(default.indices.as_slice(), &[0, DEFAULT_BRANCH]);
    }

    #[test]
    fn condition_defaults_to_true_edge_without_trace() {
        let actions_json = json!([{"condition": "state", "entity_id": "light.x"}]);
        let actions: Vec<&Value> = ensure_list(&actions_json);
        let forest = GraphBuilder::new().build(&actions, "action/");

        let children: Vec<&GraphNode> = forest[0].child_nodes().collect();
        assert_eq!(children[0].kind, NodeKind::ConditionTrue);
        assert!(children[0].is_tracked);
        assert_eq!(children[1].kind, NodeKind::ConditionFalse);
        assert!(!children[1].is_tracked);
    }

    #[test]
    fn condition_follows_recorded_false_result() {
        let trace: TraceRecord = serde_json::from_value(json!({
            "trace": {
                "action/0": [{"path": "action/0", "timestamp": "2024-03-01T12:00:00+00:00",
                              "result": {"result": false}}]
            },
            "config": {"action": [{"condition": "state", "entity_id": "light.x"}]},
            "domain": "automation",
            "run_id": "run-3",
            "state": "stopped",
            "timestamp": {"start": "2024-03-01T12:00:00+00:00"}
        }))
        .unwrap();
        let forest = build_automation(&trace, None, false);

        let children: Vec<&GraphNode> = forest[0].child_nodes().collect();
        assert!(!children[0].is_tracked);
        assert!(children[1].is_tracked);
    }

    #[test]
    fn top_level_conditions_prepended_for_action_prefix_only() {
        let trace: TraceRecord = serde_json::from_value(json!({
            "trace": {},
            "config": {
                "condition": [{"condition": "state"}],
                "action": [{"service": "x"}]
            },
            "domain": "automation",
            "run_id": "run-4",
            "state": "stopped",
            "timestamp": {"start": "2024-03-01T12:00:00+00:00"}
        }))
        .unwrap();
        let forest = build_automation(&trace, None, false);

        assert_eq!(forest[0].kind, NodeKind::Condition);
        assert_eq!(forest[0].path, "condition/0");
        // Drawn with the TRUE edge active regardless of the run.
        let children: Vec<&GraphNode> = forest[0].child_nodes().collect();
        assert!(children[0].is_tracked);
        assert_eq!(forest[1].path, "action/0");
        assert_eq!(forest[1].indices.as_slice(), &[1]);
    }

    #[test]
    fn triggers_render_as_leaves() {
        let trace: TraceRecord = serde_json::from_value(json!({
            "trace": {
                "trigger/1": [{"path": "trigger/1", "timestamp": "2024-03-01T12:00:00+00:00"}]
            },
            "config": {
                "trigger": [{"platform": "state"}, {"platform": "time"}],
                "action": [{"service": "x"}]
            },
            "domain": "automation",
            "run_id": "run-5",
            "state": "stopped",
            "timestamp": {"start": "2024-03-01T12:00:00+00:00"}
        }))
        .unwrap();
        let forest = build_automation(&trace, None, false);

        assert_eq!(forest[0].kind, NodeKind::Trigger);
        assert!(!forest[0].is_tracked);
        assert!(forest[1].is_tracked);
        assert_eq!(forest[2].path, "action/0");
        assert_eq!(forest[2].indices.as_slice(), &[2]);
    }
}
