//! Action-kind classification for script/automation config nodes.
//!
//! A config node does not carry an explicit type tag; its kind is inferred
//! from which of a fixed set of mutually exclusive keys is present. The
//! check runs in a fixed priority order and the first match wins, so a node
//! carrying several of the keys classifies by whichever appears first in
//! [`KIND_PRIORITY`]. That order-dependence is part of the contract.

use serde_json::Value;

/// Discriminant keys, checked in order. First present key wins.
pub const KIND_PRIORITY: [&str; 9] = [
    "condition",
    "delay",
    "device_id",
    "event",
    "scene",
    "service",
    "wait_template",
    "repeat",
    "choose",
];

/// The inferred kind of a config node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// An empty `{}` placeholder, freshly added in the editor.
    New,
    Condition,
    Delay,
    DeviceId,
    Event,
    Scene,
    Service,
    WaitTemplate,
    Repeat,
    Choose,
    /// No known discriminant key present; shown as raw YAML.
    Yaml,
}

impl ActionKind {
    /// Classifies a raw config node.
    ///
    /// An empty object is [`ActionKind::New`]; anything that is not an
    /// object, or an object without any known key, is [`ActionKind::Yaml`].
    pub fn classify(action: &Value) -> ActionKind {
        let Value::Object(map) = action else {
            return ActionKind::Yaml;
        };
        if map.is_empty() {
            return ActionKind::New;
        }
        for key in KIND_PRIORITY {
            if map.contains_key(key) {
                return match key {
                    "condition" => ActionKind::Condition,
                    "delay" => ActionKind::Delay,
                    "device_id" => ActionKind::DeviceId,
                    "event" => ActionKind::Event,
                    "scene" => ActionKind::Scene,
                    "service" => ActionKind::Service,
                    "wait_template" => ActionKind::WaitTemplate,
                    "repeat" => ActionKind::Repeat,
                    _ => ActionKind::Choose,
                };
            }
        }
        ActionKind::Yaml
    }

    /// Short lowercase label, used by narrative output.
    pub fn label(&self) -> &'static str {
        match self {
            ActionKind::New => "new",
            ActionKind::Condition => "condition",
            ActionKind::Delay => "delay",
            ActionKind::DeviceId => "device",
            ActionKind::Event => "event",
            ActionKind::Scene => "scene",
            ActionKind::Service => "service",
            ActionKind::WaitTemplate => "wait",
            ActionKind::Repeat => "repeat",
            ActionKind::Choose => "choose",
            ActionKind::Yaml => "unknown",
        }
    }
}

/// Views a config value as a list: arrays yield their elements, anything
/// else is a singleton. Mirrors the lenient shapes the backend accepts
/// (a bare object where a one-element sequence is meant).
pub fn ensure_list(value: &Value) -> Vec<&Value> {
    match value {
        Value::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

/// The `choose[]` branches of a choose block, or empty when absent.
pub fn choose_branches(action: &Value) -> Vec<&Value> {
    action.get("choose").map(ensure_list).unwrap_or_default()
}

/// The `default` branch of a choose block, when configured.
pub fn choose_default(action: &Value) -> Option<&Value> {
    action.get("default")
}

/// The nested sequence of a repeat block, when configured.
pub fn repeat_sequence(action: &Value) -> Option<&Value> {
    action.get("repeat").and_then(|r| r.get("sequence"))
}

/// The nested sequence of a choose branch, when configured.
pub fn branch_sequence(branch: &Value) -> Option<&Value> {
    branch.get("sequence")
}

/// The user-facing alias of a config node, when set.
pub fn alias(action: &Value) -> Option<&str> {
    action.get("alias").and_then(Value::as_str)
}
