//! The recorded execution of one script/automation run.
//!
//! A [`TraceRecord`] maps each visited path to the ordered list of
//! [`TraceStep`]s recorded there (one per visit -- loop iterations revisit
//! the same path). The mapping is an [`IndexMap`]: key iteration order is
//! insertion order is execution order, and any reimplementation of this
//! store must preserve that, including across (de)serialization. Both the
//! navigator's "next tracked node" stepping and the logbook correlator's
//! time windows are defined in terms of it.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Terminal state of a recorded run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Running,
    Stopped,
    Debugged,
}

/// Outcome of the script execution, as reported by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptExecution {
    Finished,
    FailedConditions,
    FailedSingle,
    FailedMaxRuns,
    Error,
    Cancelled,
    Aborted,
}

/// Start/finish instants of the run. `finish` is absent while running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTimestamps {
    pub start: DateTime<Utc>,
    #[serde(default)]
    pub finish: Option<DateTime<Utc>>,
}

/// Which branch a choose block took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// A numbered `choose[]` entry.
    Index(usize),
    /// The implicit else-branch.
    Default,
}

/// One recorded visit to a path during execution.
///
/// The `result` payload is context-dependent: a boolean outcome for
/// conditions, a `choice` for choose blocks, call parameters for service
/// steps, absent on error. It is kept as raw JSON with typed accessors for
/// the shapes the engine interprets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceStep {
    pub path: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changed_variables: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TraceStep {
    /// The boolean outcome of a condition (or choose-branch) evaluation.
    pub fn condition_result(&self) -> Option<bool> {
        self.result.as_ref()?.get("result")?.as_bool()
    }

    /// The branch a choose block took: a numbered choice, or the sentinel
    /// string `"default"` for the implicit else-branch.
    pub fn choice(&self) -> Option<Choice> {
        match self.result.as_ref()?.get("choice")? {
            Value::String(s) if s == "default" => Some(Choice::Default),
            Value::Number(n) => n.as_u64().map(|n| Choice::Index(n as usize)),
            _ => None,
        }
    }

    /// `true` when the step was recorded for a disabled config node.
    pub fn is_disabled(&self) -> bool {
        self.result
            .as_ref()
            .and_then(|r| r.get("enabled"))
            .and_then(Value::as_bool)
            == Some(false)
    }
}

/// The full recorded run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TraceRecord {
    /// Path -> ordered visits. Insertion order is execution order.
    pub trace: IndexMap<String, Vec<TraceStep>>,
    /// The script/automation definition the run executed.
    pub config: Value,
    #[serde(default)]
    pub context: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variables: Option<Value>,
    pub domain: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
    pub run_id: String,
    pub state: RunState,
    pub timestamp: RunTimestamps,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script_execution: Option<ScriptExecution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_action: Option<String>,
    /// Separate trace of the automation's top-level condition list.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition_trace: Option<IndexMap<String, Vec<TraceStep>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blueprint_inputs: Option<Value>,
}

/// Canonical prefix for an automation's action block.
pub const ACTION_PREFIX: &str = "action/";

/// Prefix for a script's top-level sequence.
pub const SEQUENCE_PREFIX: &str = "sequence/";

impl TraceRecord {
    /// `true` when `path` was visited during the run.
    pub fn contains_path(&self, path: &str) -> bool {
        self.trace.contains_key(path)
    }

    /// All visits recorded at `path`, in visit order.
    pub fn steps(&self, path: &str) -> Option<&[TraceStep]> {
        self.trace.get(path).map(Vec::as_slice)
    }

    /// The first visit recorded at `path`.
    pub fn first_step(&self, path: &str) -> Option<&TraceStep> {
        self.trace.get(path)?.first()
    }

    /// Visited paths in execution order.
    pub fn tracked_paths(&self) -> impl Iterator<Item = &str> {
        self.trace.keys().map(String::as_str)
    }

    /// The path prefix under which this run's actions are addressed:
    /// `action/` for automations, `sequence/` for scripts.
    pub fn action_prefix(&self) -> &'static str {
        if self.config.get("sequence").is_some() && self.config.get("action").is_none() {
            SEQUENCE_PREFIX
        } else {
            ACTION_PREFIX
        }
    }

    /// The action list of the config, tolerant of a bare-object singleton.
    pub fn actions(&self) -> Vec<&Value> {
        let key = if self.action_prefix() == SEQUENCE_PREFIX {
            "sequence"
        } else {
            "action"
        };
        self.config
            .get(key)
            .map(crate::action::ensure_list)
            .unwrap_or_default()
    }
}
