//! Per-step detail extraction for a selected path.
//!
//! Three named outcomes, kept distinct on purpose:
//!
//! - the selected path was visited: its recorded steps (plus the steps of
//!   trailing non-rendered paths, e.g. the evaluated conditions of a
//!   chosen branch) are returned in execution order;
//! - the path is a choose block's default branch and the parent's recorded
//!   choice is the `"default"` sentinel: the branch ran even though the
//!   synthetic default path never appears in the trace;
//! - anything else absent from the trace was skipped (short-circuited
//!   branch), which renders differently from "tracked but no entries".

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use runtrace_core::trace::{Choice, TraceRecord};

/// One recorded visit, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepDetail {
    /// The trace path this visit was recorded at. Differs from the
    /// selected path for trailing non-rendered steps.
    pub path: String,
    /// 0-based visit number at this path (loop iterations revisit).
    pub iteration: usize,
    /// Total visits recorded at this path.
    pub iterations: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changed_variables: Option<Value>,
    /// The step was recorded for a disabled config node.
    pub disabled: bool,
}

/// Outcome of a detail lookup for a selected path.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PathDetails {
    /// The implicit default branch ran (parent choice == `"default"`).
    DefaultExecuted,
    /// The path never ran; distinct from "ran with nothing to show".
    NotExecuted,
    Executed { steps: Vec<StepDetail> },
}

/// Details for the node selected at `path`.
///
/// `rendered_paths` is the set of paths the graph renders as nodes
/// (including non-chosen choice markers); trace keys that are *not*
/// rendered -- condition evaluations inside a chosen branch -- are folded
/// into the preceding rendered step's details.
pub fn path_details(trace: &TraceRecord, rendered_paths: &[String], path: &str) -> PathDetails {
    // The default branch is never a trace key. It counts as executed only
    // when the parent choose step recorded the "default" sentinel.
    if let Some(parent) = path.strip_suffix("/default") {
        if let Some(step) = trace.first_step(parent) {
            if step.choice() == Some(Choice::Default) {
                return PathDetails::DefaultExecuted;
            }
        }
    }

    if !trace.contains_path(path) {
        return PathDetails::NotExecuted;
    }

    let mut steps = Vec::new();
    let mut active = false;
    for key in trace.tracked_paths() {
        if active {
            if rendered_paths.iter().any(|p| p == key) {
                break;
            }
        } else if key == path {
            active = true;
        } else {
            continue;
        }

        let visits = trace.steps(key).unwrap_or_default();
        for (i, step) in visits.iter().enumerate() {
            steps.push(StepDetail {
                path: key.to_string(),
                iteration: i,
                iterations: visits.len(),
                timestamp: step.timestamp,
                result: step.result.clone(),
                error: step.error.clone(),
                changed_variables: step.changed_variables.clone(),
                disabled: step.is_disabled(),
            });
        }
    }
    PathDetails::Executed { steps }
}
