//! Trace/logbook correlation and the chronological run narrative.
//!
//! Three views over one recorded run, all pure functions over immutable
//! snapshots:
//!
//! - [`correlate`]: which contiguous slice of logbook entries belongs to
//!   the selected step's execution window.
//! - [`details`]: what happened at the selected path -- per-iteration step
//!   records, or one of the named empty states (not executed, default
//!   branch executed).
//! - [`narrative`]: the whole run as one merged, renderer-agnostic
//!   timeline event stream (steps interleaved with logbook entries,
//!   significant time gaps marked, long logbook runs folded).

pub mod correlate;
pub mod details;
pub mod narrative;

pub use correlate::{logbook_for_path, PathLogbook};
pub use details::{path_details, PathDetails, StepDetail};
pub use narrative::{build_timeline, TimelineEvent};
