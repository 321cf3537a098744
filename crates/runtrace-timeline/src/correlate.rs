//! Associates logbook entries with the execution window of a trace step.
//!
//! A step's window starts at its first recorded visit and ends where the
//! next tracked path's first visit begins. The two-branch windowing below
//! is the only mechanism tying "why did entity X change" logbook rows to
//! "which script step caused it", and the windows of consecutive tracked
//! paths tile the timeline: half-open `[start, next_start)` for interior
//! steps, open-ended `[start, +inf)` for the last one -- no overlap, no
//! gap.

use runtrace_core::logbook::LogbookEntry;
use runtrace_core::trace::TraceRecord;

/// Outcome of a logbook lookup for a path.
#[derive(Debug, Clone, PartialEq)]
pub enum PathLogbook<'e> {
    /// The path has no recorded visit; distinct from an empty window.
    NotTracked,
    /// The entries inside the step's window; possibly empty.
    Entries(&'e [LogbookEntry]),
}

/// The logbook entries temporally associated with `path`'s execution.
///
/// `entries` must be sorted ascending by `when` (re-reverse a
/// newest-first fetch before calling; see
/// [`runtrace_core::logbook::ensure_ascending`]). Because of that sort
/// invariant the matching entries are contiguous and the scan stops at the
/// first entry past the window.
pub fn logbook_for_path<'e>(
    trace: &TraceRecord,
    entries: &'e [LogbookEntry],
    path: &str,
) -> PathLogbook<'e> {
    let tracked: Vec<&str> = trace.tracked_paths().collect();
    let Some(index) = tracked.iter().position(|p| *p == path) else {
        return PathLogbook::NotTracked;
    };
    let Some(start) = trace.first_step(path).map(|s| s.timestamp.timestamp_millis()) else {
        return PathLogbook::NotTracked;
    };

    if index == tracked.len() - 1 {
        // Last tracked step: everything from its start onward.
        let from = entries.iter().position(|e| e.when_millis() >= start);
        return PathLogbook::Entries(match from {
            Some(i) => &entries[i..],
            None => &entries[entries.len()..],
        });
    }

    let end = trace
        .first_step(tracked[index + 1])
        .map(|s| s.timestamp.timestamp_millis());
    let Some(end) = end else {
        // Next tracked path has no visits recorded; treat this window as
        // open-ended rather than guessing an end.
        let from = entries.iter().position(|e| e.when_millis() >= start);
        return PathLogbook::Entries(match from {
            Some(i) => &entries[i..],
            None => &entries[entries.len()..],
        });
    };

    let mut first = None;
    let mut stop = entries.len();
    for (i, entry) in entries.iter().enumerate() {
        let when = entry.when_millis();
        if when < start {
            continue;
        }
        if when >= end {
            // Ascending order: every later entry is outside the window too.
            stop = i;
            break;
        }
        if first.is_none() {
            first = Some(i);
        }
    }
    match first {
        Some(i) => PathLogbook::Entries(&entries[i..stop]),
        None => PathLogbook::Entries(&entries[entries.len()..]),
    }
}
