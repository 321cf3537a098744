//! The run as one merged chronological event stream.
//!
//! Walks the trace's recorded paths in execution order, interleaving
//! logbook entries by time, and produces renderer-agnostic
//! [`TimelineEvent`]s: trigger/step entries, folded logbook groups,
//! "time later" markers for significant gaps, and a run footer. A
//! replacement UI renders these however it likes; the data-side behavior
//! lives here.
//!
//! Two fixed thresholds shape the stream: gaps at or under
//! [`SIGNIFICANT_TIME_CHANGE_MS`] collapse silently, and runs of more than
//! [`LOGBOOK_ENTRIES_BEFORE_FOLD`] consecutive logbook entries fold the
//! tail under their group.

use chrono::{DateTime, Utc};
use serde::Serialize;

use runtrace_core::action::{alias, ActionKind};
use runtrace_core::logbook::LogbookEntry;
use runtrace_core::path::{is_trigger_path, resolve};
use runtrace_core::trace::{Choice, TraceRecord};

/// Gaps larger than this (milliseconds) get an explicit time marker.
pub const SIGNIFICANT_TIME_CHANGE_MS: i64 = 5000;

/// Logbook entries shown per group before the rest folds away.
pub const LOGBOOK_ENTRIES_BEFORE_FOLD: usize = 2;

/// One event of the merged timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineEvent {
    /// A significant gap between the previous event and the next.
    TimePassed {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    },
    /// The run's trigger fired.
    Triggered {
        path: String,
        description: String,
        at: DateTime<Utc>,
    },
    /// A script step ran.
    Step { path: String, description: String },
    /// A group of consecutive logbook entries; entries beyond the fold
    /// threshold land in `folded`.
    Logbook {
        shown: Vec<LogbookEntry>,
        folded: Vec<LogbookEntry>,
    },
    /// A recorded path that no longer resolves against the config.
    /// Surfaced explicitly so the user can report it, never skipped.
    BrokenPath { path: String },
    Finished {
        at: DateTime<Utc>,
        runtime_seconds: f64,
    },
    StillRunning,
}

fn significant(a: DateTime<Utc>, b: DateTime<Utc>) -> bool {
    (b - a).num_milliseconds().abs() > SIGNIFICANT_TIME_CHANGE_MS
}

/// Tracks the last instant reported to the stream and emits gap markers.
struct TimeTracker {
    last_reported: DateTime<Utc>,
}

impl TimeTracker {
    fn new(start: DateTime<Utc>) -> Self {
        Self {
            last_reported: start,
        }
    }

    fn set_last(&mut self, at: DateTime<Utc>) {
        self.last_reported = at;
    }

    fn mark(&mut self, from: DateTime<Utc>, to: DateTime<Utc>, out: &mut Vec<TimelineEvent>) {
        out.push(TimelineEvent::TimePassed { from, to });
        self.last_reported = to;
    }

    /// Emits a gap marker only when the jump to `at` is significant.
    fn maybe_mark(&mut self, at: DateTime<Utc>, out: &mut Vec<TimelineEvent>) -> bool {
        if !significant(at, self.last_reported) {
            self.last_reported = at;
            return false;
        }
        let from = self.last_reported;
        self.mark(from, at, out);
        true
    }
}

/// Buffers consecutive logbook entries and flushes them as folded groups.
struct LogbookFolder<'e> {
    entries: &'e [LogbookEntry],
    cur: usize,
    pending: Vec<(DateTime<Utc>, &'e LogbookEntry)>,
}

impl<'e> LogbookFolder<'e> {
    fn new(entries: &'e [LogbookEntry]) -> Self {
        // The leading "automation was triggered" row duplicates the
        // trigger step of the trace itself.
        let cur = match entries.first() {
            Some(first) if first.domain.as_deref() == Some("automation") => 1,
            _ => 0,
        };
        Self {
            entries,
            cur,
            pending: Vec::new(),
        }
    }

    fn has_next(&self) -> bool {
        self.cur < self.entries.len()
    }

    fn next_when_millis(&self) -> i64 {
        self.entries[self.cur].when_millis()
    }

    /// Consumes the next entry into the pending group, flushing first when
    /// a significant gap separates it from the group.
    fn push_next(&mut self, tracker: &mut TimeTracker, out: &mut Vec<TimelineEvent>) {
        let entry = &self.entries[self.cur];
        self.cur += 1;
        let Some(at) = entry.when_utc() else {
            tracing::warn!(when = entry.when, "logbook instant out of range, skipped");
            return;
        };

        if let Some((previous, _)) = self.pending.last().copied() {
            if significant(previous, at) {
                self.flush_group(tracker, out);
                tracker.mark(previous, at, out);
            }
        }
        self.pending.push((at, entry));
    }

    fn flush(&mut self, tracker: &mut TimeTracker, out: &mut Vec<TimelineEvent>) {
        if !self.pending.is_empty() {
            self.flush_group(tracker, out);
        }
    }

    fn flush_group(&mut self, tracker: &mut TimeTracker, out: &mut Vec<TimelineEvent>) {
        let Some(&(first_at, _)) = self.pending.first() else {
            return;
        };
        tracker.maybe_mark(first_at, out);

        let split = self.pending.len().min(LOGBOOK_ENTRIES_BEFORE_FOLD);
        let shown = self.pending[..split].iter().map(|(_, e)| (*e).clone()).collect();
        let folded = self.pending[split..].iter().map(|(_, e)| (*e).clone()).collect();
        out.push(TimelineEvent::Logbook { shown, folded });

        if let Some(&(last_at, _)) = self.pending.last() {
            tracker.set_last(last_at);
        }
        self.pending.clear();
    }
}

/// Walks trace keys in execution order and writes the event stream.
struct StepNarrator<'t, 'e> {
    trace: &'t TraceRecord,
    keys: Vec<&'t str>,
    folder: LogbookFolder<'e>,
    tracker: TimeTracker,
    out: Vec<TimelineEvent>,
}

impl<'t, 'e> StepNarrator<'t, 'e> {
    fn new(trace: &'t TraceRecord, entries: &'e [LogbookEntry]) -> Self {
        Self {
            trace,
            keys: trace.tracked_paths().collect(),
            folder: LogbookFolder::new(entries),
            tracker: TimeTracker::new(trace.timestamp.start),
            out: Vec::new(),
        }
    }

    fn render_item(&mut self, index: usize, forced: Option<ActionKind>) -> usize {
        let key = self.keys[index];
        let Some(first) = self.trace.first_step(key) else {
            return index + 1;
        };

        if is_trigger_path(key) {
            let cause = if key == "trigger" {
                "manually".to_string()
            } else {
                let described = first
                    .changed_variables
                    .as_ref()
                    .and_then(|v| v.get("trigger"))
                    .and_then(|t| t.get("description"))
                    .and_then(|d| d.as_str());
                match described {
                    Some(d) => format!("by the {d}"),
                    None => "by an unknown trigger".to_string(),
                }
            };
            self.out.push(TimelineEvent::Triggered {
                path: key.to_string(),
                description: format!("Triggered {cause}"),
                at: first.timestamp,
            });
            return index + 1;
        }

        let timestamp = first.timestamp;

        // Everything the logbook saw before this step renders first.
        while self.folder.has_next() && self.folder.next_when_millis() < timestamp.timestamp_millis()
        {
            self.folder.push_next(&mut self.tracker, &mut self.out);
        }
        self.folder.flush(&mut self.tracker, &mut self.out);
        self.tracker.maybe_mark(timestamp, &mut self.out);

        let data = match resolve(&self.trace.config, key) {
            Ok(data) => data,
            Err(err) => {
                tracing::warn!(path = key, error = %err, "recorded path no longer resolves");
                self.out.push(TimelineEvent::BrokenPath {
                    path: key.to_string(),
                });
                return index + 1;
            }
        };

        let top_level = key.split('/').count() == 2;
        if !top_level && forced.is_none() {
            self.out.push(TimelineEvent::Step {
                path: key.to_string(),
                description: key.replace('/', " "),
            });
            return index + 1;
        }

        let kind = forced.unwrap_or_else(|| ActionKind::classify(data));
        if kind == ActionKind::Choose {
            return self.render_choose(index);
        }

        let description = alias(data)
            .map(str::to_string)
            .unwrap_or_else(|| kind.label().to_string());
        self.out.push(TimelineEvent::Step {
            path: key.to_string(),
            description,
        });
        index + 1
    }

    /// Flattens a choose block: one entry naming the branch taken, then
    /// the chosen sequence's steps, with the branch's condition
    /// evaluations skipped.
    fn render_choose(&mut self, index: usize) -> usize {
        let choose_path = self.keys[index];
        let start_level = choose_path.split('/').count() - 1;

        let choice = self
            .trace
            .first_step(choose_path)
            .and_then(|step| step.choice());

        let config = match resolve(&self.trace.config, choose_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = choose_path, error = %err, "recorded path no longer resolves");
                self.out.push(TimelineEvent::BrokenPath {
                    path: choose_path.to_string(),
                });
                return index + 1;
            }
        };
        let name = alias(config).unwrap_or("Choose").to_string();

        let description = match choice {
            Some(Choice::Default) => format!("{name}: Default action executed"),
            Some(Choice::Index(n)) => {
                let choice_name = resolve(&self.trace.config, &format!("{choose_path}/choose/{n}"))
                    .ok()
                    .and_then(alias)
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("Choice {n}"));
                format!("{name}: {choice_name} executed")
            }
            None => name,
        };
        self.out.push(TimelineEvent::Step {
            path: choose_path.to_string(),
            description,
        });

        // Skip the chosen branch's condition evaluations.
        let mut i = index + 1;
        while i < self.keys.len() {
            let parts: Vec<&str> = self.keys[i].split('/').collect();
            if parts.len() <= start_level {
                return i;
            }
            if parts.get(start_level + 3) == Some(&"sequence") {
                break;
            }
            i += 1;
        }

        // Render the chosen sequence, forcing the action type so nested
        // steps narrate as actions rather than raw paths.
        while i < self.keys.len() {
            if self.keys[i].split('/').count() <= start_level {
                return i;
            }
            let forced = resolve(&self.trace.config, self.keys[i])
                .ok()
                .map(ActionKind::classify)
                .or(Some(ActionKind::Yaml));
            i = self.render_item(i, forced);
        }
        i
    }
}

/// Builds the merged timeline for a run.
///
/// `entries` must be sorted ascending by `when`.
pub fn build_timeline(trace: &TraceRecord, entries: &[LogbookEntry]) -> Vec<TimelineEvent> {
    let mut narrator = StepNarrator::new(trace, entries);

    let mut index = 0;
    while index < narrator.keys.len() {
        index = narrator.render_item(index, None);
    }

    while narrator.folder.has_next() {
        narrator.folder.push_next(&mut narrator.tracker, &mut narrator.out);
    }
    narrator.folder.flush(&mut narrator.tracker, &mut narrator.out);

    // last_action is null when a condition stopped the run; no footer then.
    if narrator.trace.last_action.is_some() {
        match narrator.trace.timestamp.finish {
            Some(finish) => {
                let runtime =
                    (finish - narrator.trace.timestamp.start).num_milliseconds() as f64 / 1000.0;
                narrator.out.push(TimelineEvent::Finished {
                    at: finish,
                    runtime_seconds: runtime,
                });
            }
            None => narrator.out.push(TimelineEvent::StillRunning),
        }
    }

    tracing::debug!(
        run_id = %trace.run_id,
        events = narrator.out.len(),
        "built timeline"
    );
    narrator.out
}
