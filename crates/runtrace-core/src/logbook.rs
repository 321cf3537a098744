//! Flat, time-ordered logbook events.
//!
//! Logbook entries are independent of the trace: they carry no path, and
//! association with an execution step is purely by time-window overlap and
//! shared causation context. The correlator expects entries sorted
//! ascending by `when`; fetches that arrive newest-first must be
//! re-reversed before use ([`ensure_ascending`] does this).

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logbook event. `when` is an epoch instant in seconds (fractional
/// part carries sub-second precision).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogbookEntry {
    pub when: f64,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_event_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_entity_id: Option<String>,
}

impl LogbookEntry {
    /// The event instant in epoch milliseconds.
    pub fn when_millis(&self) -> i64 {
        (self.when * 1000.0).round() as i64
    }

    /// The event instant as a UTC timestamp, when representable.
    pub fn when_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.when_millis())
    }

    /// One-line human description: name, entity, and what happened.
    pub fn description(&self) -> String {
        let what = match (&self.message, &self.state) {
            (Some(message), _) => message.clone(),
            (None, Some(state)) => format!("turned {state}"),
            (None, None) => String::from("changed"),
        };
        match &self.entity_id {
            Some(entity) => format!("{} ({}) {}", self.name, entity, what),
            None => format!("{} {}", self.name, what),
        }
    }
}

/// Sorts `entries` ascending by `when`, re-reversing a descending fetch.
///
/// Entries already in ascending order are left untouched; a strictly
/// descending list is reversed in place (cheaper than a re-sort for the
/// common reverse-chronological fetch), anything else is sorted.
pub fn ensure_ascending(entries: &mut [LogbookEntry]) {
    let ascending = entries.windows(2).all(|w| w[0].when <= w[1].when);
    if ascending {
        return;
    }
    let descending = entries.windows(2).all(|w| w[0].when >= w[1].when);
    if descending {
        entries.reverse();
    } else {
        entries.sort_by(|a, b| a.when.total_cmp(&b.when));
    }
}

/// Explicit cache for fetched logbook slices, keyed by causation context.
///
/// Owned and passed around by the caller -- deliberately not process-wide
/// state. Entries are never evicted; a long-lived holder grows without
/// bound, which preserves the behavior of the data layer this replaces.
/// See DESIGN.md ("logbook cache eviction") before adding eviction here.
#[derive(Debug, Default)]
pub struct LogbookCache {
    entries: HashMap<String, Vec<LogbookEntry>>,
}

impl LogbookCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached entries for a causation context, if fetched before.
    pub fn get(&self, context_id: &str) -> Option<&[LogbookEntry]> {
        self.entries.get(context_id).map(Vec::as_slice)
    }

    /// Stores a fetched slice, normalizing it to ascending order first.
    /// Returns the cached slice.
    pub fn insert(&mut self, context_id: &str, mut entries: Vec<LogbookEntry>) -> &[LogbookEntry] {
        ensure_ascending(&mut entries);
        let slot = self.entries.entry(context_id.to_string()).or_default();
        *slot = entries;
        slot.as_slice()
    }

    /// Number of cached contexts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
