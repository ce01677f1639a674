//! Local event cache
//!
//! The set of all events currently believed accurate, keyed by
//! `(calendar_id, event_id)`. The cache is an immutable value from the
//! perspective of everything except the reconciler: each sync cycle computes
//! a new cache and swaps it in wholesale, so no partially-merged state is
//! ever observable. Mutating methods are crate-private to enforce that only
//! the reconciler writes.

use std::collections::BTreeMap;

use homeboard_domain::CalendarEvent;

/// Immutable snapshot of cached events, keyed by `(calendar_id, id)`.
///
/// Backed by a `BTreeMap` so iteration order is deterministic, which keeps
/// repeated no-op sync cycles byte-for-byte identical.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventCache {
    events: BTreeMap<(String, String), CalendarEvent>,
}

impl EventCache {
    /// An empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of cached events across all calendars.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the cache holds no events at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Look up one event.
    #[must_use]
    pub fn get(&self, calendar_id: &str, event_id: &str) -> Option<&CalendarEvent> {
        self.events.get(&(calendar_id.to_string(), event_id.to_string()))
    }

    /// Iterate over every cached event in deterministic order.
    pub fn events(&self) -> impl Iterator<Item = &CalendarEvent> {
        self.events.values()
    }

    /// Iterate over the events of one calendar.
    pub fn events_for<'a>(
        &'a self,
        calendar_id: &'a str,
    ) -> impl Iterator<Item = &'a CalendarEvent> {
        self.events.values().filter(move |event| event.calendar_id == calendar_id)
    }

    /// Number of cached events for one calendar.
    #[must_use]
    pub fn count_for(&self, calendar_id: &str) -> usize {
        self.events_for(calendar_id).count()
    }

    pub(crate) fn insert(&mut self, event: CalendarEvent) {
        self.events.insert((event.calendar_id.clone(), event.id.clone()), event);
    }

    pub(crate) fn remove(&mut self, calendar_id: &str, event_id: &str) {
        self.events.remove(&(calendar_id.to_string(), event_id.to_string()));
    }

    pub(crate) fn retain(&mut self, mut keep: impl FnMut(&CalendarEvent) -> bool) {
        self.events.retain(|_, event| keep(event));
    }
}
