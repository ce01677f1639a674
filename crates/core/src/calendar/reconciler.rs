//! Reconciler
//!
//! Pure merge rules folding one calendar's fetch result into the event
//! cache. Both paths uphold the same invariant: after a merge the cache
//! holds no two entries sharing an id and no entry the provider reported
//! cancelled.
//!
//! Full fetches return current state but never enumerate deletions, so the
//! full merge first discards every cached event of the calendar whose start
//! falls inside the fetched range - an event deleted remotely disappears
//! locally because it simply fails to reappear. Incremental responses
//! enumerate changed ids explicitly, so only mentioned ids are touched.

use homeboard_domain::{SyncCursor, TimeRange};
use tracing::debug;

use super::cache::EventCache;
use super::ports::FetchBatch;

/// Result of merging one calendar's fetch into the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub cache: EventCache,
    pub cursor: SyncCursor,
}

/// Merge a full-range fetch for `calendar_id` into `cache`.
///
/// Every cached event of this calendar starting inside `fetched` is
/// discarded regardless of whether it reappears in the response; the
/// response's non-cancelled events are then inserted. The cursor's fetched
/// range grows to the union of old and new (it never shrinks), and the token
/// is replaced by the response's sync token.
#[must_use]
pub fn merge_full(
    cache: &EventCache,
    calendar_id: &str,
    fetched: TimeRange,
    batch: &FetchBatch,
    previous: &SyncCursor,
) -> MergeOutcome {
    let mut next = cache.clone();

    next.retain(|event| !(event.calendar_id == calendar_id && fetched.contains(event.start)));

    let mut inserted = 0usize;
    for change in &batch.changes {
        if let Some(event) = &change.event {
            // Remove first: an event may have moved out of the fetched range
            // while its cached copy sits outside it.
            next.remove(calendar_id, &change.id);
            next.insert(event.clone());
            inserted += 1;
        }
    }

    let fetched_range =
        Some(previous.fetched_range.map_or(fetched, |existing| existing.union(&fetched)));

    debug!(calendar_id, inserted, "merged full fetch");

    MergeOutcome {
        cache: next,
        cursor: SyncCursor { token: batch.next_sync_token.clone(), fetched_range },
    }
}

/// Merge an incremental fetch for `calendar_id` into `cache`.
///
/// For every id in the response any cached copy is removed first, then the
/// non-cancelled entries are reinserted; ids the response does not mention
/// are left untouched. The token is replaced by the response's new token,
/// or kept unchanged when the provider returned none.
#[must_use]
pub fn merge_incremental(
    cache: &EventCache,
    calendar_id: &str,
    batch: &FetchBatch,
    previous: &SyncCursor,
) -> MergeOutcome {
    let mut next = cache.clone();

    let mut removed = 0usize;
    let mut inserted = 0usize;
    for change in &batch.changes {
        next.remove(calendar_id, &change.id);
        removed += 1;
        if let Some(event) = &change.event {
            next.insert(event.clone());
            inserted += 1;
        }
    }

    let token = batch.next_sync_token.clone().or_else(|| previous.token.clone());

    debug!(calendar_id, removed, inserted, "merged incremental fetch");

    MergeOutcome {
        cache: next,
        cursor: SyncCursor { token, fetched_range: previous.fetched_range },
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for calendar::reconciler.
    use std::collections::HashSet;

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use homeboard_domain::CalendarEvent;

    use super::*;
    use crate::calendar::ports::EventChange;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().expect("valid timestamp")
    }

    fn event(calendar_id: &str, id: &str, start: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            id: id.to_string(),
            calendar_id: calendar_id.to_string(),
            title: format!("event {id}"),
            start,
            end: start + Duration::hours(1),
            is_all_day: false,
            location: None,
            description: None,
            recurring_event_id: None,
        }
    }

    fn cache_of(events: Vec<CalendarEvent>) -> EventCache {
        let mut cache = EventCache::new();
        for e in events {
            cache.insert(e);
        }
        cache
    }

    fn upsert(e: CalendarEvent) -> EventChange {
        EventChange { id: e.id.clone(), event: Some(e) }
    }

    fn cancelled(id: &str) -> EventChange {
        EventChange { id: id.to_string(), event: None }
    }

    /// Events inside the fetched range that do not reappear in the response
    /// are gone after the merge (remote deletions are implicit).
    #[test]
    fn full_merge_drops_stale_events_in_range() {
        let range = TimeRange::new(utc(2025, 1, 1), utc(2025, 2, 1));
        let cache = cache_of(vec![
            event("work", "stale", utc(2025, 1, 10)),
            event("work", "kept", utc(2025, 1, 12)),
            event("work", "outside", utc(2025, 3, 5)),
            event("home", "other-cal", utc(2025, 1, 15)),
        ]);
        let batch = FetchBatch {
            changes: vec![upsert(event("work", "kept", utc(2025, 1, 12)))],
            next_sync_token: Some("tok1".to_string()),
        };

        let outcome = merge_full(&cache, "work", range, &batch, &SyncCursor::empty());

        assert!(outcome.cache.get("work", "stale").is_none());
        assert!(outcome.cache.get("work", "kept").is_some());
        // Events outside the fetched range survive untouched.
        assert!(outcome.cache.get("work", "outside").is_some());
        // Other calendars are never touched by this calendar's merge.
        assert!(outcome.cache.get("home", "other-cal").is_some());
        assert_eq!(outcome.cursor.token.as_deref(), Some("tok1"));
    }

    /// The fetched range after a full merge is a superset of the range
    /// before it, even when the new fetch is disjoint from the old one.
    #[test]
    fn full_merge_grows_fetched_range_monotonically() {
        let previous = SyncCursor {
            token: Some("tok0".to_string()),
            fetched_range: Some(TimeRange::new(utc(2025, 1, 1), utc(2025, 2, 1))),
        };
        let fetched = TimeRange::new(utc(2025, 3, 1), utc(2025, 3, 31));
        let batch = FetchBatch { changes: vec![], next_sync_token: Some("tok1".to_string()) };

        let outcome = merge_full(&EventCache::new(), "work", fetched, &batch, &previous);

        let range = outcome.cursor.fetched_range.expect("range must be set");
        assert!(range.contains_range(&fetched));
        assert!(range.contains_range(&TimeRange::new(utc(2025, 1, 1), utc(2025, 2, 1))));
    }

    /// An incremental response removes cancelled ids without reinserting
    /// them and replaces the token (Google's `nextSyncToken` handoff).
    #[test]
    fn incremental_merge_removes_cancelled_events() {
        let cache = cache_of(vec![
            event("work", "e1", utc(2025, 1, 10)),
            event("work", "e2", utc(2025, 1, 11)),
        ]);
        let previous = SyncCursor {
            token: Some("tok1".to_string()),
            fetched_range: Some(TimeRange::new(utc(2025, 1, 1), utc(2025, 2, 1))),
        };
        let batch = FetchBatch {
            changes: vec![cancelled("e1")],
            next_sync_token: Some("tok2".to_string()),
        };

        let outcome = merge_incremental(&cache, "work", &batch, &previous);

        assert!(outcome.cache.get("work", "e1").is_none());
        assert!(outcome.cache.get("work", "e2").is_some());
        assert_eq!(outcome.cursor.token.as_deref(), Some("tok2"));
        // The fetched range is not affected by incremental merges.
        assert_eq!(outcome.cursor.fetched_range, previous.fetched_range);
    }

    /// Cancelling an id that was never cached is a no-op, not an error.
    #[test]
    fn incremental_merge_tolerates_unknown_cancelled_id() {
        let cache = cache_of(vec![event("work", "e1", utc(2025, 1, 10))]);
        let previous = SyncCursor { token: Some("tok1".to_string()), fetched_range: None };
        let batch =
            FetchBatch { changes: vec![cancelled("ghost")], next_sync_token: None };

        let outcome = merge_incremental(&cache, "work", &batch, &previous);

        assert_eq!(outcome.cache.len(), 1);
        // No new token in the response: the existing one is kept.
        assert_eq!(outcome.cursor.token.as_deref(), Some("tok1"));
    }

    /// An updated event replaces its cached copy instead of duplicating it.
    #[test]
    fn incremental_merge_replaces_updated_events() {
        let cache = cache_of(vec![event("work", "e1", utc(2025, 1, 10))]);
        let previous = SyncCursor { token: Some("tok1".to_string()), fetched_range: None };
        let mut updated = event("work", "e1", utc(2025, 1, 18));
        updated.title = "moved".to_string();
        let batch = FetchBatch {
            changes: vec![upsert(updated)],
            next_sync_token: Some("tok2".to_string()),
        };

        let outcome = merge_incremental(&cache, "work", &batch, &previous);

        assert_eq!(outcome.cache.count_for("work"), 1);
        let merged = outcome.cache.get("work", "e1").expect("event present");
        assert_eq!(merged.title, "moved");
        assert_eq!(merged.start, utc(2025, 1, 18));
    }

    /// Re-running a merge with an unchanged response leaves the cache
    /// byte-for-byte identical.
    #[test]
    fn unchanged_incremental_merge_is_idempotent() {
        let cache = cache_of(vec![
            event("work", "e1", utc(2025, 1, 10)),
            event("work", "e2", utc(2025, 1, 11)),
        ]);
        let previous = SyncCursor { token: Some("tok1".to_string()), fetched_range: None };
        let empty = FetchBatch { changes: vec![], next_sync_token: Some("tok1".to_string()) };

        let once = merge_incremental(&cache, "work", &empty, &previous);
        let twice = merge_incremental(&once.cache, "work", &empty, &once.cursor);

        assert_eq!(once.cache, twice.cache);
        assert_eq!(once.cursor, twice.cursor);
        assert_eq!(cache, once.cache);
    }

    /// After any merge each `(calendar_id, id)` pair appears at most once,
    /// even when the response itself repeats an id.
    #[test]
    fn merges_never_produce_duplicate_ids() {
        let range = TimeRange::new(utc(2025, 1, 1), utc(2025, 2, 1));
        let batch = FetchBatch {
            changes: vec![
                upsert(event("work", "e1", utc(2025, 1, 10))),
                upsert(event("work", "e1", utc(2025, 1, 12))),
            ],
            next_sync_token: Some("tok1".to_string()),
        };

        let outcome =
            merge_full(&EventCache::new(), "work", range, &batch, &SyncCursor::empty());

        let ids: Vec<_> =
            outcome.cache.events().map(|e| (e.calendar_id.clone(), e.id.clone())).collect();
        let unique: HashSet<_> = ids.iter().cloned().collect();
        assert_eq!(ids.len(), unique.len());
        assert_eq!(outcome.cache.count_for("work"), 1);
        // Last write wins within one response.
        assert_eq!(
            outcome.cache.get("work", "e1").map(|e| e.start),
            Some(utc(2025, 1, 12))
        );
    }
}
