//! Calendar domain types
//!
//! Shared types for calendar sources, cached events, time ranges, and
//! per-calendar incremental sync state.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access level granted on a calendar by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessRole {
    Owner,
    Writer,
    Reader,
}

/// A calendar as listed by the provider.
///
/// Fetched fresh on every sync cycle and never cached long-term.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarSource {
    pub id: String,
    pub summary: String,
    pub display_color: String,
    pub access_role: AccessRole,
    pub hidden: bool,
}

/// Inclusive instant range `[min, max]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub min: DateTime<Utc>,
    pub max: DateTime<Utc>,
}

impl TimeRange {
    /// Create a new range. `min` and `max` are taken as given; callers are
    /// expected to pass `min <= max`.
    #[must_use]
    pub const fn new(min: DateTime<Utc>, max: DateTime<Utc>) -> Self {
        Self { min, max }
    }

    /// Whether `instant` lies within this range (inclusive bounds).
    #[must_use]
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.min <= instant && instant <= self.max
    }

    /// Whether `other` is fully contained in this range.
    #[must_use]
    pub fn contains_range(&self, other: &Self) -> bool {
        self.min <= other.min && other.max <= self.max
    }

    /// The smallest range covering both `self` and `other`.
    ///
    /// Union never shrinks either operand, which is what makes a cursor's
    /// fetched range grow monotonically across full-fetch merges.
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self { min: self.min.min(other.min), max: self.max.max(other.max) }
    }

    /// This range widened by `days` on both ends.
    #[must_use]
    pub fn padded(&self, days: i64) -> Self {
        Self { min: self.min - Duration::days(days), max: self.max + Duration::days(days) }
    }
}

/// Per-calendar incremental sync state.
///
/// `token` is the provider-issued opaque cursor; `fetched_range` is the date
/// interval for which the local cache is a complete reflection of provider
/// state. Both are `None` until the first successful full fetch, and both are
/// reset together on full invalidation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursor {
    pub token: Option<String>,
    pub fetched_range: Option<TimeRange>,
}

impl SyncCursor {
    /// A cursor with neither token nor fetched range.
    #[must_use]
    pub const fn empty() -> Self {
        Self { token: None, fetched_range: None }
    }

    /// Whether this cursor carries no sync state at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.token.is_none() && self.fetched_range.is_none()
    }
}

/// A cached calendar event.
///
/// `start`/`end` are normalized to UTC instants at the provider boundary;
/// all-day events carry their date's midnight with `is_all_day = true`.
/// `recurring_event_id`, when present, identifies the series master this
/// instance belongs to. Cached events are never mutated in place; an update
/// is a remove-then-insert under the same id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalendarEvent {
    pub id: String,
    pub calendar_id: String,
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
    pub recurring_event_id: Option<String>,
}

/// Payload for creating or updating an event through the mutation gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDraft {
    pub title: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub is_all_day: bool,
    pub location: Option<String>,
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    //! Unit tests for types::calendar.
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().expect("valid timestamp")
    }

    #[test]
    fn contains_range_is_inclusive() {
        let outer = TimeRange::new(utc(2025, 1, 1), utc(2025, 2, 1));
        let inner = TimeRange::new(utc(2025, 1, 10), utc(2025, 1, 20));

        assert!(outer.contains_range(&inner));
        assert!(outer.contains_range(&outer));
        assert!(!inner.contains_range(&outer));
    }

    #[test]
    fn union_covers_disjoint_ranges() {
        let january = TimeRange::new(utc(2025, 1, 1), utc(2025, 1, 31));
        let march = TimeRange::new(utc(2025, 3, 1), utc(2025, 3, 31));

        let combined = january.union(&march);
        assert_eq!(combined.min, january.min);
        assert_eq!(combined.max, march.max);
        assert!(combined.contains_range(&january));
        assert!(combined.contains_range(&march));
    }

    /// Union never shrinks either operand.
    #[test]
    fn union_is_monotonic() {
        let wide = TimeRange::new(utc(2025, 1, 1), utc(2025, 6, 1));
        let narrow = TimeRange::new(utc(2025, 2, 1), utc(2025, 3, 1));

        assert_eq!(wide.union(&narrow), wide);
        assert_eq!(narrow.union(&wide), wide);
    }

    #[test]
    fn padded_widens_both_ends() {
        let range = TimeRange::new(utc(2025, 1, 8), utc(2025, 1, 15));
        let padded = range.padded(7);

        assert_eq!(padded.min, utc(2025, 1, 1));
        assert_eq!(padded.max, utc(2025, 1, 22));
    }

    #[test]
    fn empty_cursor_has_no_state() {
        let cursor = SyncCursor::empty();
        assert!(cursor.is_empty());

        let with_token =
            SyncCursor { token: Some("tok".to_string()), fetched_range: None };
        assert!(!with_token.is_empty());
    }
}
