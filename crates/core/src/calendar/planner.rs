//! Sync planner
//!
//! Decides, per calendar and per requested view window, whether the next
//! fetch is a full range query or an incremental delta. An incremental token
//! only returns changes since it was issued - never events by date - so any
//! window not fully covered by the cursor's fetched range forces a range
//! query regardless of token validity.

use homeboard_domain::{SyncCursor, TimeRange};

/// Why a full fetch was chosen over an incremental one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FullFetchReason {
    /// No incremental token exists for this calendar.
    NoCursor,
    /// A token exists but the local cache holds no events for the calendar;
    /// the cache was likely cleared by a reload and the cursor is stale.
    /// The caller must clear the persisted cursor before fetching.
    StaleCursor,
    /// The requested window reaches outside the fetched range.
    WindowNotCovered,
}

/// The fetch decision for one calendar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPlan {
    /// Full range fetch over `range` (the padded view window).
    Full { range: TimeRange, reason: FullFetchReason },
    /// Incremental fetch trading in `token` verbatim.
    Incremental { token: String },
}

impl SyncPlan {
    /// Whether the caller must clear the persisted cursor before fetching.
    #[must_use]
    pub const fn invalidates_cursor(&self) -> bool {
        matches!(self, Self::Full { reason: FullFetchReason::StaleCursor, .. })
    }
}

/// Decide the fetch mode for one calendar.
///
/// # Arguments
/// * `view` - the requested view window
/// * `cursor` - the calendar's persisted sync cursor
/// * `cached_events` - how many events the local cache currently holds for
///   this calendar
/// * `padding_days` - margin added around `view` on full fetches, absorbing
///   small forward/backward navigation without re-fetching
#[must_use]
pub fn plan(
    view: TimeRange,
    cursor: &SyncCursor,
    cached_events: usize,
    padding_days: i64,
) -> SyncPlan {
    let Some(token) = cursor.token.as_deref() else {
        return SyncPlan::Full { range: view.padded(padding_days), reason: FullFetchReason::NoCursor };
    };

    if cached_events == 0 {
        return SyncPlan::Full {
            range: view.padded(padding_days),
            reason: FullFetchReason::StaleCursor,
        };
    }

    let covered = cursor.fetched_range.as_ref().is_some_and(|range| range.contains_range(&view));
    if !covered {
        return SyncPlan::Full {
            range: view.padded(padding_days),
            reason: FullFetchReason::WindowNotCovered,
        };
    }

    SyncPlan::Incremental { token: token.to_string() }
}
