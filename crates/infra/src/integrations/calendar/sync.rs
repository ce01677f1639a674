//! Calendar sync engine
//!
//! Orchestrates one sync cycle: plan per calendar, fetch every visible
//! calendar concurrently (fan-out/fan-in), fold the results into a new cache
//! value, and swap it in atomically. Per-calendar failures are isolated - a
//! calendar that fails keeps its prior cache entries for the cycle and the
//! others proceed untouched. An expired incremental token (`410 Gone`)
//! clears that calendar's cursor so the next cycle performs a full fetch; it
//! is not retried within the cycle.

use std::sync::Arc;

use futures::future::join_all;
use homeboard_core::{
    merge_full, merge_incremental, plan, CalendarApi, EventCache, FetchBatch, FetchError,
    SyncCursorStore, SyncPlan,
};
use homeboard_domain::{CalendarSource, Result, SyncCursor, TimeRange};
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

/// Per-calendar result of one sync cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalendarSyncResult {
    /// Fetch and merge succeeded.
    Merged { events: usize },
    /// The incremental token was expired; the cursor was cleared and the
    /// next cycle will fetch the full range.
    CursorExpired,
    /// Fetch or persistence failed; prior cache entries were left untouched.
    Failed { error: String },
}

/// One calendar's outcome within a cycle report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarSyncOutcome {
    pub calendar_id: String,
    pub result: CalendarSyncResult,
}

/// Report for one sync cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub outcomes: Vec<CalendarSyncOutcome>,
}

impl SyncReport {
    /// Number of calendars that merged successfully.
    #[must_use]
    pub fn merged(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, CalendarSyncResult::Merged { .. }))
            .count()
    }

    /// Number of calendars that failed this cycle.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.result, CalendarSyncResult::Failed { .. }))
            .count()
    }
}

/// What one calendar's fetch produced, before merging.
enum CalendarFetch {
    Full { range: TimeRange, batch: FetchBatch, cursor: SyncCursor },
    Incremental { batch: FetchBatch, cursor: SyncCursor },
    TokenExpired,
    Failed(String),
}

/// Calendar sync engine.
///
/// Owns the local event cache; everything else reads immutable snapshots.
pub struct SyncEngine {
    api: Arc<dyn CalendarApi>,
    cursors: Arc<dyn SyncCursorStore>,
    cache: RwLock<Arc<EventCache>>,
    last_window: RwLock<Option<TimeRange>>,
    padding_days: i64,
}

impl SyncEngine {
    /// Create an engine over the provider API and cursor store.
    #[must_use]
    pub fn new(
        api: Arc<dyn CalendarApi>,
        cursors: Arc<dyn SyncCursorStore>,
        padding_days: i64,
    ) -> Self {
        Self {
            api,
            cursors,
            cache: RwLock::new(Arc::new(EventCache::new())),
            last_window: RwLock::new(None),
            padding_days,
        }
    }

    /// Immutable snapshot of the current event cache.
    pub async fn snapshot(&self) -> Arc<EventCache> {
        Arc::clone(&*self.cache.read().await)
    }

    /// Run one sync cycle for `view`.
    ///
    /// # Errors
    /// Returns an error only when the calendar list itself cannot be
    /// fetched; per-calendar failures are reported in the `SyncReport`.
    #[instrument(skip(self))]
    pub async fn sync_window(&self, view: TimeRange) -> Result<SyncReport> {
        *self.last_window.write().await = Some(view);

        let calendars = self.api.list_calendars().await?;
        let visible: Vec<CalendarSource> =
            calendars.into_iter().filter(|c| !c.hidden).collect();

        let snapshot = self.snapshot().await;

        // Fan-out: all visible calendars fetch concurrently; the cycle
        // resumes once every fetch has settled.
        let fetches = visible.iter().map(|calendar| {
            let snapshot = Arc::clone(&snapshot);
            async move {
                let fetch = self.fetch_calendar(calendar, &snapshot, view).await;
                (calendar.id.clone(), fetch)
            }
        });
        let settled = join_all(fetches).await;

        // Fan-in: fold every merge into one new cache value, then swap it
        // in atomically so no partially-merged state is observable.
        let mut next = (*snapshot).clone();
        let mut outcomes = Vec::with_capacity(settled.len());

        for (calendar_id, fetch) in settled {
            let result = match fetch {
                CalendarFetch::Full { range, batch, cursor } => {
                    let events = batch.changes.iter().filter(|c| c.event.is_some()).count();
                    let merged = merge_full(&next, &calendar_id, range, &batch, &cursor);
                    next = merged.cache;
                    self.persist_cursor(&calendar_id, &merged.cursor, events).await
                }
                CalendarFetch::Incremental { batch, cursor } => {
                    let events = batch.changes.iter().filter(|c| c.event.is_some()).count();
                    let merged = merge_incremental(&next, &calendar_id, &batch, &cursor);
                    next = merged.cache;
                    self.persist_cursor(&calendar_id, &merged.cursor, events).await
                }
                CalendarFetch::TokenExpired => {
                    warn!(%calendar_id, "sync token expired, cursor cleared");
                    if let Err(err) = self.cursors.clear(&calendar_id).await {
                        warn!(%calendar_id, error = %err, "failed to clear cursor");
                    }
                    CalendarSyncResult::CursorExpired
                }
                CalendarFetch::Failed(error) => {
                    warn!(%calendar_id, error = %error, "calendar fetch failed, cache left stale");
                    CalendarSyncResult::Failed { error }
                }
            };

            outcomes.push(CalendarSyncOutcome { calendar_id, result });
        }

        *self.cache.write().await = Arc::new(next);

        let report = SyncReport { outcomes };
        info!(
            calendars = report.outcomes.len(),
            merged = report.merged(),
            failed = report.failed(),
            "sync cycle completed"
        );
        Ok(report)
    }

    /// Re-run the cycle for the last requested view window (scheduled poll).
    ///
    /// Returns `None` when no window has been requested yet.
    ///
    /// # Errors
    /// Propagates the same errors as `sync_window`.
    pub async fn sync_last_window(&self) -> Result<Option<SyncReport>> {
        let window = *self.last_window.read().await;
        match window {
            Some(view) => self.sync_window(view).await.map(Some),
            None => {
                debug!("no view window requested yet, skipping scheduled sync");
                Ok(None)
            }
        }
    }

    /// Plan and execute the fetch for one calendar.
    async fn fetch_calendar(
        &self,
        calendar: &CalendarSource,
        snapshot: &EventCache,
        view: TimeRange,
    ) -> CalendarFetch {
        let cursor = match self.cursors.load(&calendar.id).await {
            Ok(cursor) => cursor,
            Err(err) => return CalendarFetch::Failed(err.to_string()),
        };

        let decision = plan(view, &cursor, snapshot.count_for(&calendar.id), self.padding_days);

        // A stale cursor (token without cached events) is invalidated up
        // front so a failed fetch still leaves the next cycle consistent.
        let cursor = if decision.invalidates_cursor() {
            if let Err(err) = self.cursors.clear(&calendar.id).await {
                return CalendarFetch::Failed(err.to_string());
            }
            SyncCursor::empty()
        } else {
            cursor
        };

        match decision {
            SyncPlan::Full { range, reason } => {
                debug!(calendar_id = %calendar.id, ?reason, "planned full fetch");
                match self.api.fetch_range(&calendar.id, range).await {
                    Ok(batch) => CalendarFetch::Full { range, batch, cursor },
                    Err(err) => CalendarFetch::Failed(err.to_string()),
                }
            }
            SyncPlan::Incremental { token } => {
                debug!(calendar_id = %calendar.id, "planned incremental fetch");
                match self.api.fetch_changes(&calendar.id, &token).await {
                    Ok(batch) => CalendarFetch::Incremental { batch, cursor },
                    Err(FetchError::SyncTokenExpired) => CalendarFetch::TokenExpired,
                    Err(FetchError::Other(err)) => CalendarFetch::Failed(err.to_string()),
                }
            }
        }
    }

    async fn persist_cursor(
        &self,
        calendar_id: &str,
        cursor: &SyncCursor,
        events: usize,
    ) -> CalendarSyncResult {
        match self.cursors.save(calendar_id, cursor).await {
            Ok(()) => CalendarSyncResult::Merged { events },
            Err(err) => {
                warn!(%calendar_id, error = %err, "failed to persist cursor");
                CalendarSyncResult::Failed { error: err.to_string() }
            }
        }
    }
}
