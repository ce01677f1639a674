//! Mutation gateway
//!
//! Create/update/delete go straight to the provider, bypassing the cache.
//! Immediately after a successful write the affected calendar's cursor is
//! fully cleared, forcing the next cycle to perform a full fetch - one extra
//! full fetch per mutation buys out of reasoning about how a local write
//! interacts with an in-flight or future incremental delta.
//!
//! Recurring routing: an operation on an event that belongs to a series
//! must state its target explicitly - the single instance or the whole
//! series. The gateway has no default and never guesses.

use std::sync::Arc;

use homeboard_core::{CalendarApi, SyncCursorStore};
use homeboard_domain::{CalendarEvent, EventDraft, HomeboardError, Result};
use tracing::{info, instrument};

/// Caller-supplied target of an edit or delete on a recurring event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecurringScope {
    /// Apply to this instance only.
    Instance,
    /// Apply to the entire series (the series master).
    Series,
}

/// Gateway for event mutations against the provider.
pub struct MutationGateway {
    api: Arc<dyn CalendarApi>,
    cursors: Arc<dyn SyncCursorStore>,
}

impl MutationGateway {
    /// Create a gateway over the provider API and cursor store.
    #[must_use]
    pub fn new(api: Arc<dyn CalendarApi>, cursors: Arc<dyn SyncCursorStore>) -> Self {
        Self { api, cursors }
    }

    /// Create a new event on `calendar_id`.
    ///
    /// # Errors
    /// Surfaces provider errors to the caller; no local state is written on
    /// failure.
    #[instrument(skip(self, draft))]
    pub async fn create_event(
        &self,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<CalendarEvent> {
        let created = self.api.insert_event(calendar_id, draft).await?;
        self.invalidate(calendar_id).await?;
        info!(calendar_id, event_id = %created.id, "event created");
        Ok(created)
    }

    /// Update `event`, routed per `scope` when it belongs to a series.
    ///
    /// # Errors
    /// Returns `HomeboardError::InvalidInput` when `event` is recurring and
    /// `scope` is absent, or when a series edit is requested for an event
    /// with no known series id.
    #[instrument(skip(self, event, draft), fields(event_id = %event.id))]
    pub async fn update_event(
        &self,
        event: &CalendarEvent,
        scope: Option<RecurringScope>,
        draft: &EventDraft,
    ) -> Result<CalendarEvent> {
        let target = resolve_target(event, scope)?;
        let updated = self.api.patch_event(&event.calendar_id, target, draft).await?;
        self.invalidate(&event.calendar_id).await?;
        info!(calendar_id = %event.calendar_id, target, "event updated");
        Ok(updated)
    }

    /// Delete `event`, routed per `scope` when it belongs to a series.
    ///
    /// # Errors
    /// Same routing errors as `update_event`; provider errors are surfaced.
    #[instrument(skip(self, event), fields(event_id = %event.id))]
    pub async fn delete_event(
        &self,
        event: &CalendarEvent,
        scope: Option<RecurringScope>,
    ) -> Result<()> {
        let target = resolve_target(event, scope)?;
        self.api.delete_event(&event.calendar_id, target).await?;
        self.invalidate(&event.calendar_id).await?;
        info!(calendar_id = %event.calendar_id, target, "event deleted");
        Ok(())
    }

    /// Clear the calendar's cursor so the next cycle re-synchronizes with a
    /// full fetch.
    async fn invalidate(&self, calendar_id: &str) -> Result<()> {
        self.cursors.clear(calendar_id).await
    }
}

/// Resolve which provider event id a mutation targets.
///
/// For events in a recurring series the caller must choose between the
/// instance id and the series master id; series operations require the
/// series id to be known locally.
fn resolve_target<'a>(
    event: &'a CalendarEvent,
    scope: Option<RecurringScope>,
) -> Result<&'a str> {
    match (event.recurring_event_id.as_deref(), scope) {
        // Not part of a series: the instance id is the only target.
        (None, None | Some(RecurringScope::Instance)) => Ok(&event.id),
        (None, Some(RecurringScope::Series)) => Err(HomeboardError::InvalidInput(format!(
            "event '{}' is not part of a recurring series",
            event.id
        ))),
        // Part of a series: the caller must state its intent.
        (Some(_), None) => Err(HomeboardError::InvalidInput(format!(
            "event '{}' belongs to a series; choose instance or series",
            event.id
        ))),
        (Some(_), Some(RecurringScope::Instance)) => Ok(&event.id),
        (Some(series_id), Some(RecurringScope::Series)) => Ok(series_id),
    }
}
