//! Calendar integration port interfaces
//!
//! Traits implemented by the infrastructure layer: durable storage for the
//! credential and per-calendar sync cursors, and the provider API surface
//! the sync engine and mutation gateway call.

use async_trait::async_trait;
use homeboard_domain::{
    CalendarEvent, CalendarSource, Credential, EventDraft, HomeboardError, Result, SyncCursor,
    TimeRange,
};

/// Opaque durable string-keyed storage.
///
/// The engine persists exactly two logical records through this interface:
/// the current credential and the per-calendar cursor map. No specific
/// storage technology is mandated.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key` and its value. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// Durable persistence for the current OAuth credential.
///
/// Mutated only by the credential lifecycle manager.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Load the persisted credential, if one exists.
    async fn load(&self) -> Result<Option<Credential>>;

    /// Persist `credential`, replacing any previous one.
    async fn save(&self, credential: &Credential) -> Result<()>;

    /// Destroy the persisted credential.
    async fn clear(&self) -> Result<()>;
}

/// Durable per-calendar sync cursor persistence.
///
/// Mutated only through the sync engine and the mutation gateway.
#[async_trait]
pub trait SyncCursorStore: Send + Sync {
    /// Load the cursor for `calendar_id`. An absent record loads as the
    /// empty cursor.
    async fn load(&self, calendar_id: &str) -> Result<SyncCursor>;

    /// Persist the cursor for `calendar_id`.
    async fn save(&self, calendar_id: &str, cursor: &SyncCursor) -> Result<()>;

    /// Fully invalidate the cursor for `calendar_id` (token and range).
    async fn clear(&self, calendar_id: &str) -> Result<()>;

    /// Invalidate every calendar's cursor (session termination).
    async fn clear_all(&self) -> Result<()>;
}

/// A single event entry from a provider fetch.
///
/// `event` is `None` when the provider reported the id as
/// cancelled/deleted; the reconciler removes such ids without reinserting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventChange {
    pub id: String,
    pub event: Option<CalendarEvent>,
}

/// The settled result of one provider fetch (all pages accumulated).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchBatch {
    pub changes: Vec<EventChange>,
    pub next_sync_token: Option<String>,
}

/// Failure modes of an incremental fetch.
///
/// An expired sync token (`410 Gone`) is typed rather than string-matched so
/// the orchestrator can clear the cursor without inspecting messages.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("incremental sync token expired")]
    SyncTokenExpired,

    #[error(transparent)]
    Other(#[from] HomeboardError),
}

/// Provider API surface used by the sync engine and mutation gateway.
#[async_trait]
pub trait CalendarApi: Send + Sync {
    /// List the user's calendars (fresh every cycle).
    async fn list_calendars(&self) -> Result<Vec<CalendarSource>>;

    /// Fetch the complete current state for `range`, with recurring series
    /// expanded to single events by the provider.
    async fn fetch_range(&self, calendar_id: &str, range: TimeRange) -> Result<FetchBatch>;

    /// Fetch only the changes since `sync_token` was issued.
    async fn fetch_changes(
        &self,
        calendar_id: &str,
        sync_token: &str,
    ) -> std::result::Result<FetchBatch, FetchError>;

    /// Create an event; the provider assigns the id.
    async fn insert_event(&self, calendar_id: &str, draft: &EventDraft) -> Result<CalendarEvent>;

    /// Update the event identified by `event_id`.
    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<CalendarEvent>;

    /// Delete the event identified by `event_id`.
    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()>;
}
