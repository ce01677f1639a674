//! Calendar API client with credential management
//!
//! Binds the credential manager to the provider REST client and implements
//! the `CalendarApi` port: every call obtains a valid access token first
//! (refreshing silently when needed), and event listings follow pagination
//! until the provider reports no further pages.

use std::sync::Arc;

use async_trait::async_trait;
use homeboard_core::{CalendarApi, FetchBatch, FetchError};
use homeboard_domain::constants::DEFAULT_MAX_RESULTS;
use homeboard_domain::{CalendarEvent, CalendarSource, EventDraft, Result, TimeRange};
use tracing::debug;

use super::oauth::CredentialManager;
use super::providers::google::{GoogleCalendarApi, ProviderError};

/// Provider API client implementing the `CalendarApi` port.
pub struct CalendarClient {
    credentials: Arc<CredentialManager>,
    api: GoogleCalendarApi,
    max_results: u32,
}

impl CalendarClient {
    /// Create a client against `base_url` using `credentials` for tokens.
    #[must_use]
    pub fn new(credentials: Arc<CredentialManager>, base_url: impl Into<String>) -> Self {
        Self { credentials, api: GoogleCalendarApi::new(base_url), max_results: DEFAULT_MAX_RESULTS }
    }

    /// Accumulate every page of an events listing into one batch.
    async fn fetch_all_pages(
        &self,
        access_token: &str,
        calendar_id: &str,
        base_params: &[(&str, String)],
    ) -> std::result::Result<FetchBatch, ProviderError> {
        let mut batch = FetchBatch::default();
        let mut page_token: Option<String> = None;

        loop {
            let mut params = base_params.to_vec();
            if let Some(token) = &page_token {
                params.push(("pageToken", token.clone()));
            }

            let page = self.api.events_page(access_token, calendar_id, &params).await?;

            batch.changes.extend(page.changes);
            // The sync token arrives on the final page only.
            batch.next_sync_token = page.next_sync_token.or(batch.next_sync_token);
            page_token = page.next_page_token;

            if page_token.is_none() {
                break;
            }
        }

        debug!(calendar_id, changes = batch.changes.len(), "fetched event pages");
        Ok(batch)
    }
}

#[async_trait]
impl CalendarApi for CalendarClient {
    async fn list_calendars(&self) -> Result<Vec<CalendarSource>> {
        let access_token = self.credentials.access_token().await?;
        self.api.list_calendars(&access_token).await.map_err(Into::into)
    }

    async fn fetch_range(&self, calendar_id: &str, range: TimeRange) -> Result<FetchBatch> {
        let access_token = self.credentials.access_token().await?;

        // singleEvents expands recurring series into instances server-side;
        // this engine deliberately ships no recurrence math of its own.
        let params = [
            ("singleEvents", "true".to_string()),
            ("timeMin", range.min.to_rfc3339()),
            ("timeMax", range.max.to_rfc3339()),
            ("maxResults", self.max_results.to_string()),
        ];

        self.fetch_all_pages(&access_token, calendar_id, &params)
            .await
            .map_err(Into::into)
    }

    async fn fetch_changes(
        &self,
        calendar_id: &str,
        sync_token: &str,
    ) -> std::result::Result<FetchBatch, FetchError> {
        let access_token =
            self.credentials.access_token().await.map_err(FetchError::Other)?;

        let params = [("syncToken", sync_token.to_string())];

        self.fetch_all_pages(&access_token, calendar_id, &params).await.map_err(|err| {
            match err {
                ProviderError::SyncTokenExpired => FetchError::SyncTokenExpired,
                other => FetchError::Other(other.into()),
            }
        })
    }

    async fn insert_event(&self, calendar_id: &str, draft: &EventDraft) -> Result<CalendarEvent> {
        let access_token = self.credentials.access_token().await?;
        self.api.insert_event(&access_token, calendar_id, draft).await.map_err(Into::into)
    }

    async fn patch_event(
        &self,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<CalendarEvent> {
        let access_token = self.credentials.access_token().await?;
        self.api
            .patch_event(&access_token, calendar_id, event_id, draft)
            .await
            .map_err(Into::into)
    }

    async fn delete_event(&self, calendar_id: &str, event_id: &str) -> Result<()> {
        let access_token = self.credentials.access_token().await?;
        self.api.delete_event(&access_token, calendar_id, event_id).await.map_err(Into::into)
    }
}
