//! Google Calendar provider implementation
//!
//! Thin REST client over the Calendar v3 wire format. Returns typed errors
//! for the conditions the sync engine acts on - most importantly the
//! `410 Gone` an expired incremental sync token produces.

use chrono::{DateTime, Utc};
use homeboard_core::EventChange;
use homeboard_domain::{
    AccessRole, CalendarEvent, CalendarSource, EventDraft, HomeboardError,
};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Fallback display color when the provider omits one.
const DEFAULT_DISPLAY_COLOR: &str = "#4285f4";

/// Error type for provider API operations.
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The incremental sync token is invalid or expired (`410 Gone`).
    #[error("sync token expired (410 Gone)")]
    SyncTokenExpired,

    /// The provider rejected the request.
    #[error("provider API error ({status}): {body}")]
    Api { status: StatusCode, body: String },

    /// The HTTP request itself failed.
    #[error("provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be parsed.
    #[error("failed to parse provider response: {0}")]
    Parse(String),
}

impl From<ProviderError> for HomeboardError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Api { status, body } if status == StatusCode::UNAUTHORIZED => {
                Self::Auth(format!("provider rejected credentials: {body}"))
            }
            ProviderError::SyncTokenExpired | ProviderError::Api { .. } => {
                Self::Network(err.to_string())
            }
            ProviderError::Http(e) => Self::Network(e.to_string()),
            ProviderError::Parse(msg) => Self::Internal(msg),
        }
    }
}

/// One page of an events listing.
#[derive(Debug, Clone, Default)]
pub struct EventsPage {
    pub changes: Vec<EventChange>,
    pub next_page_token: Option<String>,
    pub next_sync_token: Option<String>,
}

/// Google Calendar REST client.
pub struct GoogleCalendarApi {
    http: Client,
    base_url: String,
}

impl GoogleCalendarApi {
    /// Create a client against `base_url` (the Calendar v3 API root).
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self { http: Client::new(), base_url: base_url.into() }
    }

    /// List the user's calendars.
    ///
    /// # Errors
    /// Returns `ProviderError` when the request fails or the response cannot
    /// be parsed.
    pub async fn list_calendars(
        &self,
        access_token: &str,
    ) -> Result<Vec<CalendarSource>, ProviderError> {
        let url = format!("{}/users/me/calendarList", self.base_url);
        let response = self.http.get(&url).bearer_auth(access_token).send().await?;
        let body: CalendarListResponse = Self::parse_success(response).await?;

        Ok(body
            .items
            .into_iter()
            .filter(|entry| !entry.id.is_empty())
            .map(CalendarListEntry::into_source)
            .collect())
    }

    /// Fetch one page of events for `calendar_id` with the given query
    /// parameters (range or sync-token mode; `pageToken` when paginating).
    ///
    /// # Errors
    /// Returns `ProviderError::SyncTokenExpired` on `410 Gone`, and other
    /// `ProviderError` variants for transport or parse failures.
    pub async fn events_page(
        &self,
        access_token: &str,
        calendar_id: &str,
        query_params: &[(&str, String)],
    ) -> Result<EventsPage, ProviderError> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(query_params)
            .send()
            .await?;

        if response.status() == StatusCode::GONE {
            return Err(ProviderError::SyncTokenExpired);
        }

        let body: EventsListResponse = Self::parse_success(response).await?;

        let mut changes = Vec::with_capacity(body.items.len());
        for item in body.items {
            if let Some(change) = item.into_change(calendar_id) {
                changes.push(change);
            }
        }

        Ok(EventsPage {
            changes,
            next_page_token: body.next_page_token,
            next_sync_token: body.next_sync_token,
        })
    }

    /// Create an event; the provider assigns the id.
    ///
    /// # Errors
    /// Returns `ProviderError` when the request fails.
    pub async fn insert_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        draft: &EventDraft,
    ) -> Result<CalendarEvent, ProviderError> {
        let url = format!("{}/calendars/{}/events", self.base_url, calendar_id);
        let response = self
            .http
            .post(&url)
            .bearer_auth(access_token)
            .json(&GoogleEventWrite::from_draft(draft))
            .send()
            .await?;

        let body: GoogleEvent = Self::parse_success(response).await?;
        body.into_change(calendar_id)
            .and_then(|change| change.event)
            .ok_or_else(|| ProviderError::Parse("created event is unreadable".to_string()))
    }

    /// Update the event identified by `event_id`.
    ///
    /// # Errors
    /// Returns `ProviderError` when the request fails.
    pub async fn patch_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
        draft: &EventDraft,
    ) -> Result<CalendarEvent, ProviderError> {
        let url = format!("{}/calendars/{}/events/{}", self.base_url, calendar_id, event_id);
        let response = self
            .http
            .patch(&url)
            .bearer_auth(access_token)
            .json(&GoogleEventWrite::from_draft(draft))
            .send()
            .await?;

        let body: GoogleEvent = Self::parse_success(response).await?;
        body.into_change(calendar_id)
            .and_then(|change| change.event)
            .ok_or_else(|| ProviderError::Parse("updated event is unreadable".to_string()))
    }

    /// Delete the event identified by `event_id`.
    ///
    /// A `410 Gone` on delete means the event is already gone, which is the
    /// requested outcome.
    ///
    /// # Errors
    /// Returns `ProviderError` when the request fails.
    pub async fn delete_event(
        &self,
        access_token: &str,
        calendar_id: &str,
        event_id: &str,
    ) -> Result<(), ProviderError> {
        let url = format!("{}/calendars/{}/events/{}", self.base_url, calendar_id, event_id);
        let response = self.http.delete(&url).bearer_auth(access_token).send().await?;

        if response.status().is_success() || response.status() == StatusCode::GONE {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
        Err(ProviderError::Api { status, body })
    }

    async fn parse_success<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ProviderError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::Api { status, body });
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ProviderError::Parse(e.to_string()))
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CalendarListResponse {
    #[serde(default)]
    items: Vec<CalendarListEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarListEntry {
    id: String,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    background_color: Option<String>,
    #[serde(default)]
    access_role: Option<String>,
    #[serde(default)]
    hidden: Option<bool>,
}

impl CalendarListEntry {
    fn into_source(self) -> CalendarSource {
        let access_role = match self.access_role.as_deref() {
            Some("owner") => AccessRole::Owner,
            Some("writer") => AccessRole::Writer,
            _ => AccessRole::Reader,
        };

        CalendarSource {
            id: self.id,
            summary: self.summary.unwrap_or_else(|| "(unnamed)".to_string()),
            display_color: self
                .background_color
                .unwrap_or_else(|| DEFAULT_DISPLAY_COLOR.to_string()),
            access_role,
            hidden: self.hidden.unwrap_or(false),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventsListResponse {
    #[serde(default)]
    items: Vec<GoogleEvent>,
    next_page_token: Option<String>,
    next_sync_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEvent {
    id: String,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    summary: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    location: Option<String>,
    #[serde(default)]
    start: Option<GoogleEventTime>,
    #[serde(default)]
    end: Option<GoogleEventTime>,
    #[serde(default)]
    recurring_event_id: Option<String>,
}

impl GoogleEvent {
    /// Convert a wire event into an `EventChange`.
    ///
    /// Cancelled events become removals; malformed events are skipped with a
    /// warning (provider data is canonical, a bad record must not poison the
    /// rest of the page).
    fn into_change(self, calendar_id: &str) -> Option<EventChange> {
        if self.id.is_empty() {
            return None;
        }

        if self.status.as_deref() == Some("cancelled") {
            return Some(EventChange { id: self.id, event: None });
        }

        let (start, is_all_day) = match self.start.as_ref().map(GoogleEventTime::parse) {
            Some(Ok(parsed)) => parsed,
            Some(Err(reason)) => {
                warn!(event_id = %self.id, field = "start", %reason, "skipping malformed event");
                return None;
            }
            None => {
                warn!(event_id = %self.id, field = "start", "skipping event without start");
                return None;
            }
        };

        let (end, _) = match self.end.as_ref().map(GoogleEventTime::parse) {
            Some(Ok(parsed)) => parsed,
            Some(Err(reason)) => {
                warn!(event_id = %self.id, field = "end", %reason, "skipping malformed event");
                return None;
            }
            None => {
                warn!(event_id = %self.id, field = "end", "skipping event without end");
                return None;
            }
        };

        let event = CalendarEvent {
            id: self.id.clone(),
            calendar_id: calendar_id.to_string(),
            title: self
                .summary
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "(no title)".to_string()),
            start,
            end,
            is_all_day,
            location: self.location.filter(|s| !s.is_empty()),
            description: self.description.filter(|s| !s.is_empty()),
            recurring_event_id: self.recurring_event_id.filter(|s| !s.is_empty()),
        };

        Some(EventChange { id: self.id, event: Some(event) })
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventTime {
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_zone: Option<String>,
}

impl GoogleEventTime {
    /// Parse into a UTC instant, returning `(instant, is_all_day)`.
    fn parse(&self) -> Result<(DateTime<Utc>, bool), String> {
        if let Some(date) = &self.date {
            return parse_all_day_timestamp(date).map(|ts| (ts, true));
        }
        if let Some(date_time) = &self.date_time {
            return parse_event_timestamp(date_time).map(|ts| (ts, false));
        }
        Err("neither date nor dateTime present".to_string())
    }

    fn all_day(date: DateTime<Utc>) -> Self {
        Self { date: Some(date.format("%Y-%m-%d").to_string()), date_time: None, time_zone: None }
    }

    fn timed(instant: DateTime<Utc>) -> Self {
        Self {
            date: None,
            date_time: Some(instant.to_rfc3339()),
            time_zone: Some("UTC".to_string()),
        }
    }
}

fn parse_all_day_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let date = chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| format!("invalid all-day date '{value}': {e}"))?;

    let midnight = date
        .and_hms_opt(0, 0, 0)
        .ok_or_else(|| format!("invalid all-day date '{value}': could not derive midnight"))?;

    Ok(midnight.and_utc())
}

fn parse_event_timestamp(value: &str) -> Result<DateTime<Utc>, String> {
    let trimmed = value.trim();
    let has_explicit_timezone = trimmed.ends_with('Z')
        || trimmed
            .rfind('T')
            .is_some_and(|idx| trimmed[idx + 1..].chars().any(|c| matches!(c, '+' | '-')));

    let candidate = if has_explicit_timezone { trimmed.to_string() } else { format!("{trimmed}Z") };

    chrono::DateTime::parse_from_rfc3339(&candidate)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| format!("invalid timestamp '{value}': {e}"))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GoogleEventWrite {
    summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    location: Option<String>,
    start: GoogleEventTime,
    end: GoogleEventTime,
}

impl GoogleEventWrite {
    fn from_draft(draft: &EventDraft) -> Self {
        let (start, end) = if draft.is_all_day {
            (GoogleEventTime::all_day(draft.start), GoogleEventTime::all_day(draft.end))
        } else {
            (GoogleEventTime::timed(draft.start), GoogleEventTime::timed(draft.end))
        };

        Self {
            summary: draft.title.clone(),
            description: draft.description.clone(),
            location: draft.location.clone(),
            start,
            end,
        }
    }
}
