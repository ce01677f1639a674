//! Calendar sync engine configuration
//!
//! Configuration for the OAuth flows, provider endpoints, and the sync
//! scheduler. Loadable from TOML via serde (see `homeboard-infra::config`).

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_SYNC_CRON, FETCH_PADDING_DAYS, REFRESH_THRESHOLD_SECS};

/// Deployment mode selecting the credential acquisition flow.
///
/// `Local` uses the implicit grant (token straight from the redirect, no
/// backend required). `Production` uses authorization-code + PKCE with the
/// code exchanged through the trusted backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentMode {
    Local,
    Production,
}

/// Configuration for the calendar sync engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalendarSyncConfig {
    /// Deployment mode (selects the OAuth flow).
    pub mode: DeploymentMode,
    /// OAuth client identifier.
    pub client_id: String,
    /// Provider authorization endpoint (redirect target).
    pub authorization_endpoint: String,
    /// Trusted backend endpoint for code exchange and refresh.
    pub token_exchange_endpoint: String,
    /// Base URL of the provider's calendar REST API.
    pub api_base_url: String,
    /// OAuth scopes to request.
    pub scopes: Vec<String>,
    /// Cron expression driving the periodic sync poll.
    #[serde(default = "default_sync_cron")]
    pub sync_cron: String,
    /// Days of padding added around a requested view window on full fetches.
    #[serde(default = "default_padding_days")]
    pub fetch_padding_days: i64,
    /// Seconds before expiry at which silent renewal fires.
    #[serde(default = "default_refresh_threshold")]
    pub refresh_threshold_secs: i64,
}

fn default_sync_cron() -> String {
    DEFAULT_SYNC_CRON.to_string()
}

const fn default_padding_days() -> i64 {
    FETCH_PADDING_DAYS
}

const fn default_refresh_threshold() -> i64 {
    REFRESH_THRESHOLD_SECS
}

impl CalendarSyncConfig {
    /// Create a Google Calendar configuration with sensible defaults.
    #[must_use]
    pub fn google(
        client_id: impl Into<String>,
        token_exchange_endpoint: impl Into<String>,
        mode: DeploymentMode,
    ) -> Self {
        Self {
            mode,
            client_id: client_id.into(),
            authorization_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_exchange_endpoint: token_exchange_endpoint.into(),
            api_base_url: "https://www.googleapis.com/calendar/v3".to_string(),
            scopes: vec!["https://www.googleapis.com/auth/calendar".to_string()],
            sync_cron: default_sync_cron(),
            fetch_padding_days: FETCH_PADDING_DAYS,
            refresh_threshold_secs: REFRESH_THRESHOLD_SECS,
        }
    }
}
