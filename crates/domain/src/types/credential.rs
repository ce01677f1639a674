//! OAuth credential with expiry metadata
//!
//! The credential owned by the lifecycle manager and persisted through the
//! credential store. `refresh_token` is present only for the
//! authorization-code flow; the implicit flow produces a credential with a
//! fixed, non-renewable lifetime.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// OAuth access credential with optional refresh token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Bearer access token for provider API calls.
    pub access_token: String,

    /// Refresh token for silent renewal.
    /// `None` for the implicit flow, which cannot renew.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiration timestamp (UTC).
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    /// Create a credential expiring `expires_in` seconds from now.
    #[must_use]
    pub fn new(access_token: String, refresh_token: Option<String>, expires_in: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: Utc::now() + chrono::Duration::seconds(expires_in),
        }
    }

    /// Whether the access token is expired or will expire within
    /// `threshold_seconds`.
    #[must_use]
    pub fn is_expired(&self, threshold_seconds: i64) -> bool {
        Utc::now() + chrono::Duration::seconds(threshold_seconds) >= self.expires_at
    }

    /// Seconds until expiry (negative once past).
    #[must_use]
    pub fn seconds_until_expiry(&self) -> i64 {
        (self.expires_at - Utc::now()).num_seconds()
    }

    /// Whether silent renewal is possible for this credential.
    #[must_use]
    pub const fn can_renew(&self) -> bool {
        self.refresh_token.is_some()
    }
}
