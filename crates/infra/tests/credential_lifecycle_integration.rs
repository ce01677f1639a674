//! Integration tests for credential renewal and session termination
//!
//! **Coverage:**
//! - Silent refresh through the trusted backend rotates the access token
//!   and preserves the refresh token when the backend omits it
//! - A failed refresh terminates the session: credential AND cursors are
//!   cleared, with no retry
//! - Sign-out destroys both stores

#[path = "support.rs"]
mod support;

use homeboard_domain::{Credential, HomeboardError, SyncCursor};
use serde_json::json;
use support::{harness_with_credential, harness};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn refresh_rotates_access_token_and_keeps_refresh_token() {
    // Expires in 2 minutes: inside the 5 minute threshold, so the next
    // token request refreshes first instead of waiting for a timer.
    let h = harness_with_credential(Credential::new(
        "old-access".to_string(),
        Some("refresh-1".to_string()),
        120,
    ))
    .await;

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=refresh-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "expires_in": 3600,
        })))
        .mount(&h.server)
        .await;

    let token = h.manager.access_token().await.expect("token refreshes");
    assert_eq!(token, "new-access");

    // The backend omitted the refresh token; the old one is preserved.
    let persisted = h
        .credentials
        .load()
        .await
        .expect("store readable")
        .expect("credential persisted");
    assert_eq!(persisted.access_token, "new-access");
    assert_eq!(persisted.refresh_token.as_deref(), Some("refresh-1"));
}

#[tokio::test]
async fn failed_refresh_terminates_the_session() {
    let h = harness_with_credential(Credential::new(
        "old-access".to_string(),
        Some("revoked-refresh".to_string()),
        120,
    ))
    .await;

    // Seed a cursor so termination observably clears it.
    let cursor = SyncCursor { token: Some("tok1".to_string()), fetched_range: None };
    h.cursors.save("work", &cursor).await.expect("cursor seeds");

    Mock::given(method("POST"))
        .and(path("/oauth/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "invalid_grant" })),
        )
        .mount(&h.server)
        .await;

    let err = h.manager.access_token().await.expect_err("refresh fails");
    assert!(matches!(err, HomeboardError::Auth(_)));

    // A failed refresh means the grant was revoked: back to signed-out,
    // credential and cursors both gone.
    assert!(h.manager.current().await.is_none());
    assert!(h.credentials.load().await.expect("store readable").is_none());
    assert!(h.cursors.load("work").await.expect("store readable").is_empty());
}

#[tokio::test]
async fn sign_out_destroys_credential_and_cursors() {
    let h = harness().await;

    let cursor = SyncCursor { token: Some("tok1".to_string()), fetched_range: None };
    h.cursors.save("work", &cursor).await.expect("cursor seeds");

    assert!(h.manager.current().await.is_some());

    h.manager.sign_out().await.expect("sign out succeeds");

    assert!(h.manager.current().await.is_none());
    assert!(h.credentials.load().await.expect("store readable").is_none());
    assert!(h.cursors.load("work").await.expect("store readable").is_empty());
}

#[tokio::test]
async fn non_renewable_credential_reports_expiry() {
    // An implicit-flow credential that has already expired cannot renew;
    // the caller gets an auth error and must re-authenticate.
    let h = harness_with_credential(Credential::new("stale".to_string(), None, -60)).await;

    let err = h.manager.access_token().await.expect_err("expired without refresh");
    assert!(matches!(err, HomeboardError::Auth(_)));
    assert!(h.manager.current().await.is_none());
}
