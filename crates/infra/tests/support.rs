//! Shared helpers for infra integration tests
//!
//! Builds a sync engine wired to a WireMock provider with in-memory
//! storage and a pre-authenticated credential.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use homeboard_core::{CalendarApi, CredentialStore, SyncCursorStore};
use homeboard_domain::constants::FETCH_PADDING_DAYS;
use homeboard_domain::{
    CalendarSyncConfig, Credential, DeploymentMode, TimeRange,
};
use homeboard_infra::integrations::calendar::{
    CalendarClient, CredentialManager, MutationGateway, SyncEngine,
};
use homeboard_infra::storage::{KvCredentialStore, KvSyncCursorStore, MemoryKvStore};
use serde_json::{json, Value};
use wiremock::MockServer;

/// Everything a provider-facing integration test needs.
pub struct TestHarness {
    pub server: MockServer,
    pub manager: Arc<CredentialManager>,
    pub credentials: Arc<dyn CredentialStore>,
    pub cursors: Arc<dyn SyncCursorStore>,
    pub engine: Arc<SyncEngine>,
    pub gateway: MutationGateway,
}

/// Install a test subscriber once so failures come with engine logs.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_test_writer()
        .try_init();
}

/// Build a harness whose provider API and token endpoint both point at a
/// fresh WireMock server, pre-authenticated with a long-lived credential.
pub async fn harness() -> TestHarness {
    harness_with_credential(Credential::new("test-access-token".to_string(), None, 3600)).await
}

/// Same as `harness` but with a caller-supplied credential.
pub async fn harness_with_credential(credential: Credential) -> TestHarness {
    init_tracing();
    let server = MockServer::start().await;

    let store: Arc<MemoryKvStore> = Arc::new(MemoryKvStore::new());
    let credentials: Arc<dyn CredentialStore> =
        Arc::new(KvCredentialStore::new(store.clone()));
    let cursors: Arc<dyn SyncCursorStore> = Arc::new(KvSyncCursorStore::new(store));

    credentials.save(&credential).await.expect("credential seeds");

    let manager = CredentialManager::new(
        test_config(&server.uri()),
        Arc::clone(&credentials),
        Arc::clone(&cursors),
    );
    manager.initialize().await.expect("manager initializes");

    let api: Arc<dyn CalendarApi> =
        Arc::new(CalendarClient::new(Arc::clone(&manager), server.uri()));
    let engine = Arc::new(SyncEngine::new(
        Arc::clone(&api),
        Arc::clone(&cursors),
        FETCH_PADDING_DAYS,
    ));
    let gateway = MutationGateway::new(api, Arc::clone(&cursors));

    TestHarness { server, manager, credentials, cursors, engine, gateway }
}

/// Production-mode config pointing both endpoints at `base`.
pub fn test_config(base: &str) -> CalendarSyncConfig {
    let mut config = CalendarSyncConfig::google(
        "test-client",
        format!("{base}/oauth/token"),
        DeploymentMode::Production,
    );
    config.api_base_url = base.to_string();
    config
}

/// Fixed view window used across the tests: June 2 - June 30, 2025.
pub fn view_window() -> TimeRange {
    TimeRange::new(utc(2025, 6, 2), utc(2025, 6, 30))
}

pub fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).single().expect("valid timestamp")
}

/// Calendar list body with the given `(id, hidden)` calendars.
pub fn calendar_list_body(calendars: &[(&str, bool)]) -> Value {
    let items: Vec<Value> = calendars
        .iter()
        .map(|(id, hidden)| {
            json!({
                "id": id,
                "summary": format!("{id} calendar"),
                "backgroundColor": "#4285f4",
                "accessRole": "owner",
                "hidden": hidden,
            })
        })
        .collect();
    json!({ "items": items })
}

/// A confirmed timed event body.
pub fn event_body(id: &str, start: &str, end: &str) -> Value {
    json!({
        "id": id,
        "status": "confirmed",
        "summary": format!("event {id}"),
        "start": { "dateTime": start },
        "end": { "dateTime": end },
    })
}

/// A cancelled event body (as returned by incremental fetches).
pub fn cancelled_body(id: &str) -> Value {
    json!({ "id": id, "status": "cancelled" })
}
