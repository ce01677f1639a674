//! Typed credential and cursor stores over the key-value port
//!
//! The credential is one JSON record; the cursors are a single JSON map from
//! calendar id to cursor, matching the two logical records the engine
//! persists. Each store is owned by exactly one manager and mutated only
//! through it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use homeboard_core::{CredentialStore, KeyValueStore, SyncCursorStore};
use homeboard_domain::constants::{CREDENTIAL_STORE_KEY, CURSOR_STORE_KEY};
use homeboard_domain::{Credential, HomeboardError, Result, SyncCursor};

/// Credential persistence over any `KeyValueStore`.
pub struct KvCredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl KvCredentialStore {
    /// Create a credential store over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl CredentialStore for KvCredentialStore {
    async fn load(&self) -> Result<Option<Credential>> {
        match self.store.get(CREDENTIAL_STORE_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map(Some)
                .map_err(|e| HomeboardError::Storage(format!("corrupt credential record: {e}"))),
            None => Ok(None),
        }
    }

    async fn save(&self, credential: &Credential) -> Result<()> {
        let raw = serde_json::to_string(credential)
            .map_err(|e| HomeboardError::Internal(format!("credential serialization: {e}")))?;
        self.store.set(CREDENTIAL_STORE_KEY, &raw).await
    }

    async fn clear(&self) -> Result<()> {
        self.store.remove(CREDENTIAL_STORE_KEY).await
    }
}

/// Per-calendar sync cursor persistence over any `KeyValueStore`.
pub struct KvSyncCursorStore {
    store: Arc<dyn KeyValueStore>,
}

impl KvSyncCursorStore {
    /// Create a cursor store over `store`.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    async fn load_map(&self) -> Result<BTreeMap<String, SyncCursor>> {
        match self.store.get(CURSOR_STORE_KEY).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| HomeboardError::Storage(format!("corrupt cursor record: {e}"))),
            None => Ok(BTreeMap::new()),
        }
    }

    async fn save_map(&self, map: &BTreeMap<String, SyncCursor>) -> Result<()> {
        let raw = serde_json::to_string(map)
            .map_err(|e| HomeboardError::Internal(format!("cursor serialization: {e}")))?;
        self.store.set(CURSOR_STORE_KEY, &raw).await
    }
}

#[async_trait]
impl SyncCursorStore for KvSyncCursorStore {
    async fn load(&self, calendar_id: &str) -> Result<SyncCursor> {
        Ok(self.load_map().await?.remove(calendar_id).unwrap_or_default())
    }

    async fn save(&self, calendar_id: &str, cursor: &SyncCursor) -> Result<()> {
        let mut map = self.load_map().await?;
        map.insert(calendar_id.to_string(), cursor.clone());
        self.save_map(&map).await
    }

    async fn clear(&self, calendar_id: &str) -> Result<()> {
        let mut map = self.load_map().await?;
        if map.remove(calendar_id).is_some() {
            self.save_map(&map).await?;
        }
        Ok(())
    }

    async fn clear_all(&self) -> Result<()> {
        self.store.remove(CURSOR_STORE_KEY).await
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::stores.
    use chrono::{Duration, TimeZone, Utc};
    use homeboard_domain::TimeRange;

    use super::*;
    use crate::storage::MemoryKvStore;

    fn cursor_store() -> KvSyncCursorStore {
        KvSyncCursorStore::new(Arc::new(MemoryKvStore::new()))
    }

    #[tokio::test]
    async fn absent_cursor_loads_as_empty() {
        let store = cursor_store();
        let cursor = store.load("work").await.expect("load succeeds");
        assert!(cursor.is_empty());
    }

    #[tokio::test]
    async fn cursors_are_independent_per_calendar() {
        let store = cursor_store();
        let min = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).single().expect("valid");
        let cursor = SyncCursor {
            token: Some("tok1".to_string()),
            fetched_range: Some(TimeRange::new(min, min + Duration::days(31))),
        };

        store.save("work", &cursor).await.expect("save succeeds");

        assert_eq!(store.load("work").await.expect("load succeeds"), cursor);
        assert!(store.load("home").await.expect("load succeeds").is_empty());

        store.clear("work").await.expect("clear succeeds");
        assert!(store.load("work").await.expect("load succeeds").is_empty());
    }

    #[tokio::test]
    async fn clear_all_wipes_every_calendar() {
        let store = cursor_store();
        let cursor = SyncCursor { token: Some("tok".to_string()), fetched_range: None };

        store.save("work", &cursor).await.expect("save succeeds");
        store.save("home", &cursor).await.expect("save succeeds");
        store.clear_all().await.expect("clear_all succeeds");

        assert!(store.load("work").await.expect("load succeeds").is_empty());
        assert!(store.load("home").await.expect("load succeeds").is_empty());
    }

    #[tokio::test]
    async fn credential_round_trip() {
        let store = KvCredentialStore::new(Arc::new(MemoryKvStore::new()));
        assert!(store.load().await.expect("load succeeds").is_none());

        let credential =
            Credential::new("access".to_string(), Some("refresh".to_string()), 3600);
        store.save(&credential).await.expect("save succeeds");

        let loaded = store.load().await.expect("load succeeds").expect("credential present");
        assert_eq!(loaded, credential);

        store.clear().await.expect("clear succeeds");
        assert!(store.load().await.expect("load succeeds").is_none());
    }
}
