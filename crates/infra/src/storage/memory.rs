//! In-memory key-value store
//!
//! Non-durable implementation for tests and local development.

use std::collections::HashMap;

use async_trait::async_trait;
use homeboard_core::KeyValueStore;
use homeboard_domain::Result;
use tokio::sync::RwLock;

/// In-memory `KeyValueStore`. Contents are lost on drop.
#[derive(Default)]
pub struct MemoryKvStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.write().await.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for storage::memory.
    use super::*;

    #[tokio::test]
    async fn behaves_like_a_map() {
        let store = MemoryKvStore::new();

        assert_eq!(store.get("a").await.expect("get succeeds"), None);
        store.set("a", "1").await.expect("set succeeds");
        assert_eq!(store.get("a").await.expect("get succeeds").as_deref(), Some("1"));
        store.remove("a").await.expect("remove succeeds");
        assert_eq!(store.get("a").await.expect("get succeeds"), None);
    }
}
