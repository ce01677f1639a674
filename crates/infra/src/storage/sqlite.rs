//! SQLite-backed key-value store

use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use homeboard_core::KeyValueStore;
use homeboard_domain::{HomeboardError, Result};
use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

/// Durable key-value store backed by a single SQLite table.
pub struct SqliteKvStore {
    conn: Mutex<Connection>,
}

impl SqliteKvStore {
    /// Open (or create) the store at `path`.
    ///
    /// # Errors
    /// Returns `HomeboardError::Storage` if the database cannot be opened or
    /// the schema cannot be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())
            .map_err(|e| HomeboardError::Storage(format!("failed to open database: {e}")))?;
        Self::with_connection(conn)
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    /// Returns `HomeboardError::Storage` if the database cannot be opened.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| HomeboardError::Storage(format!("failed to open database: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| HomeboardError::Storage(format!("failed to create schema: {e}")))?;

        debug!("kv store schema ready");
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| HomeboardError::Storage("kv store lock poisoned".to_string()))
    }
}

#[async_trait]
impl KeyValueStore for SqliteKvStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM kv_store WHERE key = ?1", [key], |row| row.get(0))
            .optional()
            .map_err(|e| HomeboardError::Storage(format!("failed to read '{key}': {e}")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO kv_store (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )
        .map_err(|e| HomeboardError::Storage(format!("failed to write '{key}': {e}")))?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM kv_store WHERE key = ?1", [key])
            .map_err(|e| HomeboardError::Storage(format!("failed to remove '{key}': {e}")))?;
        Ok(())
    }
}
