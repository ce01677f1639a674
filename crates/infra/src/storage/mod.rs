//! Durable key-value storage
//!
//! The engine persists exactly two logical records: the current credential
//! and the per-calendar cursor map. Both go through the opaque
//! `KeyValueStore` port; this module provides a SQLite-backed implementation
//! and an in-memory one, plus the typed credential/cursor stores layered on
//! top of any `KeyValueStore`.

pub mod memory;
pub mod sqlite;
pub mod stores;

pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;
pub use stores::{KvCredentialStore, KvSyncCursorStore};
