//! # Homeboard Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - Durable key-value storage (SQLite and in-memory)
//! - The provider REST client (reqwest)
//! - OAuth credential acquisition and silent renewal
//! - The sync engine, mutation gateway, and cron scheduler
//!
//! ## Architecture
//! - Implements traits defined in `homeboard-core`
//! - Depends on `homeboard-domain` and `homeboard-core`
//! - Contains all "impure" code (I/O, HTTP, timers)

pub mod auth;
pub mod config;
pub mod integrations;
pub mod scheduling;
pub mod storage;

// Re-export commonly used items
pub use integrations::calendar::{
    CalendarClient, CredentialManager, LoginSession, MutationGateway, RecurringScope, SyncEngine,
};
pub use storage::{KvCredentialStore, KvSyncCursorStore, MemoryKvStore, SqliteKvStore};
