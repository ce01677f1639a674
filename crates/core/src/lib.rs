//! # Homeboard Core
//!
//! Pure business logic layer - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port/adapter interfaces (traits) for storage and the provider API
//! - The sync planner and the reconciler
//! - The immutable local event cache
//!
//! ## Architecture Principles
//! - Only depends on `homeboard-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod calendar;

// Re-export specific items to avoid ambiguity
pub use calendar::cache::EventCache;
pub use calendar::planner::{plan, FullFetchReason, SyncPlan};
pub use calendar::ports::{
    CalendarApi, CredentialStore, EventChange, FetchBatch, FetchError, KeyValueStore,
    SyncCursorStore,
};
pub use calendar::reconciler::{merge_full, merge_incremental, MergeOutcome};
