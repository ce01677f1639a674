//! Scheduling infrastructure for automated task execution
//!
//! Cron-based scheduler for the periodic sync poll, with explicit lifecycle
//! management (start/stop), tracked join handles, cancellation token
//! support, and timeout wrapping on all async operations.

pub mod error;
pub mod sync_scheduler;

pub use error::{SchedulerError, SchedulerResult};
pub use sync_scheduler::{SyncScheduler, SyncSchedulerConfig};
