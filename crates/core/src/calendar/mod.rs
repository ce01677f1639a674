//! Calendar synchronization business logic
//!
//! Pure planning and merge rules for keeping the local event cache
//! consistent with a remote calendar provider, plus the port interfaces the
//! infrastructure layer implements.

pub mod cache;
pub mod planner;
pub mod ports;
pub mod reconciler;
