//! Application constants
//!
//! Centralized location for all domain-level constants used by the calendar
//! sync engine.

// Sync planning
pub const FETCH_PADDING_DAYS: i64 = 7;
pub const DEFAULT_MAX_RESULTS: u32 = 250;

// Credential lifecycle
pub const REFRESH_THRESHOLD_SECS: i64 = 300; // renew 5 minutes before expiry

// Scheduling
pub const DEFAULT_SYNC_CRON: &str = "0 */5 * * * *"; // every 5 minutes

// Durable storage keys (two logical records: credential + cursor map)
pub const CREDENTIAL_STORE_KEY: &str = "calendar.credential";
pub const CURSOR_STORE_KEY: &str = "calendar.cursors";
