//! Calendar integration module
//!
//! OAuth2 credential lifecycle and event synchronization against a remote
//! calendar provider (Google Calendar v3 wire format).

pub mod client;
pub mod mutation;
pub mod oauth;
pub mod providers;
pub mod sync;

pub use client::CalendarClient;
pub use mutation::{MutationGateway, RecurringScope};
pub use oauth::{CallbackServer, CredentialManager, LoginSession};
pub use providers::google::GoogleCalendarApi;
pub use sync::{CalendarSyncOutcome, CalendarSyncResult, SyncEngine, SyncReport};
