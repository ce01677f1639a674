//! Calendar provider REST clients

pub mod google;

pub use google::{GoogleCalendarApi, ProviderError};
