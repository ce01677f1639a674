//! Domain type definitions

pub mod calendar;
pub mod credential;

pub use calendar::{
    AccessRole, CalendarEvent, CalendarSource, EventDraft, SyncCursor, TimeRange,
};
pub use credential::Credential;
