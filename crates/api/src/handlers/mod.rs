//! HTTP handlers, grouped by resource.

pub mod notifications;
pub mod presence;
pub mod reminders;
pub mod timeline;
