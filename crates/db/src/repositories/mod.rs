//! Repository layer: one unit struct per table, associated async functions
//! taking the pool explicitly.

pub mod lead_reminder_repo;
pub mod reminder_timeline_repo;

pub use lead_reminder_repo::LeadReminderRepo;
pub use reminder_timeline_repo::ReminderTimelineRepo;
