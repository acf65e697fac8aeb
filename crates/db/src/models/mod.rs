//! Row models and DTOs for the reminder scheduling tables.

pub mod lead_reminder;
pub mod reminder_timeline;
