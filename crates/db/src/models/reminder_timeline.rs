//! Reminder timeline entity model.

use leadline_core::timeline::{ReminderInterval, ReminderTimeline};
use leadline_core::types::{DbId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `reminder_timelines` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ReminderTimelineRow {
    pub tenant_id: DbId,
    pub enabled: bool,
    pub intervals: serde_json::Value,
    pub notification_email: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl ReminderTimelineRow {
    /// Convert the row into the domain value object.
    ///
    /// Rows are only ever written through [`ReminderTimeline::normalized`],
    /// so the stored interval array is already validated; a malformed value
    /// degrades to an empty list rather than poisoning the scheduler.
    pub fn into_domain(self) -> ReminderTimeline {
        let intervals: Vec<ReminderInterval> =
            serde_json::from_value(self.intervals).unwrap_or_default();
        ReminderTimeline {
            tenant_id: self.tenant_id,
            enabled: self.enabled,
            intervals,
            notification_email: self.notification_email,
        }
    }
}
