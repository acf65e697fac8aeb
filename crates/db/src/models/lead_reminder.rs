//! Lead reminder entity model and DTOs.

use leadline_core::reminder::{LeadReminder, ReminderStatus};
use leadline_core::types::{DbId, Timestamp};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A row from the `lead_reminders` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct LeadReminderRow {
    pub id: DbId,
    pub lead_id: DbId,
    pub tenant_id: DbId,
    pub owner_user_id: DbId,
    pub owner_email: Option<String>,
    pub lead_label: String,
    pub due_at: Timestamp,
    pub fired_intervals: serde_json::Value,
    pub status: String,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl LeadReminderRow {
    /// Convert the row into the domain type the scheduler evaluates.
    ///
    /// `fired_intervals` is stored as a JSONB string array; anything else
    /// in the column is treated as empty. The status check constraint
    /// guarantees the status string parses.
    pub fn into_domain(self) -> LeadReminder {
        let fired_intervals: Vec<String> =
            serde_json::from_value(self.fired_intervals).unwrap_or_default();
        let status = ReminderStatus::parse(&self.status).unwrap_or(ReminderStatus::Pending);
        LeadReminder {
            lead_id: self.lead_id,
            tenant_id: self.tenant_id,
            owner_user_id: self.owner_user_id,
            owner_email: self.owner_email,
            lead_label: self.lead_label,
            due_at: self.due_at,
            fired_intervals,
            status,
        }
    }
}

/// DTO for setting or rescheduling a lead's reminder.
#[derive(Debug, Clone, Deserialize)]
pub struct SetReminderInput {
    /// The absolute time the reminder is for.
    pub due_at: Timestamp,
    /// The agent to notify.
    pub owner_user_id: DbId,
    /// The agent's email, when the CRM has one on file.
    pub owner_email: Option<String>,
    /// Short lead summary rendered into notifications.
    pub lead_label: String,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
