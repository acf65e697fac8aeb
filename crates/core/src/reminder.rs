//! Lead reminder domain types and due-interval evaluation.
//!
//! The evaluation functions here are pure: they take an explicit `now` and
//! never touch a clock or a store, so the scheduler's firing decisions can
//! be tested tick by tick without any timing dependence.

use serde::{Deserialize, Serialize};

use crate::timeline::ReminderInterval;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// ReminderStatus
// ---------------------------------------------------------------------------

/// Lifecycle state of a lead reminder.
///
/// `Resolved` is terminal: the due time fully passed with nothing left to
/// fire, or the reminder was cancelled. Resolved records are never loaded
/// by the scheduler again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReminderStatus {
    Pending,
    Resolved,
}

impl ReminderStatus {
    /// The string stored in the `lead_reminders.status` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReminderStatus::Pending => "pending",
            ReminderStatus::Resolved => "resolved",
        }
    }

    /// Parse a stored status string. Unknown values map to `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(ReminderStatus::Pending),
            "resolved" => Some(ReminderStatus::Resolved),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReminderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// LeadReminder
// ---------------------------------------------------------------------------

/// A lead's active reminder as the scheduler sees it.
///
/// `fired_intervals` holds the interval keys already notified for the
/// current `due_at`; it only grows, and rescheduling the due time clears it.
/// The `(lead_id, due_at, interval key)` triple is the idempotency boundary
/// for delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeadReminder {
    pub lead_id: DbId,
    pub tenant_id: DbId,
    /// The agent to notify.
    pub owner_user_id: DbId,
    /// The agent's email, when the CRM has one on file. The timeline's
    /// fallback address is used otherwise.
    pub owner_email: Option<String>,
    /// Short lead summary rendered into the notification ("Acme Corp").
    pub lead_label: String,
    /// The absolute time the reminder is for.
    pub due_at: Timestamp,
    /// Interval keys already notified for this due time.
    pub fired_intervals: Vec<String>,
    pub status: ReminderStatus,
}

impl LeadReminder {
    /// Whether the given interval key has already been notified.
    pub fn has_fired(&self, key: &str) -> bool {
        self.fired_intervals.iter().any(|k| k == key)
    }
}

// ---------------------------------------------------------------------------
// Due-interval evaluation
// ---------------------------------------------------------------------------

/// Select the intervals that are due right now and not yet fired.
///
/// An interval with lead time `h` triggers at `due_at - h`; it is due while
/// `trigger_at <= now < trigger_at + window`. The window bounds how late a
/// missed tick may still fire: ticks slower than the window risk silent
/// misses, an accepted trade-off as long as the tick period stays well
/// below it.
///
/// `intervals` is expected in normalized (descending-hours) order and the
/// result preserves it, so the longest lead time is always attempted first
/// even when several intervals became due during downtime.
pub fn due_intervals<'a>(
    now: Timestamp,
    due_at: Timestamp,
    intervals: &'a [ReminderInterval],
    fired: &[String],
    window: chrono::Duration,
) -> Vec<&'a ReminderInterval> {
    intervals
        .iter()
        .filter(|interval| {
            if fired.iter().any(|k| *k == interval.key()) {
                return false;
            }
            let trigger_at = due_at - interval.lead_time();
            trigger_at <= now && now < trigger_at + window
        })
        .collect()
}

/// Whether nothing can ever fire for this reminder any more.
///
/// True once the due time has passed and every interval is either already
/// fired or has a closed firing window. This is the predicate for the
/// pending -> resolved transition.
pub fn is_exhausted(
    now: Timestamp,
    due_at: Timestamp,
    intervals: &[ReminderInterval],
    fired: &[String],
    window: chrono::Duration,
) -> bool {
    if now <= due_at {
        return false;
    }
    intervals.iter().all(|interval| {
        if fired.iter().any(|k| *k == interval.key()) {
            return true;
        }
        let trigger_at = due_at - interval.lead_time();
        now >= trigger_at + window
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
