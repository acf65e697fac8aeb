//! Per-tenant reminder timeline configuration and validation.
//!
//! A timeline is the ordered list of lead-time intervals at which a lead's
//! reminder should fire before its due time. Tenants edit the list freely in
//! the UI; this module is the single normalization point that turns the
//! submitted list into something the scheduler can trust: bounded, unique
//! after rounding, and sorted longest-lead-time-first.

use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::CoreError;
use crate::types::DbId;

// ---------------------------------------------------------------------------
// Interval bounds
// ---------------------------------------------------------------------------

/// Smallest accepted lead time, in hours (exclusive). Anything at or below
/// this is indistinguishable from "fire at the due time" given the tick
/// cadence.
pub const MIN_INTERVAL_HOURS: f64 = 0.1;

/// Largest accepted lead time, in hours (one week, inclusive).
pub const MAX_INTERVAL_HOURS: f64 = 168.0;

/// Maximum number of intervals in one timeline.
pub const MAX_INTERVALS: usize = 10;

/// Intervals are compared after rounding to this many decimal places.
const ROUND_DECIMALS: f64 = 100.0;

// ---------------------------------------------------------------------------
// ReminderInterval
// ---------------------------------------------------------------------------

/// A single lead-time entry: fire `hours` before the reminder's due time.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReminderInterval {
    /// Lead time before the due time, in hours. Fractional values are
    /// allowed (0.5 = 30 minutes).
    pub hours: f64,
    /// Display label shown in the notification ("1 day before", ...).
    pub label: String,
}

impl ReminderInterval {
    pub fn new(hours: f64, label: impl Into<String>) -> Self {
        Self {
            hours,
            label: label.into(),
        }
    }

    /// Hours rounded to two decimal places; the identity used for
    /// uniqueness and for the fired-interval key.
    pub fn rounded_hours(&self) -> f64 {
        (self.hours * ROUND_DECIMALS).round() / ROUND_DECIMALS
    }

    /// Canonical key recorded in a reminder's fired set, e.g. `"24h"`,
    /// `"0.5h"`, `"1.25h"`. Stable across label edits.
    pub fn key(&self) -> String {
        let formatted = format!("{:.2}", self.rounded_hours());
        let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
        format!("{trimmed}h")
    }

    /// The lead time as a duration, from the rounded hours.
    pub fn lead_time(&self) -> chrono::Duration {
        chrono::Duration::milliseconds((self.rounded_hours() * 3_600_000.0).round() as i64)
    }
}

// ---------------------------------------------------------------------------
// ReminderTimeline
// ---------------------------------------------------------------------------

/// A tenant's reminder configuration, replaced wholesale on update.
///
/// When `enabled` is false the scheduler treats the tenant as having zero
/// intervals; reminder due times keep being tracked so nothing is lost when
/// the tenant re-enables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReminderTimeline {
    pub tenant_id: DbId,
    pub enabled: bool,
    /// Normalized: unique after rounding, sorted descending by hours.
    pub intervals: Vec<ReminderInterval>,
    /// Fallback recipient when the reminder's owner has no email on file.
    pub notification_email: Option<String>,
}

impl ReminderTimeline {
    /// The fixed system baseline every tenant starts from: one day, two
    /// hours, one hour, and thirty minutes before the due time.
    pub fn default_for(tenant_id: DbId) -> Self {
        Self {
            tenant_id,
            enabled: true,
            intervals: vec![
                ReminderInterval::new(24.0, "1 day before"),
                ReminderInterval::new(2.0, "2 hours before"),
                ReminderInterval::new(1.0, "1 hour before"),
                ReminderInterval::new(0.5, "30 minutes before"),
            ],
            notification_email: None,
        }
    }

    /// Longest configured lead time in hours; `None` when the timeline is
    /// disabled or has no intervals. Drives the scheduler's load horizon.
    pub fn max_hours(&self) -> Option<f64> {
        if !self.enabled {
            return None;
        }
        self.intervals
            .iter()
            .map(ReminderInterval::rounded_hours)
            .fold(None, |acc, h| Some(acc.map_or(h, |a: f64| a.max(h))))
    }

    /// Validate and normalize the whole timeline, consuming it.
    ///
    /// Interval rules are in [`validate_intervals`]; additionally the
    /// fallback email, when present, must be a syntactically valid address.
    pub fn normalized(mut self) -> Result<Self, CoreError> {
        if let Some(email) = &self.notification_email {
            if !email.validate_email() {
                return Err(CoreError::Validation(format!(
                    "notification_email is not a valid address: {email}"
                )));
            }
        }
        self.intervals = validate_intervals(self.intervals, self.enabled)?;
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Interval validation
// ---------------------------------------------------------------------------

/// Validate and normalize a submitted interval list.
///
/// Rules:
/// - every `hours` must be finite, above [`MIN_INTERVAL_HOURS`] and at most
///   [`MAX_INTERVAL_HOURS`];
/// - at most [`MAX_INTERVALS`] entries (counted on the input);
/// - when `enabled`, the list must not be empty;
/// - entries that collide after rounding to two decimals are dropped,
///   keeping the earlier one in input order. Dropping is silent: the list
///   is advisory UI state, not a hard contract.
///
/// On success the surviving entries are returned sorted descending by
/// rounded hours, which is the order the scheduler evaluates them in.
pub fn validate_intervals(
    intervals: Vec<ReminderInterval>,
    enabled: bool,
) -> Result<Vec<ReminderInterval>, CoreError> {
    if intervals.len() > MAX_INTERVALS {
        return Err(CoreError::Validation(format!(
            "At most {MAX_INTERVALS} reminder intervals are allowed, got {}",
            intervals.len()
        )));
    }

    if intervals.is_empty() && enabled {
        return Err(CoreError::Validation(
            "An enabled timeline needs at least one interval".into(),
        ));
    }

    let mut seen_keys = std::collections::HashSet::new();
    let mut normalized = Vec::with_capacity(intervals.len());

    for interval in intervals {
        if !interval.hours.is_finite()
            || interval.hours <= MIN_INTERVAL_HOURS
            || interval.hours > MAX_INTERVAL_HOURS
        {
            return Err(CoreError::Validation(format!(
                "Interval hours must be greater than {MIN_INTERVAL_HOURS} and at most \
                 {MAX_INTERVAL_HOURS}, got {}",
                interval.hours
            )));
        }

        // Later duplicates (after rounding) are dropped, earlier ones win.
        if seen_keys.insert(interval.key()) {
            normalized.push(interval);
        }
    }

    normalized.sort_by(|a, b| {
        b.rounded_hours()
            .partial_cmp(&a.rounded_hours())
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(normalized)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
