//! Live presence tracking for agents on the reminders screen.
//!
//! [`PresenceRegistry`] answers one question for the reminder scheduler: is
//! this agent currently looking at the screen that would surface the
//! reminder anyway? Records are written by the WebSocket connection
//! handlers (page enter/leave, heartbeats, disconnects) and read by the
//! scheduler when it picks a delivery channel. Neither side ever blocks the
//! other for longer than a single record's read or write under the interior
//! `RwLock`.
//!
//! Every operation is a total function over the in-memory map: there is no
//! error case, only "not found", which is treated as offline.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Presence constants
// ---------------------------------------------------------------------------

/// Presence records older than this many seconds are considered stale and
/// treated as offline, even before the sweep removes them.
pub const PRESENCE_STALE_SECS: u64 = 3600;

/// How often the background sweep task runs (in seconds).
pub const PRESENCE_SWEEP_INTERVAL_SECS: u64 = 600;

// ---------------------------------------------------------------------------
// Presence WebSocket message protocol
// ---------------------------------------------------------------------------

/// Messages a client sends over WebSocket to report presence changes.
///
/// Serialized as JSON with an internally-tagged `"type"` discriminator so
/// the frontend can build them as plain objects.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum PresenceMessage {
    /// Client sends: the reminders screen is now active.
    #[serde(rename = "page.enter")]
    PageEnter,

    /// Client sends: the reminders screen is no longer active.
    #[serde(rename = "page.leave")]
    PageLeave,

    /// Client sends: still alive, refresh the last-seen timestamp.
    #[serde(rename = "heartbeat")]
    Heartbeat,
}

// ---------------------------------------------------------------------------
// PresenceRecord
// ---------------------------------------------------------------------------

/// Presence state for a single agent.
///
/// At most one record exists per agent at any time; a new connection
/// replaces the previous one (last write wins). Absence of a record means
/// "unknown/offline".
#[derive(Debug, Clone)]
pub struct PresenceRecord {
    /// The agent this record belongs to.
    pub user_id: DbId,
    /// Opaque per-connection token (the WebSocket connection id).
    pub connection_id: String,
    /// Last time any event arrived for this agent.
    pub last_seen_at: Timestamp,
    /// Whether the reminders screen is currently active in the client.
    pub on_target_page: bool,
}

// ---------------------------------------------------------------------------
// PresenceRegistry
// ---------------------------------------------------------------------------

/// In-memory registry of agent presence, keyed by user id.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared between the WebSocket layer and the scheduler.
pub struct PresenceRegistry {
    /// Freshness horizon in milliseconds; records seen longer ago than this
    /// answer `is_on_page == false` regardless of their page flag.
    stale_after_ms: i64,
    records: RwLock<HashMap<DbId, PresenceRecord>>,
}

impl PresenceRegistry {
    /// Create a registry with the given staleness threshold.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            stale_after_ms: stale_after.as_millis() as i64,
            records: RwLock::new(HashMap::new()),
        }
    }

    /// Record that an agent's client has the reminders screen active.
    ///
    /// Upserts the record and refreshes `last_seen_at`. Always succeeds; a
    /// record from an earlier connection is overwritten.
    pub async fn mark_on_page(&self, user_id: DbId, connection_id: impl Into<String>) {
        let record = PresenceRecord {
            user_id,
            connection_id: connection_id.into(),
            last_seen_at: Utc::now(),
            on_target_page: true,
        };
        self.records.write().await.insert(user_id, record);
    }

    /// Record that an agent's client left the reminders screen.
    ///
    /// Refreshes `last_seen_at` so the record is not swept while the
    /// connection is still alive. No-op when no record exists.
    pub async fn mark_off_page(&self, user_id: DbId) {
        if let Some(record) = self.records.write().await.get_mut(&user_id) {
            record.on_target_page = false;
            record.last_seen_at = Utc::now();
        }
    }

    /// Refresh an agent's `last_seen_at` on a heartbeat. No-op when no
    /// record exists.
    pub async fn touch(&self, user_id: DbId) {
        if let Some(record) = self.records.write().await.get_mut(&user_id) {
            record.last_seen_at = Utc::now();
        }
    }

    /// Delete an agent's record on disconnect. Idempotent.
    pub async fn remove(&self, user_id: DbId) {
        self.records.write().await.remove(&user_id);
    }

    /// Whether the agent is currently on the reminders screen.
    ///
    /// Returns `false` when no record exists or the record is stale. A
    /// stale record is not removed here; the sweep task owns cleanup.
    pub async fn is_on_page(&self, user_id: DbId) -> bool {
        let records = self.records.read().await;
        match records.get(&user_id) {
            Some(record) => record.on_target_page && !self.is_stale(record),
            None => false,
        }
    }

    /// Return the subset of `user_ids` that are NOT on the reminders
    /// screen, i.e. the agents that need an out-of-band notification.
    ///
    /// Read-only; safe to call concurrently with writers.
    pub async fn filter_not_on_page(&self, user_ids: &[DbId]) -> Vec<DbId> {
        let records = self.records.read().await;
        user_ids
            .iter()
            .copied()
            .filter(|id| match records.get(id) {
                Some(record) => !record.on_target_page || self.is_stale(record),
                None => true,
            })
            .collect()
    }

    /// Remove all records whose `last_seen_at` is older than `stale_after`.
    ///
    /// Returns the number of records removed. Intended to run on its own
    /// timer, independent of the reminder tick.
    pub async fn sweep(&self, stale_after: Duration) -> usize {
        let cutoff_ms = stale_after.as_millis() as i64;
        let now = Utc::now();
        let mut records = self.records.write().await;
        let before = records.len();
        records.retain(|_, record| (now - record.last_seen_at).num_milliseconds() <= cutoff_ms);
        before - records.len()
    }

    /// Current number of presence records (monitoring aid).
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the registry holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn is_stale(&self, record: &PresenceRecord) -> bool {
        (Utc::now() - record.last_seen_at).num_milliseconds() > self.stale_after_ms
    }
}

impl Default for PresenceRegistry {
    fn default() -> Self {
        Self::new(Duration::from_secs(PRESENCE_STALE_SECS))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Message protocol serialization
    // -----------------------------------------------------------------------

    #[test]
    fn page_enter_serialization() {
        let json = serde_json::to_string(&PresenceMessage::PageEnter).unwrap();
        assert_eq!(json, r#"{"type":"page.enter"}"#);

        let parsed: PresenceMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, PresenceMessage::PageEnter);
    }

    #[test]
    fn page_leave_serialization() {
        let json = serde_json::to_string(&PresenceMessage::PageLeave).unwrap();
        assert_eq!(json, r#"{"type":"page.leave"}"#);
    }

    #[test]
    fn heartbeat_serialization() {
        let parsed: PresenceMessage = serde_json::from_str(r#"{"type":"heartbeat"}"#).unwrap();
        assert_eq!(parsed, PresenceMessage::Heartbeat);
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let result: Result<PresenceMessage, _> = serde_json::from_str(r#"{"type":"nonsense"}"#);
        assert!(result.is_err());
    }

    // -----------------------------------------------------------------------
    // Constants sanity checks
    // -----------------------------------------------------------------------

    #[test]
    fn stale_threshold_is_positive() {
        assert!(PRESENCE_STALE_SECS > 0);
    }

    #[test]
    fn sweep_runs_more_often_than_staleness() {
        assert!(PRESENCE_SWEEP_INTERVAL_SECS < PRESENCE_STALE_SECS);
    }
}
