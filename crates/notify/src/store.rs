//! Persistence contracts the scheduler consumes, and their Postgres
//! implementations.
//!
//! The traits exist so the scheduler's firing logic can be exercised with
//! in-memory doubles; production wires the `Pg*` adapters, which delegate
//! to the `leadline-db` repositories.

use async_trait::async_trait;
use leadline_core::reminder::LeadReminder;
use leadline_core::timeline::ReminderTimeline;
use leadline_core::types::{DbId, Timestamp};
use leadline_db::repositories::{LeadReminderRepo, ReminderTimelineRepo};
use leadline_db::DbPool;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for store operations, opaque to the scheduler.
///
/// The scheduler only ever logs these and moves on; carrying the message is
/// enough, and it lets test doubles fabricate failures without a database.
#[derive(Debug, thiserror::Error)]
#[error("Store error: {0}")]
pub struct StoreError(pub String);

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError(err.to_string())
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Reminder persistence as the scheduler sees it.
#[async_trait]
pub trait ReminderStore: Send + Sync {
    /// All pending reminders with `due_at <= cutoff`, oldest first.
    async fn load_due_candidates(&self, cutoff: Timestamp)
        -> Result<Vec<LeadReminder>, StoreError>;

    /// Atomically record one fired interval for the given due time.
    ///
    /// Must be a per-record compare-and-swap: `Ok(false)` when the key was
    /// already present, the reminder was rescheduled to a different due
    /// time, or it is no longer pending. Only an `Ok(true)` licenses a
    /// delivery attempt.
    async fn commit_fired_interval(
        &self,
        lead_id: DbId,
        due_at: Timestamp,
        interval_key: &str,
    ) -> Result<bool, StoreError>;

    /// Transition a pending reminder to resolved, guarded by its due time.
    async fn mark_resolved(&self, lead_id: DbId, due_at: Timestamp) -> Result<bool, StoreError>;
}

/// Timeline configuration as the scheduler sees it.
#[async_trait]
pub trait TimelineStore: Send + Sync {
    /// Every persisted tenant timeline. Tenants without a row fall back to
    /// the system default at evaluation time.
    async fn list_all(&self) -> Result<Vec<ReminderTimeline>, StoreError>;
}

// ---------------------------------------------------------------------------
// Postgres implementations
// ---------------------------------------------------------------------------

/// [`ReminderStore`] over the `lead_reminders` table.
pub struct PgReminderStore {
    pool: DbPool,
}

impl PgReminderStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReminderStore for PgReminderStore {
    async fn load_due_candidates(
        &self,
        cutoff: Timestamp,
    ) -> Result<Vec<LeadReminder>, StoreError> {
        let rows = LeadReminderRepo::load_due_candidates(&self.pool, cutoff).await?;
        Ok(rows.into_iter().map(|row| row.into_domain()).collect())
    }

    async fn commit_fired_interval(
        &self,
        lead_id: DbId,
        due_at: Timestamp,
        interval_key: &str,
    ) -> Result<bool, StoreError> {
        Ok(LeadReminderRepo::commit_fired_interval(&self.pool, lead_id, due_at, interval_key)
            .await?)
    }

    async fn mark_resolved(&self, lead_id: DbId, due_at: Timestamp) -> Result<bool, StoreError> {
        Ok(LeadReminderRepo::mark_resolved(&self.pool, lead_id, due_at).await?)
    }
}

/// [`TimelineStore`] over the `reminder_timelines` table.
pub struct PgTimelineStore {
    pool: DbPool,
}

impl PgTimelineStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TimelineStore for PgTimelineStore {
    async fn list_all(&self) -> Result<Vec<ReminderTimeline>, StoreError> {
        let rows = ReminderTimelineRepo::list_all(&self.pool).await?;
        Ok(rows.into_iter().map(|row| row.into_domain()).collect())
    }
}
