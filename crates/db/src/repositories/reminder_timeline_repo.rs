//! Repository for the `reminder_timelines` table.

use leadline_core::timeline::ReminderTimeline;
use leadline_core::types::DbId;
use sqlx::PgPool;

use crate::models::reminder_timeline::ReminderTimelineRow;

/// Column list for `reminder_timelines` queries.
const COLUMNS: &str =
    "tenant_id, enabled, intervals, notification_email, created_at, updated_at";

/// Provides CRUD operations for per-tenant reminder timelines.
pub struct ReminderTimelineRepo;

impl ReminderTimelineRepo {
    /// Fetch a tenant's timeline, if one has been persisted.
    pub async fn get(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> Result<Option<ReminderTimelineRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM reminder_timelines WHERE tenant_id = $1");
        sqlx::query_as::<_, ReminderTimelineRow>(&query)
            .bind(tenant_id)
            .fetch_optional(pool)
            .await
    }

    /// List every tenant's timeline. Used by the scheduler once per tick.
    pub async fn list_all(pool: &PgPool) -> Result<Vec<ReminderTimelineRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM reminder_timelines ORDER BY tenant_id");
        sqlx::query_as::<_, ReminderTimelineRow>(&query)
            .fetch_all(pool)
            .await
    }

    /// Persist a timeline wholesale (insert or replace).
    ///
    /// Callers are expected to pass a normalized timeline; this layer does
    /// not re-validate.
    pub async fn put(
        pool: &PgPool,
        timeline: &ReminderTimeline,
    ) -> Result<ReminderTimelineRow, sqlx::Error> {
        let intervals = serde_json::to_value(&timeline.intervals)
            .unwrap_or_else(|_| serde_json::Value::Array(vec![]));
        let query = format!(
            "INSERT INTO reminder_timelines (tenant_id, enabled, intervals, notification_email) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (tenant_id) DO UPDATE SET \
                 enabled = EXCLUDED.enabled, \
                 intervals = EXCLUDED.intervals, \
                 notification_email = EXCLUDED.notification_email, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, ReminderTimelineRow>(&query)
            .bind(timeline.tenant_id)
            .bind(timeline.enabled)
            .bind(intervals)
            .bind(&timeline.notification_email)
            .fetch_one(pool)
            .await
    }

    /// Replace a tenant's timeline with the system default, discarding any
    /// custom configuration.
    pub async fn reset_to_default(
        pool: &PgPool,
        tenant_id: DbId,
    ) -> Result<ReminderTimelineRow, sqlx::Error> {
        Self::put(pool, &ReminderTimeline::default_for(tenant_id)).await
    }
}
