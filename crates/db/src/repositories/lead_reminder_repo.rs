//! Repository for the `lead_reminders` table.

use leadline_core::types::{DbId, Timestamp};
use sqlx::PgPool;

use crate::models::lead_reminder::{LeadReminderRow, SetReminderInput};

/// Column list for `lead_reminders` queries.
const COLUMNS: &str = "id, lead_id, tenant_id, owner_user_id, owner_email, lead_label, \
                       due_at, fired_intervals, status, version, created_at, updated_at";

/// Provides CRUD and scheduler operations for lead reminders.
pub struct LeadReminderRepo;

impl LeadReminderRepo {
    /// Create or reschedule a lead's reminder.
    ///
    /// A changed `due_at` clears the fired set and returns the record to
    /// `pending`; setting the same `due_at` again only refreshes the owner
    /// fields and leaves the fired set intact.
    pub async fn upsert(
        pool: &PgPool,
        tenant_id: DbId,
        lead_id: DbId,
        input: &SetReminderInput,
    ) -> Result<LeadReminderRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO lead_reminders \
                 (lead_id, tenant_id, owner_user_id, owner_email, lead_label, due_at) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (lead_id) DO UPDATE SET \
                 owner_user_id = EXCLUDED.owner_user_id, \
                 owner_email = EXCLUDED.owner_email, \
                 lead_label = EXCLUDED.lead_label, \
                 fired_intervals = CASE \
                     WHEN lead_reminders.due_at IS DISTINCT FROM EXCLUDED.due_at \
                     THEN '[]'::jsonb \
                     ELSE lead_reminders.fired_intervals \
                 END, \
                 due_at = EXCLUDED.due_at, \
                 status = 'pending', \
                 version = lead_reminders.version + 1, \
                 updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, LeadReminderRow>(&query)
            .bind(lead_id)
            .bind(tenant_id)
            .bind(input.owner_user_id)
            .bind(&input.owner_email)
            .bind(&input.lead_label)
            .bind(input.due_at)
            .fetch_one(pool)
            .await
    }

    /// Fetch a lead's reminder, scoped to the tenant.
    pub async fn get_for_lead(
        pool: &PgPool,
        tenant_id: DbId,
        lead_id: DbId,
    ) -> Result<Option<LeadReminderRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lead_reminders WHERE tenant_id = $1 AND lead_id = $2"
        );
        sqlx::query_as::<_, LeadReminderRow>(&query)
            .bind(tenant_id)
            .bind(lead_id)
            .fetch_optional(pool)
            .await
    }

    /// Cancel a pending reminder.
    ///
    /// Returns `true` if a pending reminder existed and was resolved.
    pub async fn cancel(
        pool: &PgPool,
        tenant_id: DbId,
        lead_id: DbId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE lead_reminders \
             SET status = 'resolved', version = version + 1, updated_at = NOW() \
             WHERE tenant_id = $1 AND lead_id = $2 AND status = 'pending'",
        )
        .bind(tenant_id)
        .bind(lead_id)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Load all pending reminders due before `cutoff`, across tenants,
    /// oldest due time first.
    pub async fn load_due_candidates(
        pool: &PgPool,
        cutoff: Timestamp,
    ) -> Result<Vec<LeadReminderRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM lead_reminders \
             WHERE status = 'pending' AND due_at <= $1 \
             ORDER BY due_at ASC"
        );
        sqlx::query_as::<_, LeadReminderRow>(&query)
            .bind(cutoff)
            .fetch_all(pool)
            .await
    }

    /// Atomically record that one interval fired for the given due time.
    ///
    /// The guard clauses make this a per-record compare-and-swap: the key is
    /// appended only while the reminder is still pending, still has the
    /// same due time, and does not contain the key yet. Returns `false`
    /// when any guard fails -- another pass already marked it, or the
    /// reminder was rescheduled/cancelled since it was loaded.
    pub async fn commit_fired_interval(
        pool: &PgPool,
        lead_id: DbId,
        due_at: Timestamp,
        interval_key: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE lead_reminders \
             SET fired_intervals = fired_intervals || to_jsonb($3::text), \
                 version = version + 1, \
                 updated_at = NOW() \
             WHERE lead_id = $1 AND due_at = $2 AND status = 'pending' \
               AND NOT (fired_intervals ? $3)",
        )
        .bind(lead_id)
        .bind(due_at)
        .bind(interval_key)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Transition a pending reminder to `resolved`, guarded by the due time
    /// it was loaded with. Returns `false` when the record was rescheduled
    /// or already resolved in the meantime.
    pub async fn mark_resolved(
        pool: &PgPool,
        lead_id: DbId,
        due_at: Timestamp,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE lead_reminders \
             SET status = 'resolved', version = version + 1, updated_at = NOW() \
             WHERE lead_id = $1 AND due_at = $2 AND status = 'pending'",
        )
        .bind(lead_id)
        .bind(due_at)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
