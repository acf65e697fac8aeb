//! Handlers for per-lead reminders.
//!
//! Setting a reminder is an upsert keyed by lead: rescheduling to a new
//! due time clears the fired set so the full timeline plays out again for
//! the new date; cancelling resolves the record.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use leadline_core::error::CoreError;
use leadline_core::types::DbId;
use leadline_db::models::lead_reminder::{LeadReminderRow, SetReminderInput};
use leadline_db::repositories::LeadReminderRepo;

use crate::error::{AppError, AppResult};
use crate::middleware::identity::AgentIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// PUT /api/v1/leads/{lead_id}/reminder
///
/// Create or reschedule the lead's reminder.
pub async fn set_reminder(
    identity: AgentIdentity,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
    Json(input): Json<SetReminderInput>,
) -> AppResult<Json<DataResponse<LeadReminderRow>>> {
    if input.lead_label.trim().is_empty() {
        return Err(AppError::Core(CoreError::Validation(
            "lead_label must not be empty".into(),
        )));
    }

    let row = LeadReminderRepo::upsert(&state.pool, identity.tenant_id, lead_id, &input).await?;

    tracing::info!(
        tenant_id = identity.tenant_id,
        lead_id,
        due_at = %input.due_at,
        owner_user_id = input.owner_user_id,
        "Lead reminder set"
    );

    Ok(Json(DataResponse { data: row }))
}

/// GET /api/v1/leads/{lead_id}/reminder
///
/// Return the lead's reminder, fired intervals included.
pub async fn get_reminder(
    identity: AgentIdentity,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<Json<DataResponse<LeadReminderRow>>> {
    let row = LeadReminderRepo::get_for_lead(&state.pool, identity.tenant_id, lead_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "LeadReminder",
            id: lead_id,
        }))?;

    Ok(Json(DataResponse { data: row }))
}

/// DELETE /api/v1/leads/{lead_id}/reminder
///
/// Cancel a pending reminder. Returns 204 No Content on success, or 404
/// when the lead has no pending reminder.
pub async fn cancel_reminder(
    identity: AgentIdentity,
    State(state): State<AppState>,
    Path(lead_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let cancelled = LeadReminderRepo::cancel(&state.pool, identity.tenant_id, lead_id).await?;

    if !cancelled {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "LeadReminder",
            id: lead_id,
        }));
    }

    tracing::info!(tenant_id = identity.tenant_id, lead_id, "Lead reminder cancelled");

    Ok(StatusCode::NO_CONTENT)
}
