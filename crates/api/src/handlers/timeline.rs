//! Handlers for the reminder timeline configuration resource.
//!
//! A tenant's timeline is replaced wholesale on update and validated at
//! this boundary; the scheduler trusts whatever is stored.

use axum::extract::State;
use axum::Json;
use leadline_core::timeline::{ReminderInterval, ReminderTimeline};
use leadline_db::repositories::ReminderTimelineRepo;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::identity::AgentIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `PUT /reminders/timeline`.
#[derive(Debug, Deserialize)]
pub struct UpdateTimelineRequest {
    pub enabled: bool,
    pub intervals: Vec<ReminderInterval>,
    pub notification_email: Option<String>,
}

/// GET /api/v1/reminders/timeline
///
/// Return the tenant's timeline, or the system default when none has been
/// persisted yet.
pub async fn get_timeline(
    identity: AgentIdentity,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ReminderTimeline>>> {
    let timeline = match ReminderTimelineRepo::get(&state.pool, identity.tenant_id).await? {
        Some(row) => row.into_domain(),
        None => ReminderTimeline::default_for(identity.tenant_id),
    };

    Ok(Json(DataResponse { data: timeline }))
}

/// PUT /api/v1/reminders/timeline
///
/// Validate and persist the tenant's timeline wholesale. Near-duplicate
/// intervals are dropped silently; out-of-range values are rejected with a
/// validation error.
pub async fn put_timeline(
    identity: AgentIdentity,
    State(state): State<AppState>,
    Json(input): Json<UpdateTimelineRequest>,
) -> AppResult<Json<DataResponse<ReminderTimeline>>> {
    let timeline = ReminderTimeline {
        tenant_id: identity.tenant_id,
        enabled: input.enabled,
        intervals: input.intervals,
        notification_email: input.notification_email,
    }
    .normalized()?;

    let row = ReminderTimelineRepo::put(&state.pool, &timeline).await?;

    tracing::info!(
        tenant_id = identity.tenant_id,
        user_id = identity.user_id,
        intervals = timeline.intervals.len(),
        enabled = timeline.enabled,
        "Reminder timeline updated"
    );

    Ok(Json(DataResponse {
        data: row.into_domain(),
    }))
}

/// POST /api/v1/reminders/timeline/reset
///
/// Replace the tenant's timeline with the system default, discarding any
/// custom configuration. Returns the default that was persisted.
pub async fn reset_timeline(
    identity: AgentIdentity,
    State(state): State<AppState>,
) -> AppResult<Json<DataResponse<ReminderTimeline>>> {
    let row = ReminderTimelineRepo::reset_to_default(&state.pool, identity.tenant_id).await?;

    tracing::info!(
        tenant_id = identity.tenant_id,
        user_id = identity.user_id,
        "Reminder timeline reset to default"
    );

    Ok(Json(DataResponse {
        data: row.into_domain(),
    }))
}
