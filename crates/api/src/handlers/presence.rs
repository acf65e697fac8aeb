//! Handlers exposing presence lookups to other notification paths.

use axum::extract::State;
use axum::Json;
use leadline_core::types::DbId;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::middleware::identity::AgentIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// Request body for `POST /presence/filter`.
#[derive(Debug, Deserialize)]
pub struct PresenceFilterRequest {
    pub user_ids: Vec<DbId>,
}

/// Response body for `POST /presence/filter`.
#[derive(Debug, Serialize)]
pub struct PresenceFilterResponse {
    /// The subset of the requested agents that need an out-of-band
    /// notification (offline, off-page, or stale).
    pub not_on_page: Vec<DbId>,
}

/// POST /api/v1/presence/filter
///
/// Split a list of agents into those the in-app channel can reach and
/// those it cannot. Read-only over the registry.
pub async fn filter_not_on_page(
    _identity: AgentIdentity,
    State(state): State<AppState>,
    Json(input): Json<PresenceFilterRequest>,
) -> AppResult<Json<DataResponse<PresenceFilterResponse>>> {
    let not_on_page = state.presence.filter_not_on_page(&input.user_ids).await;

    Ok(Json(DataResponse {
        data: PresenceFilterResponse { not_on_page },
    }))
}
