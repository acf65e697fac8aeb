//! Gateway-identity extractor for Axum handlers.
//!
//! Authentication itself happens at the fronting gateway, which forwards
//! the verified identity as `X-Tenant-Id` / `X-User-Id` headers. Handlers
//! that need the caller's identity take this extractor as a parameter;
//! requests without both headers are rejected with 401.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use leadline_core::error::CoreError;
use leadline_core::types::DbId;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated agent, as asserted by the fronting gateway.
///
/// Use this as an extractor parameter in any handler that is scoped to a
/// tenant:
///
/// ```ignore
/// async fn my_handler(identity: AgentIdentity) -> AppResult<Json<()>> {
///     tracing::info!(tenant_id = identity.tenant_id, user_id = identity.user_id, "handling");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone)]
pub struct AgentIdentity {
    /// The tenant every query is scoped to.
    pub tenant_id: DbId,
    /// The acting agent's user id.
    pub user_id: DbId,
}

impl FromRequestParts<AppState> for AgentIdentity {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let tenant_id = header_id(parts, "x-tenant-id")?;
        let user_id = header_id(parts, "x-user-id")?;
        Ok(AgentIdentity { tenant_id, user_id })
    }
}

fn header_id(parts: &Parts, name: &'static str) -> Result<DbId, AppError> {
    parts
        .headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<DbId>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| {
            AppError::Core(CoreError::Unauthorized(format!(
                "Missing or invalid {name} header"
            )))
        })
}
