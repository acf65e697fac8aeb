//! Route definitions for per-lead reminders.

use axum::routing::get;
use axum::Router;

use crate::handlers::reminders;
use crate::state::AppState;

/// Routes mounted at `/leads`.
///
/// ```text
/// GET    /{lead_id}/reminder -> get_reminder
/// PUT    /{lead_id}/reminder -> set_reminder
/// DELETE /{lead_id}/reminder -> cancel_reminder
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/{lead_id}/reminder",
        get(reminders::get_reminder)
            .put(reminders::set_reminder)
            .delete(reminders::cancel_reminder),
    )
}
