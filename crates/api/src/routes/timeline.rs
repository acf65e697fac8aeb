//! Route definitions for the reminder timeline resource.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::timeline;
use crate::state::AppState;

/// Routes mounted at `/reminders/timeline`.
///
/// ```text
/// GET    /       -> get_timeline
/// PUT    /       -> put_timeline
/// POST   /reset  -> reset_timeline
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(timeline::get_timeline).put(timeline::put_timeline))
        .route("/reset", post(timeline::reset_timeline))
}
