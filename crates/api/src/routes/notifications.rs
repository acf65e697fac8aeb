//! Route definitions for notification utilities.

use axum::routing::post;
use axum::Router;

use crate::handlers::notifications;
use crate::state::AppState;

/// Routes mounted at `/notifications`.
///
/// ```text
/// POST   /test -> test_notification
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route("/test", post(notifications::test_notification))
}
