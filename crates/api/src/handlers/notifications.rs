//! Handlers for notification utilities.

use std::time::Duration;

use axum::extract::State;
use axum::Json;
use chrono::Utc;
use leadline_core::error::CoreError;
use leadline_notify::ReminderPayload;
use serde::{Deserialize, Serialize};
use validator::ValidateEmail;

use crate::error::{AppError, AppResult};
use crate::middleware::identity::AgentIdentity;
use crate::response::DataResponse;
use crate::state::AppState;

/// Bound on the synchronous test send.
const TEST_SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Request body for `POST /notifications/test`.
#[derive(Debug, Deserialize)]
pub struct TestNotificationRequest {
    pub recipient: String,
}

/// Response body for `POST /notifications/test`.
#[derive(Debug, Serialize)]
pub struct TestNotificationResponse {
    pub channel: &'static str,
    pub delivered: bool,
    pub error: Option<String>,
}

/// POST /api/v1/notifications/test
///
/// Send a test notification through the configured dispatcher, bypassing
/// the scheduler entirely. Used to verify SMTP / gateway configuration;
/// the delivery outcome is reported instead of being swallowed.
pub async fn test_notification(
    identity: AgentIdentity,
    State(state): State<AppState>,
    Json(input): Json<TestNotificationRequest>,
) -> AppResult<Json<DataResponse<TestNotificationResponse>>> {
    if !input.recipient.validate_email() {
        return Err(AppError::Core(CoreError::Validation(format!(
            "recipient is not a valid address: {}",
            input.recipient
        ))));
    }

    let payload = ReminderPayload {
        tenant_id: identity.tenant_id,
        lead_id: 0,
        lead_label: "Test notification".into(),
        owner_user_id: identity.user_id,
        recipient: input.recipient,
        due_at: Utc::now(),
        interval_label: "configuration check".into(),
        interval_key: "test".into(),
    };

    let result = state.dispatcher.send(&payload, TEST_SEND_TIMEOUT).await;
    let response = match result {
        Ok(delivered) => TestNotificationResponse {
            channel: state.dispatcher.channel(),
            delivered,
            error: None,
        },
        Err(e) => TestNotificationResponse {
            channel: state.dispatcher.channel(),
            delivered: false,
            error: Some(e.to_string()),
        },
    };

    Ok(Json(DataResponse { data: response }))
}
