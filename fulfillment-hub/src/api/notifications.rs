//! Notification channel health and internal emit

use axum::Json;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::notify::Room;

use crate::error::ServiceResult;
use crate::live::{HubHealth, Notifier};
use crate::state::AppState;

/// GET /api/notifications/health
pub async fn health(State(state): State<AppState>) -> Json<HubHealth> {
    Json(state.hub.health())
}

#[derive(Debug, Deserialize)]
pub struct EmitRequest {
    pub room: String,
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Serialize)]
pub struct EmitResult {
    pub delivered: usize,
}

/// POST /api/notifications/emit
pub async fn emit(
    State(state): State<AppState>,
    Json(req): Json<EmitRequest>,
) -> ServiceResult<ApiResponse<EmitResult>> {
    let room: Room = req.room.parse()?;
    if req.event.trim().is_empty() {
        return Err(AppError::with_message(
            ErrorCode::NotificationPayloadInvalid,
            "event name is required",
        )
        .into());
    }
    let delivered = state.hub.publish(&room, &req.event, &req.data);
    Ok(ApiResponse::success(EmitResult { delivered }))
}
