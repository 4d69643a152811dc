//! Sync trigger
//!
//! POST /api/orders/sync {credentialId}

use axum::Json;
use axum::extract::State;
use serde::Deserialize;
use shared::error::{ApiResponse, AppError};

use crate::error::ServiceResult;
use crate::orders::SyncReport;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    pub credential_id: String,
}

pub async fn sync_orders(
    State(state): State<AppState>,
    Json(req): Json<SyncRequest>,
) -> ServiceResult<ApiResponse<SyncReport>> {
    if req.credential_id.trim().is_empty() {
        return Err(AppError::validation("credentialId is required").into());
    }
    let report = state.synchronizer.sync_orders(&req.credential_id).await?;
    let message = format!("{} orders reconciled", report.orders.len());
    Ok(ApiResponse::success_with_message(message, report))
}
