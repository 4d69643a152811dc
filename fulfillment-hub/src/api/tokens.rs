//! Token endpoints (internal/admin)
//!
//! Tokens are always masked in responses.

use axum::Json;
use axum::extract::{Path, State};
use serde::Serialize;
use shared::error::ApiResponse;

use crate::error::ServiceResult;
use crate::state::AppState;
use crate::tokens::{IssuedToken, RefreshReport, TokenStatus};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub success: bool,
    pub credential_id: String,
    /// Masked token prefix
    pub token: String,
    pub expires_at: i64,
    pub instance_name: String,
}

impl From<IssuedToken> for TokenResponse {
    fn from(token: IssuedToken) -> Self {
        Self {
            success: true,
            token: token.masked(),
            credential_id: token.credential_id,
            expires_at: token.expires_at,
            instance_name: token.instance_name,
        }
    }
}

/// GET /api/tokens/{credential_id}
pub async fn get_valid_token(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ServiceResult<Json<TokenResponse>> {
    let token = state.tokens.get_valid_token(&credential_id).await?;
    Ok(Json(token.into()))
}

/// POST /api/tokens/{credential_id}/refresh
pub async fn force_refresh(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ServiceResult<Json<TokenResponse>> {
    tracing::info!(credential_id = %credential_id, "Manual token refresh requested");
    let token = state.tokens.force_refresh(&credential_id).await?;
    Ok(Json(token.into()))
}

/// GET /api/tokens/{credential_id}/status
pub async fn token_status(
    State(state): State<AppState>,
    Path(credential_id): Path<String>,
) -> ServiceResult<ApiResponse<TokenStatus>> {
    let status = state.tokens.token_status(&credential_id).await?;
    Ok(ApiResponse::success(status))
}

/// POST /api/tokens/sweep
pub async fn sweep(State(state): State<AppState>) -> ServiceResult<ApiResponse<Vec<RefreshReport>>> {
    let reports = state.tokens.sweep().await?;
    let failed = reports.iter().filter(|r| !r.success).count();
    let message = format!("{} credentials checked, {failed} failed", reports.len());
    Ok(ApiResponse::success_with_message(message, reports))
}
