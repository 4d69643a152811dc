//! Delivery-provider webhooks
//!
//! POST /webhooks/delivery/orders (any known event type)
//! POST /webhooks/delivery/cancel (cancel notices, eventType defaults to CANCEL)
//!
//! Well-formed webhooks always get 200, including duplicates and rejected
//! transitions, so the provider does not retry them.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use serde::Serialize;
use shared::error::{ApiResponse, AppError, ErrorCode};
use shared::models::OrderStatus;
use shared::webhook::{WebhookBody, WebhookEvent};

use crate::error::ServiceResult;
use crate::orders::ApplyOutcome;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookAck {
    pub external_order_id: String,
    pub webhook_id: String,
    pub outcome: ApplyOutcome,
    pub status: Option<OrderStatus>,
}

pub async fn handle_order_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookBody>, JsonRejection>,
) -> ServiceResult<ApiResponse<WebhookAck>> {
    let Json(body) = payload.map_err(invalid_payload)?;
    process(&state, body).await
}

pub async fn handle_cancel_webhook(
    State(state): State<AppState>,
    payload: Result<Json<WebhookBody>, JsonRejection>,
) -> ServiceResult<ApiResponse<WebhookAck>> {
    let Json(mut body) = payload.map_err(invalid_payload)?;
    if body.event_type.as_deref().is_none_or(|t| t.trim().is_empty()) {
        body.event_type = Some("CANCEL".to_string());
    }
    process(&state, body).await
}

async fn process(state: &AppState, body: WebhookBody) -> ServiceResult<ApiResponse<WebhookAck>> {
    let event = WebhookEvent::try_from(body).map_err(|e| {
        tracing::warn!("Webhook rejected: {e}");
        AppError::from(e)
    })?;
    let external_order_id = event.external_order_id.clone();
    let webhook_id = event.webhook_id.clone();

    let result = state.synchronizer.handle_webhook(event).await?;
    Ok(ApiResponse::success_with_message(
        result.message(),
        WebhookAck {
            external_order_id,
            webhook_id,
            outcome: result.outcome,
            status: result.order.as_ref().map(|o| o.status),
        },
    ))
}

fn invalid_payload(rejection: JsonRejection) -> AppError {
    tracing::warn!("Webhook body unreadable: {rejection}");
    AppError::with_message(ErrorCode::WebhookPayloadInvalid, rejection.body_text())
}
