//! Liveness check

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};
use shared::util::now_millis;

use crate::state::AppState;

/// GET /health
///
/// Answers without touching the store or any provider.
pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "notificationSessions": state.hub.connection_count(),
        "timestamp": now_millis(),
    }))
}
