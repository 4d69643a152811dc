//! HTTP routes for the fulfillment hub

pub mod health;
pub mod notifications;
pub mod orders;
pub mod tokens;
pub mod webhooks;
pub mod ws;

use crate::state::AppState;
use axum::Router;
use axum::routing::{get, post};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the combined router
pub fn create_router(state: AppState) -> Router {
    // Inbound provider webhooks
    let webhooks = Router::new()
        .route("/webhooks/delivery/orders", post(webhooks::handle_order_webhook))
        .route("/webhooks/delivery/cancel", post(webhooks::handle_cancel_webhook));

    // Internal/admin token operations
    let tokens = Router::new()
        .route("/api/tokens/sweep", post(tokens::sweep))
        .route("/api/tokens/{credential_id}", get(tokens::get_valid_token))
        .route("/api/tokens/{credential_id}/refresh", post(tokens::force_refresh))
        .route("/api/tokens/{credential_id}/status", get(tokens::token_status));

    let notifications = Router::new()
        .route("/ws", get(ws::handle_ws))
        .route("/api/notifications/health", get(notifications::health))
        .route("/api/notifications/emit", post(notifications::emit));

    Router::new()
        .route("/health", get(health::health_check))
        .route("/api/orders/sync", post(orders::sync_orders))
        .merge(webhooks)
        .merge(tokens)
        .merge(notifications)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
