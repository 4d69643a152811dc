//! fulfillment-hub: order-fulfillment coordination service
//!
//! Long-running service that:
//! - Receives delivery-provider webhooks and drives the order state machine
//! - Keeps provider access tokens fresh (on demand and by periodic sweep)
//! - Reconciles orders against the provider on request
//! - Pushes order changes to supplier and operator sessions

use fulfillment_hub::core::BackgroundTasks;
use fulfillment_hub::utils::logger::init_logger;
use fulfillment_hub::{AppState, Config, api};
use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Idle per-key lock cleanup interval
const LOCK_PRUNE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    let log_dir = std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty());
    let _log_guard = init_logger(log_dir.as_deref());

    let config = Config::from_env()?;
    tracing::info!("Starting fulfillment-hub (env: {})", config.environment);
    if let Some(dir) = &config.log_dir {
        tracing::info!(log_dir = %dir, "Also writing daily-rolling log files");
    }

    let state = AppState::new(&config).await?;

    let mut tasks = BackgroundTasks::new();
    let tokens = state.tokens.clone();
    tasks.spawn_periodic("token_sweep", config.token_sweep_interval, move || {
        let tokens = tokens.clone();
        async move {
            if let Err(e) = tokens.sweep().await {
                tracing::error!("Token sweep failed: {e}");
            }
        }
    });
    let prune_state = state.clone();
    tasks.spawn_periodic("lock_prune", LOCK_PRUNE_INTERVAL, move || {
        let state = prune_state.clone();
        async move {
            let pruned = state.synchronizer.prune_locks() + state.tokens.prune_locks();
            if pruned > 0 {
                tracing::debug!(pruned, "Pruned idle locks");
            }
        }
    });
    tasks.log_summary();

    let app = api::create_router(state);
    let http_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&http_addr).await?;
    tracing::info!("fulfillment-hub HTTP listening on {http_addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("HTTP server stopped, shutting down background tasks");
    tasks.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
