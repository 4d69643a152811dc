//! Logging Infrastructure
//!
//! `RUST_LOG` filter, plain stdout in development, daily-rolling files when a
//! log directory is configured.

use std::path::Path;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "fulfillment_hub=info,tower_http=info";

/// Initialize the global subscriber.
///
/// Returns the appender guard when logging to files; keep it alive for the
/// lifetime of the process or buffered lines are lost.
pub fn init_logger(log_dir: Option<&str>) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_FILTER.into());

    if let Some(dir) = log_dir {
        let path = Path::new(dir);
        if path.is_dir() {
            let appender = tracing_appender::rolling::daily(path, "fulfillment-hub");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(writer)
                .json()
                .init();
            return Some(guard);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
    if let Some(dir) = log_dir {
        tracing::warn!(dir, "Log directory does not exist, logging to stdout");
    }
    None
}
