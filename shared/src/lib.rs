//! Shared types for the fulfillment hub
//!
//! Error system, domain models, the inbound webhook body and the
//! notification channel protocol. No I/O lives here.

pub mod error;
pub mod models;
pub mod notify;
pub mod util;
pub mod webhook;

// Re-exports
pub use axum::Json;
pub use http;
pub use serde::{Deserialize, Serialize};
