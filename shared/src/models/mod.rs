//! Domain models
//!
//! Shared between the hub service and its HTTP clients.
//! IDs are strings; timestamps are epoch millis (`i64`).

pub mod credential;
pub mod event;
pub mod order;
pub mod supplier;

// Re-exports
pub use credential::*;
pub use event::*;
pub use order::*;
pub use supplier::*;
