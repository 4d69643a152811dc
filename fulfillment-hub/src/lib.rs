//! fulfillment-hub: order-fulfillment coordination service
//!
//! Receives delivery-provider webhooks, keeps provider tokens fresh,
//! reconciles orders against the provider and pushes changes to the
//! suppliers and operators that follow them.

pub mod api;
pub mod config;
pub mod core;
pub mod db;
pub mod error;
pub mod live;
pub mod orders;
pub mod providers;
pub mod state;
pub mod suppliers;
pub mod tokens;
pub mod utils;

pub use config::Config;
pub use state::AppState;
