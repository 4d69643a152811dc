//! Application state for the fulfillment hub

use std::sync::Arc;

use crate::config::Config;
use crate::db::{MemoryStore, PgStore, Stores};
use crate::live::NotificationHub;
use crate::orders::OrderSynchronizer;
use crate::providers::{CarrierClient, DeliveryClient, OrderProvider, TokenProviders};
use crate::tokens::{RetryPolicy, TokenManager, TokenSettings};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub stores: Stores,
    pub tokens: TokenManager,
    pub synchronizer: OrderSynchronizer,
    pub hub: Arc<NotificationHub>,
}

impl AppState {
    /// Connect the store and build provider clients from configuration
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let stores = match &config.database_url {
            Some(url) => {
                let store = PgStore::connect(url).await?;
                tracing::info!("Connected to PostgreSQL, migrations applied");
                Stores::from_backend(Arc::new(store))
            }
            None if config.is_development() => {
                tracing::warn!("DATABASE_URL not set, using in-memory store (data is lost on restart)");
                Stores::from_backend(Arc::new(MemoryStore::new()))
            }
            None => return Err(format!("DATABASE_URL is required in {}", config.environment).into()),
        };

        let delivery = Arc::new(DeliveryClient::new(
            &config.delivery_api_base_url,
            config.provider_timeout,
        )?);
        let carrier = Arc::new(CarrierClient::new(
            &config.carrier_api_base_url,
            config.provider_timeout,
            config.carrier_token_lifetime,
        )?);
        let providers = TokenProviders {
            delivery: delivery.clone(),
            carrier,
        };

        Ok(Self::from_parts(config.clone(), stores, providers, delivery))
    }

    /// Assemble state from already-built parts
    pub fn from_parts(
        config: Config,
        stores: Stores,
        providers: TokenProviders,
        orders_api: Arc<dyn OrderProvider>,
    ) -> Self {
        let retry = RetryPolicy {
            max_attempts: config.refresh_max_attempts,
            base_delay: config.refresh_base_delay,
            multiplier: config.refresh_backoff_multiplier,
        };
        let tokens = TokenManager::new(
            &stores,
            providers,
            TokenSettings {
                safety_margin: config.token_safety_margin,
                sweep_lead: config.token_safety_margin + config.token_sweep_interval,
                retry,
            },
        );
        let hub = Arc::new(NotificationHub::new(config.session_buffer));
        let synchronizer = OrderSynchronizer::new(
            stores.clone(),
            tokens.clone(),
            orders_api,
            hub.clone(),
            retry,
        );

        Self {
            config: Arc::new(config),
            stores,
            tokens,
            synchronizer,
            hub,
        }
    }
}
