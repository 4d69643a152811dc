//! Data-access contract
//!
//! The hub reads and writes through these traits only. [`MemoryStore`] backs
//! development and tests; [`PgStore`] backs deployments with `DATABASE_URL`.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use shared::models::{Credential, CredentialType, Event, Order, SupplierAssignment};
use std::sync::Arc;
use thiserror::Error;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error("corrupt record: {0}")]
    Corrupt(String),
    #[error("{0} not found")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// New token material written after a successful refresh
#[derive(Debug, Clone)]
pub struct TokenUpdate {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: i64,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get_credential(&self, id: &str) -> StoreResult<Option<Credential>>;

    /// Active credentials, optionally restricted to one type, ordered by id
    async fn list_active_credentials(
        &self,
        credential_type: Option<CredentialType>,
    ) -> StoreResult<Vec<Credential>>;

    /// Persist refreshed token material; clears any attention flag and last error.
    /// A `None` refresh token keeps the stored one.
    async fn save_token(&self, id: &str, update: &TokenUpdate) -> StoreResult<()>;

    async fn mark_needs_attention(&self, id: &str, reason: &str) -> StoreResult<()>;

    async fn record_refresh_error(&self, id: &str, message: &str) -> StoreResult<()>;
}

/// Single atomic write of the order synchronizer
#[derive(Debug, Clone)]
pub struct OrderCommit {
    /// Ledger key (webhook id or sync observation key)
    pub dedupe_key: String,
    /// Order row to insert or replace
    pub order: Option<Order>,
    pub event: Option<Event>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    /// Dedupe key already recorded; nothing was written
    Duplicate,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn find_order_by_external_id(&self, external_order_id: &str)
    -> StoreResult<Option<Order>>;

    /// Every stored order synced through a credential, oldest first
    async fn orders_for_credential(&self, credential_id: &str) -> StoreResult<Vec<Order>>;

    async fn is_processed(&self, dedupe_key: &str) -> StoreResult<bool>;

    /// Record the dedupe key, upsert the order and append the event, all or nothing.
    async fn commit(&self, commit: OrderCommit) -> StoreResult<CommitOutcome>;
}

#[async_trait]
pub trait EventStore: Send + Sync {
    async fn append_event(&self, event: &Event) -> StoreResult<()>;

    /// Events attached to an order, oldest first
    async fn events_for_order(&self, order_id: &str) -> StoreResult<Vec<Event>>;
}

#[async_trait]
pub trait AssignmentStore: Send + Sync {
    async fn active_assignments(&self) -> StoreResult<Vec<SupplierAssignment>>;
}

/// Handles to every store, usually all backed by one object
#[derive(Clone)]
pub struct Stores {
    pub credentials: Arc<dyn CredentialStore>,
    pub orders: Arc<dyn OrderStore>,
    pub events: Arc<dyn EventStore>,
    pub assignments: Arc<dyn AssignmentStore>,
}

impl Stores {
    pub fn from_backend<S>(backend: Arc<S>) -> Self
    where
        S: CredentialStore + OrderStore + EventStore + AssignmentStore + 'static,
    {
        Self {
            credentials: backend.clone(),
            orders: backend.clone(),
            events: backend.clone(),
            assignments: backend,
        }
    }
}
