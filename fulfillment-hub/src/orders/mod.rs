//! Order synchronizer
//!
//! Webhooks and pull-sync are two adapters over one idempotent core,
//! [`OrderSynchronizer::apply`]. Each apply runs under a per-order lock and
//! commits the order row, its Event and the dedupe key in one write.

pub mod metadata;
mod request;
mod sync;
mod synchronizer;

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::db::StoreError;
use crate::providers::ProviderError;
use crate::tokens::TokenError;

pub use request::{TransitionRequest, TransitionSource};
pub use sync::SyncReport;
pub use synchronizer::{ApplyOutcome, ApplyResult, OrderSynchronizer};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("{0}")]
    Validation(String),
    #[error("credential {0} not found")]
    CredentialNotFound(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Provider(#[from] ProviderError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::Validation(msg) => AppError::validation(msg),
            SyncError::CredentialNotFound(id) => AppError::credential_not_found(id),
            SyncError::Token(e) => e.into(),
            SyncError::Provider(e) => e.into(),
            SyncError::Store(e) => {
                tracing::error!(error = %e, "Order store error");
                AppError::with_message(ErrorCode::DatabaseError, "Order store unavailable")
            }
        }
    }
}
