//! Token lifecycle
//!
//! Obtains, caches and refreshes provider access tokens. Refresh is
//! single-flight per credential: on-demand callers and the periodic sweep
//! take the same per-credential lock, and whoever waited re-reads the cache
//! the winner filled.

mod manager;
pub mod retry;
mod sweep;

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

use crate::db::StoreError;

pub use manager::{IssuedToken, TokenManager, TokenSettings, TokenStatus};
pub use retry::RetryPolicy;
pub use sweep::RefreshReport;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("credential {0} not found")]
    NotFound(String),
    #[error("no active credential: {0}")]
    NoActiveCredential(String),
    #[error("refresh rejected for credential {credential_id}: {message}")]
    RefreshRejected {
        credential_id: String,
        message: String,
    },
    #[error("refresh for credential {credential_id} failed after {attempts} attempt(s): {message}")]
    RefreshTransientFailure {
        credential_id: String,
        attempts: u32,
        message: String,
    },
    #[error("provider unreachable while refreshing credential {credential_id}: {message}")]
    ProviderUnreachable {
        credential_id: String,
        message: String,
    },
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match &err {
            TokenError::NotFound(id) => AppError::credential_not_found(id.clone()),
            TokenError::NoActiveCredential(_) => {
                AppError::with_message(ErrorCode::NoActiveCredential, err.to_string())
            }
            TokenError::RefreshRejected { credential_id, .. } => {
                AppError::with_message(ErrorCode::CredentialRejected, err.to_string())
                    .with_detail("credential_id", credential_id.clone())
            }
            TokenError::RefreshTransientFailure {
                credential_id,
                attempts,
                ..
            } => AppError::with_message(ErrorCode::TokenRefreshFailed, err.to_string())
                .with_detail("credential_id", credential_id.clone())
                .with_detail("attempts", *attempts),
            TokenError::ProviderUnreachable { credential_id, .. } => {
                AppError::with_message(ErrorCode::ProviderUnreachable, err.to_string())
                    .with_detail("credential_id", credential_id.clone())
            }
            TokenError::Store(e) => {
                tracing::error!(error = %e, "Credential store error");
                AppError::new(ErrorCode::DatabaseError)
            }
        }
    }
}
