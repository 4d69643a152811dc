//! Provider clients
//!
//! Thin typed callers for the delivery-fulfillment provider and the
//! communications carrier. HTTP mapping only; retries and token caching
//! live in `tokens`.

pub mod carrier;
pub mod delivery;

use async_trait::async_trait;
use serde_json::Value;
use shared::error::{AppError, ErrorCode};
use shared::models::{Credential, CredentialType, LineItem};
use std::sync::Arc;
use thiserror::Error;

pub use carrier::CarrierClient;
pub use delivery::DeliveryClient;

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// 4xx: the provider refused the request or the credential
    #[error("provider rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },
    /// Timeout, 5xx or an unusable response body
    #[error("provider transient failure: {0}")]
    Transient(String),
    /// Connection could not be established
    #[error("provider unreachable: {0}")]
    Unreachable(String),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Unreachable(_))
    }

    /// Map a transport-level failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient(format!("request timed out: {err}"))
        } else if err.is_connect() {
            Self::Unreachable(err.to_string())
        } else if err.is_decode() {
            Self::Transient(format!("invalid response body: {err}"))
        } else {
            Self::Transient(err.to_string())
        }
    }

    /// Map a non-success HTTP status
    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = if body.is_empty() {
            status.canonical_reason().unwrap_or("no body").to_string()
        } else {
            body.chars().take(300).collect()
        };
        let retryable_4xx = matches!(
            status,
            reqwest::StatusCode::REQUEST_TIMEOUT | reqwest::StatusCode::TOO_MANY_REQUESTS
        );
        if status.is_client_error() && !retryable_4xx {
            Self::Rejected {
                status: status.as_u16(),
                message,
            }
        } else {
            Self::Transient(format!("HTTP {status}: {message}"))
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(err: ProviderError) -> Self {
        let code = match &err {
            ProviderError::Rejected { .. } => ErrorCode::ProviderRejected,
            ProviderError::Transient(_) => ErrorCode::ProviderTransientFailure,
            ProviderError::Unreachable(_) => ErrorCode::ProviderUnreachable,
        };
        AppError::with_message(code, err.to_string())
    }
}

/// Token material returned by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct TokenGrant {
    pub access_token: String,
    /// New refresh token, when the provider rotates it
    pub refresh_token: Option<String>,
    pub expires_in_secs: i64,
}

/// Obtains fresh access tokens for one credential type
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn obtain_token(&self, credential: &Credential) -> Result<TokenGrant, ProviderError>;
}

/// Order as reported by the delivery provider
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOrder {
    pub external_order_id: String,
    pub order_code: Option<String>,
    /// Provider status string, unmapped
    pub status: Option<String>,
    /// Time of the provider's last status change (epoch millis)
    pub status_at: Option<i64>,
    pub store_id: Option<String>,
    pub line_items: Vec<LineItem>,
    /// Provider payload fragment kept in order metadata
    pub details: Value,
}

#[async_trait]
pub trait OrderProvider: Send + Sync {
    async fn list_orders(&self, access_token: &str) -> Result<Vec<RemoteOrder>, ProviderError>;

    async fn get_order(
        &self,
        access_token: &str,
        external_order_id: &str,
    ) -> Result<RemoteOrder, ProviderError>;
}

/// Token provider per credential type
#[derive(Clone)]
pub struct TokenProviders {
    pub delivery: Arc<dyn TokenProvider>,
    pub carrier: Arc<dyn TokenProvider>,
}

impl TokenProviders {
    pub fn for_type(&self, credential_type: CredentialType) -> &Arc<dyn TokenProvider> {
        match credential_type {
            CredentialType::Delivery => &self.delivery,
            CredentialType::Carrier => &self.carrier,
        }
    }
}

pub(crate) fn http_client(timeout: std::time::Duration) -> Result<reqwest::Client, ProviderError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ProviderError::Transient(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn status_classification() {
        assert!(matches!(
            ProviderError::from_status(StatusCode::UNAUTHORIZED, "bad token"),
            ProviderError::Rejected { status: 401, .. }
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::BAD_GATEWAY, ""),
            ProviderError::Transient(_)
        ));
        assert!(matches!(
            ProviderError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ProviderError::Transient(_)
        ));
    }

    #[test]
    fn only_rejections_are_final() {
        assert!(ProviderError::Transient("x".into()).is_retryable());
        assert!(ProviderError::Unreachable("x".into()).is_retryable());
        assert!(
            !ProviderError::Rejected {
                status: 400,
                message: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn app_error_codes() {
        let err: AppError = ProviderError::Unreachable("dns".into()).into();
        assert_eq!(err.code, ErrorCode::ProviderUnreachable);
    }
}
