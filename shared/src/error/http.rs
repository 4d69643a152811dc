//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound | Self::CredentialNotFound | Self::OrderNotFound => {
                StatusCode::NOT_FOUND
            }

            // 409 Conflict
            Self::AlreadyExists
            | Self::OrderTransitionRejected
            | Self::OrderAlreadyTerminal
            | Self::OrderSyncConflict
            | Self::NoActiveCredential
            | Self::CredentialNeedsAttention => StatusCode::CONFLICT,

            // 502 Bad Gateway (provider said no or answered garbage)
            Self::CredentialRejected
            | Self::ProviderRejected
            | Self::ProviderResponseInvalid => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable (transient, caller can retry)
            Self::TokenRefreshFailed
            | Self::ProviderTransientFailure
            | Self::ProviderUnreachable
            | Self::NetworkError
            | Self::TimeoutError => StatusCode::SERVICE_UNAVAILABLE,

            // 500 Internal Server Error
            Self::Unknown
            | Self::InternalError
            | Self::DatabaseError
            | Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,

            // 400 Bad Request (validation)
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::RequiredField
            | Self::WebhookPayloadInvalid
            | Self::OrderIdentifierMissing
            | Self::UnknownEventType
            | Self::UnknownOrderStatus
            | Self::NotificationRoomInvalid
            | Self::NotificationPayloadInvalid => StatusCode::BAD_REQUEST,
        }
    }
}
