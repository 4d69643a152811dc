//! Unified error codes for the fulfillment hub
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Credential errors
//! - 2xxx: Provider errors
//! - 3xxx: Webhook errors
//! - 4xxx: Order errors
//! - 5xxx: Notification errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so they serialize as plain
/// numbers on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 6,

    // ==================== 1xxx: Credential ====================
    /// Credential not found
    CredentialNotFound = 1001,
    /// No active credential of the requested type
    NoActiveCredential = 1002,
    /// Provider rejected the stored refresh material
    CredentialRejected = 1003,
    /// Credential is flagged for operator attention
    CredentialNeedsAttention = 1004,
    /// Token refresh failed after exhausting retries
    TokenRefreshFailed = 1005,

    // ==================== 2xxx: Provider ====================
    /// Provider returned a transient failure (timeout, 5xx)
    ProviderTransientFailure = 2001,
    /// Provider could not be reached
    ProviderUnreachable = 2002,
    /// Provider rejected the request (4xx)
    ProviderRejected = 2003,
    /// Provider response could not be decoded
    ProviderResponseInvalid = 2004,

    // ==================== 3xxx: Webhook ====================
    /// Webhook body is malformed
    WebhookPayloadInvalid = 3001,
    /// Webhook carries no order identifier
    OrderIdentifierMissing = 3002,
    /// Webhook event type is not recognized
    UnknownEventType = 3003,
    /// Order status string is not recognized
    UnknownOrderStatus = 3004,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Transition rejected by the order state machine
    OrderTransitionRejected = 4002,
    /// Order is already in a terminal state
    OrderAlreadyTerminal = 4003,
    /// Stale transition lost against a newer one
    OrderSyncConflict = 4004,

    // ==================== 5xxx: Notification ====================
    /// Room name is not a recognized room
    NotificationRoomInvalid = 5001,
    /// Notification payload is malformed
    NotificationPayloadInvalid = 5002,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Network error
    NetworkError = 9003,
    /// Operation timed out
    TimeoutError = 9004,
    /// Configuration error
    ConfigError = 9005,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",

            // Credential
            ErrorCode::CredentialNotFound => "Credential not found",
            ErrorCode::NoActiveCredential => "No active credential",
            ErrorCode::CredentialRejected => "Credential rejected by provider",
            ErrorCode::CredentialNeedsAttention => "Credential needs operator attention",
            ErrorCode::TokenRefreshFailed => "Token refresh failed",

            // Provider
            ErrorCode::ProviderTransientFailure => "Provider temporarily unavailable",
            ErrorCode::ProviderUnreachable => "Provider unreachable",
            ErrorCode::ProviderRejected => "Provider rejected the request",
            ErrorCode::ProviderResponseInvalid => "Provider response could not be decoded",

            // Webhook
            ErrorCode::WebhookPayloadInvalid => "Webhook payload is invalid",
            ErrorCode::OrderIdentifierMissing => "Order identifier is missing",
            ErrorCode::UnknownEventType => "Unknown webhook event type",
            ErrorCode::UnknownOrderStatus => "Unknown order status",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderTransitionRejected => "Order transition rejected",
            ErrorCode::OrderAlreadyTerminal => "Order is already in a terminal state",
            ErrorCode::OrderSyncConflict => "Order update is older than the current state",

            // Notification
            ErrorCode::NotificationRoomInvalid => "Invalid notification room",
            ErrorCode::NotificationPayloadInvalid => "Invalid notification payload",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::NetworkError => "Network error",
            ErrorCode::TimeoutError => "Operation timed out",
            ErrorCode::ConfigError => "Configuration error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            1 => Ok(ErrorCode::Unknown),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            6 => Ok(ErrorCode::RequiredField),

            // Credential
            1001 => Ok(ErrorCode::CredentialNotFound),
            1002 => Ok(ErrorCode::NoActiveCredential),
            1003 => Ok(ErrorCode::CredentialRejected),
            1004 => Ok(ErrorCode::CredentialNeedsAttention),
            1005 => Ok(ErrorCode::TokenRefreshFailed),

            // Provider
            2001 => Ok(ErrorCode::ProviderTransientFailure),
            2002 => Ok(ErrorCode::ProviderUnreachable),
            2003 => Ok(ErrorCode::ProviderRejected),
            2004 => Ok(ErrorCode::ProviderResponseInvalid),

            // Webhook
            3001 => Ok(ErrorCode::WebhookPayloadInvalid),
            3002 => Ok(ErrorCode::OrderIdentifierMissing),
            3003 => Ok(ErrorCode::UnknownEventType),
            3004 => Ok(ErrorCode::UnknownOrderStatus),

            // Order
            4001 => Ok(ErrorCode::OrderNotFound),
            4002 => Ok(ErrorCode::OrderTransitionRejected),
            4003 => Ok(ErrorCode::OrderAlreadyTerminal),
            4004 => Ok(ErrorCode::OrderSyncConflict),

            // Notification
            5001 => Ok(ErrorCode::NotificationRoomInvalid),
            5002 => Ok(ErrorCode::NotificationPayloadInvalid),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9003 => Ok(ErrorCode::NetworkError),
            9004 => Ok(ErrorCode::TimeoutError),
            9005 => Ok(ErrorCode::ConfigError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
