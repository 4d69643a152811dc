//! Error category classification

use super::codes::ErrorCode;
use serde::{Deserialize, Serialize};

/// Error category classification based on error code ranges
///
/// Categories are determined by the leading digit of the error code:
/// - 0xxx: General errors
/// - 1xxx: Credential errors
/// - 2xxx: Provider errors
/// - 3xxx: Webhook errors
/// - 4xxx: Order errors
/// - 5xxx: Notification errors
/// - 9xxx: System errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// General errors (0xxx)
    General,
    /// Credential and token errors (1xxx)
    Credential,
    /// Upstream provider errors (2xxx)
    Provider,
    /// Inbound webhook errors (3xxx)
    Webhook,
    /// Order errors (4xxx)
    Order,
    /// Notification channel errors (5xxx)
    Notification,
    /// System errors (9xxx and anything unassigned)
    System,
}

impl ErrorCategory {
    /// Determine category from error code value
    pub fn from_code(code: u16) -> Self {
        match code {
            0..1000 => Self::General,
            1000..2000 => Self::Credential,
            2000..3000 => Self::Provider,
            3000..4000 => Self::Webhook,
            4000..5000 => Self::Order,
            5000..6000 => Self::Notification,
            _ => Self::System,
        }
    }

    /// Get the string name for this category
    pub fn name(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Credential => "credential",
            Self::Provider => "provider",
            Self::Webhook => "webhook",
            Self::Order => "order",
            Self::Notification => "notification",
            Self::System => "system",
        }
    }
}

impl ErrorCode {
    /// Get the category for this error code
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::from_code(self.code())
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
