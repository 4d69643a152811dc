//! Order Model

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::util::de_opt_string_or_number;

/// Order status
///
/// Forward order: CREATED → ACCEPTED → IN_PROGRESS → READY → DISPATCHED → COMPLETED.
/// CANCELLED is reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Created,
    Accepted,
    InProgress,
    Ready,
    Dispatched,
    Completed,
    Cancelled,
}

/// Outcome of checking a move between two statuses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCheck {
    /// Target equals current status
    Unchanged,
    /// Legal forward move (stages may be skipped)
    Forward,
    /// Move to an earlier non-terminal stage
    Backward,
    /// Current status is terminal
    FromTerminal,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Accepted => "ACCEPTED",
            Self::InProgress => "IN_PROGRESS",
            Self::Ready => "READY",
            Self::Dispatched => "DISPATCHED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Map a provider status string onto the internal status.
    pub fn from_provider(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        let status = match normalized.as_str() {
            "CREATED" | "RECEIVED" | "PENDING" | "NEW" => Self::Created,
            "ACCEPTED" => Self::Accepted,
            "IN_PROGRESS" | "PREPARING" => Self::InProgress,
            "READY" | "READY_FOR_PICKUP" => Self::Ready,
            "DISPATCHED" | "OUT_FOR_DELIVERY" | "PICKED_UP" => Self::Dispatched,
            "COMPLETED" | "DELIVERED" | "PICKED_UP_BY_CUSTOMER" => Self::Completed,
            "CANCELLED" | "CANCELED" => Self::Cancelled,
            _ => return None,
        };
        Some(status)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Created => 0,
            Self::Accepted => 1,
            Self::InProgress => 2,
            Self::Ready => 3,
            Self::Dispatched => 4,
            Self::Completed | Self::Cancelled => 5,
        }
    }

    /// Classify a move from `self` to `target`.
    pub fn check_transition(&self, target: OrderStatus) -> TransitionCheck {
        if *self == target {
            TransitionCheck::Unchanged
        } else if self.is_terminal() {
            TransitionCheck::FromTerminal
        } else if target.rank() > self.rank() {
            TransitionCheck::Forward
        } else {
            TransitionCheck::Backward
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order line item as sent by the provider.
///
/// Identifier fields arrive under several names and as strings or numbers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(
        default,
        deserialize_with = "de_opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub sku: Option<String>,
    #[serde(
        rename = "id",
        default,
        deserialize_with = "de_opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub product_id: Option<String>,
    #[serde(
        alias = "purchased_product_id",
        default,
        deserialize_with = "de_opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub purchased_product_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

fn default_quantity() -> u32 {
    1
}

impl LineItem {
    /// SKU used for supplier matching: `sku`, then `id`, then `purchased_product_id`.
    pub fn resolved_sku(&self) -> Option<&str> {
        [&self.sku, &self.product_id, &self.purchased_product_id]
            .into_iter()
            .filter_map(|v| v.as_deref())
            .map(str::trim)
            .find(|v| !v.is_empty())
    }
}

/// Whose clock produced an order's `status_changed_at`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusClock {
    /// Event time reported by the provider
    #[default]
    Provider,
    /// Our receipt time; the event carried no timestamp
    Receipt,
}

impl StatusClock {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Provider => "PROVIDER",
            Self::Receipt => "RECEIPT",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "PROVIDER" => Some(Self::Provider),
            "RECEIPT" => Some(Self::Receipt),
            _ => None,
        }
    }
}

/// Order entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: String,
    /// Provider tracking id, unique per provider instance
    pub external_order_id: String,
    pub order_code: Option<String>,
    pub status: OrderStatus,
    /// Timestamp of the event that set the current status (epoch millis)
    pub status_changed_at: i64,
    #[serde(default)]
    pub status_clock: StatusClock,
    pub line_items: Vec<LineItem>,
    /// Open map of provider payload fragments
    pub metadata: Value,
    pub store_id: Option<String>,
    pub credential_id: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}
