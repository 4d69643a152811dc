//! Audit event (append-only)

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::order::OrderStatus;

/// Domain occurrence recorded in the audit log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    OrderCreated,
    OrderStatusChanged,
    OrderCompleted,
    OrderCancelled,
    /// Anomaly: transition refused by the state machine
    OrderTransitionRejected,
    /// Anomaly: update older than the stored status
    OrderSyncConflict,
    OrdersSynced,
    CredentialRefreshed,
    CredentialRejected,
    CredentialRefreshFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OrderCreated => "order-created",
            Self::OrderStatusChanged => "order-status-changed",
            Self::OrderCompleted => "order-completed",
            Self::OrderCancelled => "order-cancelled",
            Self::OrderTransitionRejected => "order-transition-rejected",
            Self::OrderSyncConflict => "order-sync-conflict",
            Self::OrdersSynced => "orders-synced",
            Self::CredentialRefreshed => "credential-refreshed",
            Self::CredentialRejected => "credential-rejected",
            Self::CredentialRefreshFailed => "credential-refresh-failed",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let event = match raw {
            "order-created" => Self::OrderCreated,
            "order-status-changed" => Self::OrderStatusChanged,
            "order-completed" => Self::OrderCompleted,
            "order-cancelled" => Self::OrderCancelled,
            "order-transition-rejected" => Self::OrderTransitionRejected,
            "order-sync-conflict" => Self::OrderSyncConflict,
            "orders-synced" => Self::OrdersSynced,
            "credential-refreshed" => Self::CredentialRefreshed,
            "credential-rejected" => Self::CredentialRejected,
            "credential-refresh-failed" => Self::CredentialRefreshFailed,
            _ => return None,
        };
        Some(event)
    }

    /// Event type for an accepted transition into `status`.
    pub fn for_transition(status: OrderStatus, is_new_order: bool) -> Self {
        match status {
            OrderStatus::Cancelled => Self::OrderCancelled,
            OrderStatus::Completed => Self::OrderCompleted,
            _ if is_new_order => Self::OrderCreated,
            _ => Self::OrderStatusChanged,
        }
    }

    /// Anomalies are recorded but change no order state
    pub fn is_anomaly(&self) -> bool {
        matches!(
            self,
            Self::OrderTransitionRejected | Self::OrderSyncConflict
        )
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub title: String,
    pub description: String,
    pub related_order_id: Option<String>,
    pub related_store_id: Option<String>,
    pub metadata: Value,
    pub created_at: i64,
}
