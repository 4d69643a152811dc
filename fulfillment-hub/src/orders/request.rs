//! Input adapters: webhook and pull-sync observations become one request type

use serde_json::{Value, json};
use shared::models::{LineItem, OrderStatus, StatusClock};
use shared::util::derive_id;
use shared::webhook::{WebhookEvent, WebhookKind};

use crate::providers::RemoteOrder;

/// Where a transition request came from
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionSource {
    Webhook {
        webhook_id: String,
        event_type: &'static str,
    },
    PullSync {
        credential_id: String,
    },
}

impl TransitionSource {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Webhook {
                webhook_id,
                event_type,
            } => json!({ "type": "webhook", "webhookId": webhook_id, "eventType": event_type }),
            Self::PullSync { credential_id } => {
                json!({ "type": "pull-sync", "credentialId": credential_id })
            }
        }
    }
}

/// One observed order state, ready for the synchronizer
#[derive(Debug, Clone)]
pub struct TransitionRequest {
    pub external_order_id: String,
    pub target: OrderStatus,
    /// Idempotency ledger key
    pub dedupe_key: String,
    pub source: TransitionSource,
    /// Provider's event time, when known
    pub occurred_at: Option<i64>,
    pub received_at: i64,
    /// Fragment merged into the order's metadata
    pub metadata: Value,
    pub order_code: Option<String>,
    pub store_id: Option<String>,
    pub credential_id: Option<String>,
    pub line_items: Vec<LineItem>,
    pub reason: Option<String>,
    /// Fetch provider detail when the order is new and carries no items
    pub enrich: bool,
}

impl TransitionRequest {
    pub fn from_webhook(event: WebhookEvent, received_at: i64) -> Self {
        let target = event.kind.target_status();
        let (metadata, reason, enrich) = match &event.kind {
            WebhookKind::StatusUpdate {
                status,
                provider_status,
            } => (
                json!({ "lastStatusUpdate": {
                    "webhookId": event.webhook_id,
                    "status": status,
                    "providerStatus": provider_status,
                    "date": event.date_raw,
                    "receivedAt": received_at,
                }}),
                None,
                true,
            ),
            WebhookKind::Cancel { reason } => (
                json!({ "cancelEvent": {
                    "webhookId": event.webhook_id,
                    "eventType": event.kind.name(),
                    "reason": reason,
                    "date": event.date_raw,
                    "receivedAt": received_at,
                }}),
                reason.clone(),
                false,
            ),
            WebhookKind::NewOrder => (
                json!({ "newOrder": {
                    "webhookId": event.webhook_id,
                    "date": event.date_raw,
                    "receivedAt": received_at,
                }}),
                None,
                true,
            ),
        };

        Self {
            dedupe_key: event.webhook_id.clone(),
            source: TransitionSource::Webhook {
                webhook_id: event.webhook_id,
                event_type: event.kind.name(),
            },
            external_order_id: event.external_order_id,
            target,
            occurred_at: event.occurred_at,
            received_at,
            metadata,
            order_code: event.order_code,
            store_id: event.store_id,
            credential_id: None,
            line_items: event.line_items,
            reason,
            enrich,
        }
    }

    /// `None` when the provider status has no internal mapping
    pub fn from_remote(remote: RemoteOrder, credential_id: &str, received_at: i64) -> Option<Self> {
        let raw_status = remote.status.as_deref()?;
        let target = OrderStatus::from_provider(raw_status)?;
        let observed_at = remote.status_at.map(|t| t.to_string()).unwrap_or_default();
        let key = derive_id(&["sync", &remote.external_order_id, raw_status, &observed_at]);

        let mut metadata = json!({ "lastSync": {
            "status": target,
            "providerStatus": raw_status,
            "syncedAt": received_at,
        }});
        if !remote.details.is_null() {
            metadata["provider"] = remote.details;
        }

        Some(Self {
            dedupe_key: format!("sync-{}", &key[..32]),
            source: TransitionSource::PullSync {
                credential_id: credential_id.to_string(),
            },
            external_order_id: remote.external_order_id,
            target,
            occurred_at: remote.status_at,
            received_at,
            metadata,
            order_code: remote.order_code,
            store_id: remote.store_id,
            credential_id: Some(credential_id.to_string()),
            line_items: remote.line_items,
            reason: None,
            enrich: false,
        })
    }

    /// Time the observed status took effect
    pub fn event_time(&self) -> i64 {
        self.occurred_at.unwrap_or(self.received_at)
    }

    /// Clock behind [`TransitionRequest::event_time`]
    pub fn clock(&self) -> StatusClock {
        if self.occurred_at.is_some() {
            StatusClock::Provider
        } else {
            StatusClock::Receipt
        }
    }
}
