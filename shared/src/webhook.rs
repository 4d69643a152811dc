//! Inbound delivery-provider webhook
//!
//! The provider sends loosely shaped JSON. [`WebhookBody`] accepts every
//! field it may carry; [`WebhookEvent::try_from`] narrows it to one of the
//! known event shapes or rejects it.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{AppError, ErrorCode};
use crate::models::{LineItem, OrderStatus};
use crate::util::{de_opt_string_or_number, derive_id, parse_timestamp_millis};

/// Raw webhook body as received on the wire
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookBody {
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    pub tracking_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    pub external_order_id: Option<String>,
    /// Legacy new-order shape
    #[serde(rename = "order_id", default, deserialize_with = "de_opt_string_or_number")]
    pub order_id: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    pub webhook_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// RFC 3339 string or epoch millis
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    pub date: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    pub order_code: Option<String>,
    #[serde(
        rename = "store_id",
        alias = "storeId",
        default,
        deserialize_with = "de_opt_string_or_number"
    )]
    pub store_id: Option<String>,
    #[serde(default)]
    pub products: Vec<LineItem>,
}

/// Known webhook shapes
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookKind {
    NewOrder,
    StatusUpdate {
        status: OrderStatus,
        /// Status string exactly as the provider sent it
        provider_status: String,
    },
    Cancel {
        reason: Option<String>,
    },
}

impl WebhookKind {
    /// Status the order should end up in
    pub fn target_status(&self) -> OrderStatus {
        match self {
            Self::NewOrder => OrderStatus::Created,
            Self::StatusUpdate { status, .. } => *status,
            Self::Cancel { .. } => OrderStatus::Cancelled,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NewOrder => "NEW_ORDER",
            Self::StatusUpdate { .. } => "STATUS_UPDATE",
            Self::Cancel { .. } => "CANCEL",
        }
    }
}

/// Validated webhook
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEvent {
    pub external_order_id: String,
    /// Provider-supplied id, or a deterministic one derived from the content
    pub webhook_id: String,
    pub kind: WebhookKind,
    /// Event time (epoch millis) when the provider sent a parseable date
    pub occurred_at: Option<i64>,
    pub date_raw: Option<String>,
    pub order_code: Option<String>,
    pub store_id: Option<String>,
    pub line_items: Vec<LineItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WebhookError {
    #[error("Order identifier (trackingNumber) is required")]
    MissingIdentifier,
    #[error("Unknown webhook event type: {0}")]
    UnknownEventType(String),
    #[error("Status update without a status")]
    MissingStatus,
    #[error("Unknown order status: {0}")]
    UnknownStatus(String),
}

impl From<WebhookError> for AppError {
    fn from(err: WebhookError) -> Self {
        let code = match &err {
            WebhookError::MissingIdentifier => ErrorCode::OrderIdentifierMissing,
            WebhookError::UnknownEventType(_) => ErrorCode::UnknownEventType,
            WebhookError::MissingStatus => ErrorCode::RequiredField,
            WebhookError::UnknownStatus(_) => ErrorCode::UnknownOrderStatus,
        };
        AppError::with_message(code, err.to_string())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl TryFrom<WebhookBody> for WebhookEvent {
    type Error = WebhookError;

    fn try_from(body: WebhookBody) -> Result<Self, Self::Error> {
        let external_order_id = non_empty(body.tracking_number)
            .or_else(|| non_empty(body.external_order_id))
            .or_else(|| non_empty(body.order_id))
            .ok_or(WebhookError::MissingIdentifier)?;

        let store_id = non_empty(body.store_id);
        let event_type = non_empty(body.event_type).map(|t| t.to_ascii_uppercase());

        let kind = match event_type.as_deref() {
            Some("STATUS_UPDATE") => {
                let raw = non_empty(body.status).ok_or(WebhookError::MissingStatus)?;
                let status = OrderStatus::from_provider(&raw)
                    .ok_or_else(|| WebhookError::UnknownStatus(raw.clone()))?;
                WebhookKind::StatusUpdate {
                    status,
                    provider_status: raw,
                }
            }
            Some("CANCEL" | "CANCELLED" | "ORDER_CANCELLED") => WebhookKind::Cancel {
                reason: non_empty(body.reason),
            },
            Some("NEW_ORDER" | "ORDER_CREATED") => WebhookKind::NewOrder,
            Some(other) => return Err(WebhookError::UnknownEventType(other.to_string())),
            // Legacy new-order shape carries no event type
            None if store_id.is_some() => WebhookKind::NewOrder,
            None => return Err(WebhookError::UnknownEventType("<missing>".to_string())),
        };

        let date_raw = non_empty(body.date);
        let occurred_at = date_raw.as_deref().and_then(parse_timestamp_millis);

        let webhook_id = non_empty(body.webhook_id).unwrap_or_else(|| {
            let status = kind.target_status();
            let hash = derive_id(&[
                &external_order_id,
                kind.name(),
                status.as_str(),
                date_raw.as_deref().unwrap_or(""),
            ]);
            format!("derived-{}", &hash[..32])
        });

        Ok(Self {
            external_order_id,
            webhook_id,
            kind,
            occurred_at,
            date_raw,
            order_code: non_empty(body.order_code),
            store_id,
            line_items: body.products,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<WebhookEvent, WebhookError> {
        let body: WebhookBody = serde_json::from_value(value).unwrap();
        WebhookEvent::try_from(body)
    }

    #[test]
    fn cancel_webhook() {
        let ev = parse(json!({
            "trackingNumber": "T-1",
            "eventType": "CANCEL",
            "webhookId": "W-1",
            "reason": "Out of stock"
        }))
        .unwrap();
        assert_eq!(ev.external_order_id, "T-1");
        assert_eq!(ev.webhook_id, "W-1");
        assert_eq!(
            ev.kind,
            WebhookKind::Cancel {
                reason: Some("Out of stock".into())
            }
        );
        assert_eq!(ev.kind.target_status(), OrderStatus::Cancelled);
    }

    #[test]
    fn identifier_precedence() {
        let ev = parse(json!({
            "trackingNumber": "T-1",
            "externalOrderId": "E-1",
            "order_id": 7,
            "eventType": "NEW_ORDER"
        }))
        .unwrap();
        assert_eq!(ev.external_order_id, "T-1");

        let ev = parse(json!({"externalOrderId": "E-1", "order_id": 7, "eventType": "NEW_ORDER"}))
            .unwrap();
        assert_eq!(ev.external_order_id, "E-1");
    }

    #[test]
    fn missing_identifier_fails_closed() {
        assert_eq!(
            parse(json!({"eventType": "CANCEL", "webhookId": "W"})),
            Err(WebhookError::MissingIdentifier)
        );
        assert_eq!(
            parse(json!({"trackingNumber": "  ", "eventType": "CANCEL"})),
            Err(WebhookError::MissingIdentifier)
        );
    }

    #[test]
    fn status_update_requires_known_status() {
        let ev = parse(json!({
            "trackingNumber": "T-2",
            "eventType": "STATUS_UPDATE",
            "webhookId": "W-2",
            "status": "DELIVERED",
            "date": "2024-05-01T10:00:00Z"
        }))
        .unwrap();
        assert_eq!(ev.kind.target_status(), OrderStatus::Completed);
        assert!(ev.occurred_at.is_some());

        assert_eq!(
            parse(json!({"trackingNumber": "T-2", "eventType": "STATUS_UPDATE"})),
            Err(WebhookError::MissingStatus)
        );
        assert_eq!(
            parse(json!({"trackingNumber": "T-2", "eventType": "STATUS_UPDATE", "status": "EXPLODED"})),
            Err(WebhookError::UnknownStatus("EXPLODED".into()))
        );
    }

    #[test]
    fn legacy_new_order_shape() {
        let ev = parse(json!({
            "order_id": 991,
            "store_id": 12,
            "products": [{"id": 5, "purchased_product_id": 77, "quantity": 2, "name": "Bread"}]
        }))
        .unwrap();
        assert_eq!(ev.external_order_id, "991");
        assert_eq!(ev.store_id.as_deref(), Some("12"));
        assert_eq!(ev.kind, WebhookKind::NewOrder);
        assert_eq!(ev.line_items[0].resolved_sku(), Some("5"));
        assert!(ev.webhook_id.starts_with("derived-"));
    }

    #[test]
    fn unknown_shapes_are_rejected() {
        assert_eq!(
            parse(json!({"trackingNumber": "T", "eventType": "PING"})),
            Err(WebhookError::UnknownEventType("PING".into()))
        );
        assert!(parse(json!({"trackingNumber": "T"})).is_err());
    }

    #[test]
    fn derived_webhook_id_is_stable_across_redelivery() {
        let body = json!({"trackingNumber": "T-3", "eventType": "CANCEL", "date": "1700000000000"});
        let a = parse(body.clone()).unwrap();
        let b = parse(body).unwrap();
        assert_eq!(a.webhook_id, b.webhook_id);
    }

    #[test]
    fn error_codes() {
        let err: AppError = WebhookError::MissingIdentifier.into();
        assert_eq!(err.code, ErrorCode::OrderIdentifierMissing);
        assert_eq!(err.http_status(), http::StatusCode::BAD_REQUEST);
    }
}
