//! Apply flow
//!
//! ```text
//! apply(request)
//!     ├─ 1. Lock external_order_id
//!     ├─ 2. Idempotency check (dedupe key)
//!     ├─ 3. Plan: new stub | unchanged | stale | rejected | forward
//!     ├─ 4. Commit order + event + dedupe key atomically
//!     ├─ 5. Unlock
//!     └─ 6. Fan out to interested rooms (best effort)
//! ```

use serde::Serialize;
use serde_json::{Value, json};
use shared::models::{
    CredentialType, Event, EventType, Order, OrderStatus, StatusClock, TransitionCheck,
};
use shared::notify::{Room, events};
use shared::util::now_millis;
use shared::webhook::WebhookEvent;
use std::sync::Arc;

use super::SyncError;
use super::metadata::deep_merge;
use super::request::TransitionRequest;
use crate::core::KeyedLocks;
use crate::db::{CommitOutcome, OrderCommit, Stores};
use crate::live::Notifier;
use crate::providers::OrderProvider;
use crate::suppliers::resolve_interested_suppliers;
use crate::tokens::{RetryPolicy, TokenManager};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ApplyOutcome {
    /// Unknown order recorded in the requested status
    Created,
    Transitioned,
    /// Order already in the requested status
    Unchanged,
    /// Dedupe key seen before; nothing written
    Duplicate,
    /// Older than the order's current status; conflict Event written
    Stale,
    /// Terminal or backward move; anomaly Event written
    Rejected,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplyResult {
    pub outcome: ApplyOutcome,
    /// Stored order after the apply
    pub order: Option<Order>,
    pub event_type: Option<EventType>,
}

impl ApplyResult {
    pub fn message(&self) -> &'static str {
        match self.outcome {
            ApplyOutcome::Created => "Order created",
            ApplyOutcome::Transitioned => "Order updated",
            ApplyOutcome::Unchanged => "Order already in this status",
            ApplyOutcome::Duplicate => "Webhook already processed",
            ApplyOutcome::Stale => "Stale update ignored",
            ApplyOutcome::Rejected => "Transition rejected",
        }
    }
}

struct Plan {
    outcome: ApplyOutcome,
    order: Order,
    write_order: bool,
    event: Option<Event>,
    previous: Option<OrderStatus>,
}

#[derive(Clone)]
pub struct OrderSynchronizer {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) stores: Stores,
    pub(super) tokens: TokenManager,
    pub(super) orders_api: Arc<dyn OrderProvider>,
    notifier: Arc<dyn Notifier>,
    locks: KeyedLocks,
    pub(super) retry: RetryPolicy,
}

impl OrderSynchronizer {
    pub fn new(
        stores: Stores,
        tokens: TokenManager,
        orders_api: Arc<dyn OrderProvider>,
        notifier: Arc<dyn Notifier>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                stores,
                tokens,
                orders_api,
                notifier,
                locks: KeyedLocks::new(),
                retry,
            }),
        }
    }

    /// Drop idle per-order locks
    pub fn prune_locks(&self) -> usize {
        self.inner.locks.prune()
    }

    pub async fn handle_webhook(&self, event: WebhookEvent) -> Result<ApplyResult, SyncError> {
        self.apply(TransitionRequest::from_webhook(event, now_millis()))
            .await
    }

    /// Apply one observed state to the stored order.
    pub async fn apply(&self, request: TransitionRequest) -> Result<ApplyResult, SyncError> {
        let guard = self.inner.locks.lock(&request.external_order_id).await;
        let orders = &self.inner.stores.orders;

        if orders.is_processed(&request.dedupe_key).await? {
            tracing::debug!(
                external_order_id = %request.external_order_id,
                dedupe_key = %request.dedupe_key,
                "Duplicate delivery ignored"
            );
            return Ok(ApplyResult {
                outcome: ApplyOutcome::Duplicate,
                order: orders
                    .find_order_by_external_id(&request.external_order_id)
                    .await?,
                event_type: None,
            });
        }

        let plan = match orders
            .find_order_by_external_id(&request.external_order_id)
            .await?
        {
            None => self.plan_new(&request).await,
            Some(order) => plan_existing(order, &request),
        };

        let event_type = plan.event.as_ref().map(|e| e.event_type);
        let committed = orders
            .commit(OrderCommit {
                dedupe_key: request.dedupe_key.clone(),
                order: plan.write_order.then(|| plan.order.clone()),
                event: plan.event,
            })
            .await?;
        drop(guard);

        if committed == CommitOutcome::Duplicate {
            return Ok(ApplyResult {
                outcome: ApplyOutcome::Duplicate,
                order: orders
                    .find_order_by_external_id(&request.external_order_id)
                    .await?,
                event_type: None,
            });
        }

        match plan.outcome {
            ApplyOutcome::Created | ApplyOutcome::Transitioned => {
                tracing::info!(
                    external_order_id = %plan.order.external_order_id,
                    from = ?plan.previous,
                    to = %plan.order.status,
                    source = %request.source.to_json(),
                    "Order transition applied"
                );
                self.fan_out(&plan.order, plan.previous).await;
            }
            ApplyOutcome::Stale | ApplyOutcome::Rejected => {
                tracing::warn!(
                    external_order_id = %plan.order.external_order_id,
                    current = %plan.order.status,
                    requested = %request.target,
                    outcome = ?plan.outcome,
                    "Order transition not applied"
                );
            }
            ApplyOutcome::Unchanged | ApplyOutcome::Duplicate => {}
        }

        Ok(ApplyResult {
            outcome: plan.outcome,
            order: Some(plan.order),
            event_type,
        })
    }

    async fn plan_new(&self, request: &TransitionRequest) -> Plan {
        let now = now_millis();
        let mut order = Order {
            id: uuid::Uuid::new_v4().to_string(),
            external_order_id: request.external_order_id.clone(),
            order_code: request.order_code.clone(),
            status: request.target,
            status_changed_at: request.event_time(),
            status_clock: request.clock(),
            line_items: request.line_items.clone(),
            metadata: json!({}),
            store_id: request.store_id.clone(),
            credential_id: request.credential_id.clone(),
            created_at: now,
            updated_at: now,
        };
        deep_merge(&mut order.metadata, request.metadata.clone());
        if request.enrich && order.line_items.is_empty() {
            self.enrich(&mut order).await;
        }

        let event_type = EventType::for_transition(order.status, true);
        let description = match (&request.reason, order.status) {
            (Some(reason), OrderStatus::Cancelled) => format!("Cancelled: {reason}"),
            _ => format!(
                "First seen with status {} ({} line items)",
                order.status,
                order.line_items.len()
            ),
        };
        let event = order_event(
            event_type,
            &order,
            format!("Order {} recorded", order.external_order_id),
            description,
            transition_metadata(request, None, &order),
        );

        Plan {
            outcome: ApplyOutcome::Created,
            order,
            write_order: true,
            event: Some(event),
            previous: None,
        }
    }

    /// Fill an unknown order from the provider's detail. Failure only logs.
    async fn enrich(&self, order: &mut Order) {
        let token = match self
            .inner
            .tokens
            .get_valid_token_for_type(CredentialType::Delivery)
            .await
        {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(external_order_id = %order.external_order_id, "Skipping enrichment: {e}");
                return;
            }
        };

        match self
            .inner
            .orders_api
            .get_order(&token.access_token, &order.external_order_id)
            .await
        {
            Ok(remote) => {
                if order.order_code.is_none() {
                    order.order_code = remote.order_code;
                }
                if order.store_id.is_none() {
                    order.store_id = remote.store_id;
                }
                if order.line_items.is_empty() {
                    order.line_items = remote.line_items;
                }
                order.credential_id.get_or_insert(token.credential_id);
                deep_merge(&mut order.metadata, json!({ "provider": remote.details }));
            }
            Err(e) => {
                tracing::warn!(
                    external_order_id = %order.external_order_id,
                    "Order enrichment failed: {e}"
                );
            }
        }
    }

    async fn fan_out(&self, order: &Order, previous: Option<OrderStatus>) {
        let assignments = match self.inner.stores.assignments.active_assignments().await {
            Ok(assignments) => assignments,
            Err(e) => {
                tracing::warn!(error = %e, "Could not load supplier assignments");
                Vec::new()
            }
        };
        let matched = resolve_interested_suppliers(&order.line_items, &assignments);

        let event = match (order.status, previous) {
            (OrderStatus::Cancelled, _) => events::ORDER_CANCELLED,
            (OrderStatus::Completed, _) => events::ORDER_COMPLETED,
            (_, None) => events::ORDER_CREATED,
            _ => events::ORDER_UPDATED,
        };
        if matched.is_empty() && !order.line_items.is_empty() {
            tracing::debug!(
                external_order_id = %order.external_order_id,
                "No supplier assigned to any line item"
            );
        }
        let payload = json!({
            "order": order,
            "previousStatus": previous,
            "suppliers": matched.by_priority(),
            "unmatchedItems": matched.unmatched_items,
        });

        let notifier = &self.inner.notifier;
        let mut delivered = 0;
        for supplier_id in &matched.suppliers {
            delivered += notifier.publish(&Room::Supplier(supplier_id.clone()), event, &payload);
        }
        delivered += notifier.publish(&Room::Operators, event, &payload);
        if let Some(store_id) = &order.store_id {
            delivered += notifier.publish(&Room::Store(store_id.clone()), event, &payload);
        }

        tracing::debug!(
            external_order_id = %order.external_order_id,
            event,
            suppliers = matched.suppliers.len(),
            delivered,
            "Order notification fanned out"
        );
    }
}

fn plan_existing(mut order: Order, request: &TransitionRequest) -> Plan {
    let current = order.status;
    let check = current.check_transition(request.target);
    let event_at = request.event_time();

    let not_applied = |order: Order, outcome: ApplyOutcome, event: Event| Plan {
        outcome,
        order,
        write_order: false,
        event: Some(event),
        previous: Some(current),
    };

    match check {
        TransitionCheck::Unchanged => Plan {
            outcome: ApplyOutcome::Unchanged,
            order,
            write_order: false,
            event: None,
            previous: Some(current),
        },
        // Creation notice arriving after the order already moved on
        TransitionCheck::Backward if request.target == OrderStatus::Created => Plan {
            outcome: ApplyOutcome::Unchanged,
            order,
            write_order: false,
            event: None,
            previous: Some(current),
        },
        // Timestamps from different clocks are not compared
        _ if request.clock() == StatusClock::Provider
            && order.status_clock == StatusClock::Provider
            && event_at < order.status_changed_at =>
        {
            let event = order_event(
                EventType::OrderSyncConflict,
                &order,
                format!("Stale update for order {}", order.external_order_id),
                format!(
                    "{} observed at {event_at} is older than {} set at {}",
                    request.target, current, order.status_changed_at
                ),
                transition_metadata(request, Some(current), &order),
            );
            not_applied(order, ApplyOutcome::Stale, event)
        }
        TransitionCheck::FromTerminal | TransitionCheck::Backward => {
            let why = if check == TransitionCheck::FromTerminal {
                "terminal status is final"
            } else {
                "status cannot move backward"
            };
            let event = order_event(
                EventType::OrderTransitionRejected,
                &order,
                format!("Rejected transition for order {}", order.external_order_id),
                format!("{current} to {} rejected: {why}", request.target),
                transition_metadata(request, Some(current), &order),
            );
            not_applied(order, ApplyOutcome::Rejected, event)
        }
        TransitionCheck::Forward => {
            order.status = request.target;
            order.status_changed_at = event_at;
            order.status_clock = request.clock();
            order.updated_at = now_millis();
            deep_merge(&mut order.metadata, request.metadata.clone());
            if order.order_code.is_none() {
                order.order_code = request.order_code.clone();
            }
            if order.store_id.is_none() {
                order.store_id = request.store_id.clone();
            }
            if order.credential_id.is_none() {
                order.credential_id = request.credential_id.clone();
            }
            if order.line_items.is_empty() {
                order.line_items = request.line_items.clone();
            }

            let description = match (&request.reason, order.status) {
                (Some(reason), OrderStatus::Cancelled) => format!("Cancelled: {reason}"),
                _ => format!("{current} to {}", order.status),
            };
            let event = order_event(
                EventType::for_transition(order.status, false),
                &order,
                format!("Order {} {}", order.external_order_id, order.status),
                description,
                transition_metadata(request, Some(current), &order),
            );
            Plan {
                outcome: ApplyOutcome::Transitioned,
                order,
                write_order: true,
                event: Some(event),
                previous: Some(current),
            }
        }
    }
}

fn transition_metadata(
    request: &TransitionRequest,
    previous: Option<OrderStatus>,
    order: &Order,
) -> Value {
    json!({
        "externalOrderId": order.external_order_id,
        "previousStatus": previous,
        "requestedStatus": request.target,
        "status": order.status,
        "occurredAt": request.occurred_at,
        "reason": request.reason,
        "source": request.source.to_json(),
    })
}

pub(super) fn order_event(
    event_type: EventType,
    order: &Order,
    title: String,
    description: String,
    metadata: Value,
) -> Event {
    Event {
        id: uuid::Uuid::new_v4().to_string(),
        event_type,
        title,
        description,
        related_order_id: Some(order.id.clone()),
        related_store_id: order.store_id.clone(),
        metadata,
        created_at: now_millis(),
    }
}
