//! Pull-sync: reconcile stored orders against the provider's list

use serde::Serialize;
use serde_json::json;
use shared::models::{CredentialType, Event, EventType, Order};
use shared::util::now_millis;

use super::SyncError;
use super::request::TransitionRequest;
use super::synchronizer::{ApplyOutcome, OrderSynchronizer};

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub credential_id: String,
    /// Every stored order of the credential after reconciliation
    pub orders: Vec<Order>,
    /// Orders in the provider's list
    pub listed: usize,
    pub applied: usize,
    pub unchanged: usize,
    pub rejected: usize,
    pub conflicts: usize,
    /// Listed orders with a missing or unmapped status
    pub skipped: usize,
}

impl OrderSynchronizer {
    /// List the provider's current orders for a DELIVERY credential, run
    /// each through [`OrderSynchronizer::apply`], then report every order
    /// stored for the credential.
    pub async fn sync_orders(&self, credential_id: &str) -> Result<SyncReport, SyncError> {
        let credential = self
            .inner
            .stores
            .credentials
            .get_credential(credential_id)
            .await?
            .ok_or_else(|| SyncError::CredentialNotFound(credential_id.to_string()))?;
        if credential.credential_type != CredentialType::Delivery {
            return Err(SyncError::Validation(format!(
                "credential {credential_id} is {}, order sync needs DELIVERY",
                credential.credential_type
            )));
        }

        let token = self.inner.tokens.get_valid_token(credential_id).await?;
        let orders_api = &self.inner.orders_api;
        let remote_orders = self
            .inner
            .retry
            .run("list_orders", || orders_api.list_orders(&token.access_token))
            .await
            .map_err(|failure| SyncError::Provider(failure.error))?;

        let mut report = SyncReport {
            credential_id: credential_id.to_string(),
            ..SyncReport::default()
        };
        let received_at = now_millis();
        report.listed = remote_orders.len();

        for remote in remote_orders {
            let external_order_id = remote.external_order_id.clone();
            let raw_status = remote.status.clone();
            let Some(request) = TransitionRequest::from_remote(remote, credential_id, received_at)
            else {
                tracing::warn!(
                    external_order_id = %external_order_id,
                    status = ?raw_status,
                    "Skipping listed order with unmapped status"
                );
                report.skipped += 1;
                continue;
            };

            let result = self.apply(request).await?;
            match result.outcome {
                ApplyOutcome::Created | ApplyOutcome::Transitioned => report.applied += 1,
                ApplyOutcome::Unchanged | ApplyOutcome::Duplicate => report.unchanged += 1,
                ApplyOutcome::Rejected => report.rejected += 1,
                ApplyOutcome::Stale => report.conflicts += 1,
            }
        }

        report.orders = self
            .inner
            .stores
            .orders
            .orders_for_credential(credential_id)
            .await?;

        tracing::info!(
            credential_id,
            listed = report.listed,
            stored = report.orders.len(),
            applied = report.applied,
            rejected = report.rejected,
            conflicts = report.conflicts,
            skipped = report.skipped,
            "Order sync finished"
        );

        let summary = Event {
            id: uuid::Uuid::new_v4().to_string(),
            event_type: EventType::OrdersSynced,
            title: format!("Orders synced for {}", credential.instance_name),
            description: format!(
                "{} applied, {} unchanged, {} rejected, {} conflicts, {} skipped",
                report.applied, report.unchanged, report.rejected, report.conflicts, report.skipped
            ),
            related_order_id: None,
            related_store_id: None,
            metadata: json!({
                "credentialId": credential_id,
                "applied": report.applied,
                "unchanged": report.unchanged,
                "rejected": report.rejected,
                "conflicts": report.conflicts,
                "skipped": report.skipped,
            }),
            created_at: now_millis(),
        };
        if let Err(e) = self.inner.stores.events.append_event(&summary).await {
            tracing::warn!(error = %e, "Failed to record sync summary event");
        }

        Ok(report)
    }
}
