//! Periodic refresh of tokens that are about to expire

use futures::future::join_all;
use serde::Serialize;
use shared::models::{Credential, CredentialType};
use shared::util::now_millis;
use std::time::Duration;

use super::{TokenError, TokenManager};

/// Outcome of one credential in a sweep
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub credential_id: String,
    pub credential_type: CredentialType,
    pub instance_name: String,
    pub success: bool,
    pub refreshed: bool,
    pub message: String,
    pub expires_at: Option<i64>,
}

impl RefreshReport {
    fn new(credential: &Credential, success: bool, refreshed: bool, message: String) -> Self {
        Self {
            credential_id: credential.id.clone(),
            credential_type: credential.credential_type,
            instance_name: credential.instance_name.clone(),
            success,
            refreshed,
            message,
            expires_at: credential.expires_at,
        }
    }
}

impl TokenManager {
    /// Sweep with the configured lead time
    pub async fn sweep(&self) -> Result<Vec<RefreshReport>, TokenError> {
        self.sweep_within(self.inner.settings.sweep_lead).await
    }

    /// Refresh every active credential whose token expires within `lead`.
    ///
    /// Takes the same per-credential lock as [`TokenManager::get_valid_token`],
    /// so a sweep racing an on-demand refresh still makes one provider call.
    pub async fn sweep_within(&self, lead: Duration) -> Result<Vec<RefreshReport>, TokenError> {
        let credentials = self.inner.credentials.list_active_credentials(None).await?;
        let lead_ms = lead.as_millis() as i64;

        let reports = join_all(
            credentials
                .into_iter()
                .map(|credential| self.sweep_one(credential, lead_ms)),
        )
        .await;

        let refreshed = reports.iter().filter(|r| r.refreshed).count();
        let failed = reports.iter().filter(|r| !r.success).count();
        tracing::info!(
            checked = reports.len(),
            refreshed,
            failed,
            "Token sweep finished"
        );
        Ok(reports)
    }

    async fn sweep_one(&self, credential: Credential, lead_ms: i64) -> RefreshReport {
        if credential.needs_attention() {
            let reason = credential
                .last_error
                .clone()
                .unwrap_or_else(|| "needs operator attention".to_string());
            return RefreshReport::new(&credential, false, false, format!("skipped: {reason}"));
        }

        let _guard = self.inner.locks.lock(&credential.id).await;
        // Re-read: an on-demand refresh may have finished while we waited
        let current = match self.load_active(&credential.id).await {
            Ok(current) => current,
            Err(e) => return RefreshReport::new(&credential, false, false, e.to_string()),
        };

        if current.has_valid_token(now_millis(), lead_ms) {
            return RefreshReport::new(&current, true, false, "token still valid".to_string());
        }

        match self.refresh_locked(&current).await {
            Ok(token) => {
                let mut report = RefreshReport::new(&current, true, true, "token refreshed".into());
                report.expires_at = Some(token.expires_at);
                report
            }
            Err(e) => RefreshReport::new(&current, false, false, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::tokens::manager::tests::{FakeProvider, credential, manager};
    use shared::models::CredentialStatus;
    use std::sync::Arc;

    #[tokio::test]
    async fn refreshes_only_tokens_near_expiry() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("fresh", Some("a"), Some(2 * 3_600_000)));
        store.insert_credential(credential("expiring", Some("b"), Some(5 * 60_000)));
        let mut flagged = credential("flagged", Some("c"), Some(1_000));
        flagged.status = CredentialStatus::NeedsAttention;
        store.insert_credential(flagged);
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        let reports = tokens.sweep_within(Duration::from_secs(600)).await.unwrap();
        assert_eq!(reports.len(), 3);
        assert_eq!(provider.calls(), 1);

        let by_id = |id: &str| reports.iter().find(|r| r.credential_id == id).unwrap();
        assert!(by_id("fresh").success && !by_id("fresh").refreshed);
        assert!(by_id("expiring").refreshed);
        assert!(!by_id("flagged").success);
        assert_eq!(
            store.credential("expiring").unwrap().access_token.as_deref(),
            Some("fresh-token-1")
        );
    }

    #[tokio::test]
    async fn sweep_and_on_demand_refresh_share_the_lock() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", Some("old"), Some(10_000)));
        let provider = FakeProvider::new(Duration::from_millis(50));
        let tokens = manager(&store, &provider);

        let sweeper = tokens.clone();
        let sweep = tokio::spawn(async move { sweeper.sweep_within(Duration::from_secs(600)).await });
        let caller = tokens.clone();
        let demand = tokio::spawn(async move { caller.get_valid_token("c1").await });

        let reports = sweep.await.unwrap().unwrap();
        let token = demand.await.unwrap().unwrap();
        assert_eq!(provider.calls(), 1);
        assert_eq!(token.access_token, "fresh-token-1");
        assert!(reports[0].success);
    }
}
