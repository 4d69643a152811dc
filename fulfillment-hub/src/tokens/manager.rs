use dashmap::DashMap;
use serde::Serialize;
use serde_json::{Value, json};
use shared::models::{Credential, CredentialStatus, CredentialType, Event, EventType};
use shared::util::{mask_token, now_millis};
use std::sync::Arc;
use std::time::Duration;

use super::TokenError;
use super::retry::{RetryFailure, RetryPolicy};
use crate::core::KeyedLocks;
use crate::db::{CredentialStore, EventStore, Stores, TokenUpdate};
use crate::providers::{ProviderError, TokenGrant, TokenProviders};

#[derive(Debug, Clone, Copy)]
pub struct TokenSettings {
    /// A token closer than this to expiry is never handed out
    pub safety_margin: Duration,
    /// The sweep refreshes tokens expiring within this window
    pub sweep_lead: Duration,
    pub retry: RetryPolicy,
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            safety_margin: Duration::from_secs(60),
            sweep_lead: Duration::from_secs(60 + 300),
            retry: RetryPolicy::default(),
        }
    }
}

/// A usable access token
#[derive(Debug, Clone, PartialEq)]
pub struct IssuedToken {
    pub credential_id: String,
    pub credential_type: CredentialType,
    pub access_token: String,
    /// Epoch millis
    pub expires_at: i64,
    pub instance_name: String,
}

impl IssuedToken {
    fn from_credential(credential: &Credential) -> Option<Self> {
        Some(Self {
            credential_id: credential.id.clone(),
            credential_type: credential.credential_type,
            access_token: credential.access_token.clone()?,
            expires_at: credential.expires_at?,
            instance_name: credential.instance_name.clone(),
        })
    }

    /// Token prefix safe for logs and responses
    pub fn masked(&self) -> String {
        mask_token(&self.access_token)
    }
}

/// Read-only view of a credential's token state
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub credential_id: String,
    pub credential_type: CredentialType,
    pub instance_name: String,
    pub is_active: bool,
    pub is_valid: bool,
    pub expires_at: Option<i64>,
    pub seconds_until_expiry: Option<i64>,
    pub needs_refresh: bool,
    pub status: CredentialStatus,
    pub last_error: Option<String>,
}

/// Token lifecycle manager, cheap to clone
#[derive(Clone)]
pub struct TokenManager {
    pub(super) inner: Arc<Inner>,
}

pub(super) struct Inner {
    pub(super) credentials: Arc<dyn CredentialStore>,
    events: Arc<dyn EventStore>,
    providers: TokenProviders,
    cache: DashMap<String, IssuedToken>,
    pub(super) locks: KeyedLocks,
    pub(super) settings: TokenSettings,
}

impl TokenManager {
    pub fn new(stores: &Stores, providers: TokenProviders, settings: TokenSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                credentials: stores.credentials.clone(),
                events: stores.events.clone(),
                providers,
                cache: DashMap::new(),
                locks: KeyedLocks::new(),
                settings,
            }),
        }
    }

    pub fn settings(&self) -> &TokenSettings {
        &self.inner.settings
    }

    /// Drop idle per-credential locks
    pub fn prune_locks(&self) -> usize {
        self.inner.locks.prune()
    }

    fn margin_ms(&self) -> i64 {
        self.inner.settings.safety_margin.as_millis() as i64
    }

    fn cached_valid(&self, credential_id: &str) -> Option<IssuedToken> {
        let entry = self.inner.cache.get(credential_id)?;
        (entry.expires_at - now_millis() > self.margin_ms()).then(|| entry.clone())
    }

    /// Valid token for a credential, refreshing it when needed.
    ///
    /// Concurrent callers for one credential share a single provider call.
    pub async fn get_valid_token(&self, credential_id: &str) -> Result<IssuedToken, TokenError> {
        // A deactivated credential must stop serving its cached token
        self.load_active(credential_id).await?;
        if let Some(token) = self.cached_valid(credential_id) {
            return Ok(token);
        }

        let _guard = self.inner.locks.lock(credential_id).await;
        // Filled by whoever held the lock before us
        if let Some(token) = self.cached_valid(credential_id) {
            return Ok(token);
        }

        let credential = self.load_active(credential_id).await?;
        if credential.has_valid_token(now_millis(), self.margin_ms())
            && let Some(token) = IssuedToken::from_credential(&credential)
        {
            self.inner
                .cache
                .insert(credential.id.clone(), token.clone());
            return Ok(token);
        }

        if credential.needs_attention() {
            return Err(TokenError::RefreshRejected {
                credential_id: credential.id.clone(),
                message: credential
                    .last_error
                    .unwrap_or_else(|| "credential needs operator attention".to_string()),
            });
        }

        self.refresh_locked(&credential).await
    }

    /// Valid token from the first usable active credential of a type
    pub async fn get_valid_token_for_type(
        &self,
        credential_type: CredentialType,
    ) -> Result<IssuedToken, TokenError> {
        let candidates = self
            .inner
            .credentials
            .list_active_credentials(Some(credential_type))
            .await?;
        let credential = candidates
            .into_iter()
            .find(|c| !c.needs_attention())
            .ok_or_else(|| {
                TokenError::NoActiveCredential(format!("no usable {credential_type} credential"))
            })?;
        self.get_valid_token(&credential.id).await
    }

    /// Refresh regardless of the current token. Clears NEEDS_ATTENTION on success.
    pub async fn force_refresh(&self, credential_id: &str) -> Result<IssuedToken, TokenError> {
        let _guard = self.inner.locks.lock(credential_id).await;
        let credential = self.load_active(credential_id).await?;
        self.refresh_locked(&credential).await
    }

    pub async fn token_status(&self, credential_id: &str) -> Result<TokenStatus, TokenError> {
        let credential = self
            .inner
            .credentials
            .get_credential(credential_id)
            .await?
            .ok_or_else(|| TokenError::NotFound(credential_id.to_string()))?;

        let now = now_millis();
        let is_valid = credential.has_valid_token(now, self.margin_ms());
        let lead_ms = self.inner.settings.sweep_lead.as_millis() as i64;
        Ok(TokenStatus {
            seconds_until_expiry: credential.millis_until_expiry(now).map(|ms| ms / 1000),
            needs_refresh: !credential.has_valid_token(now, lead_ms),
            is_valid,
            credential_id: credential.id,
            credential_type: credential.credential_type,
            instance_name: credential.instance_name,
            is_active: credential.is_active,
            expires_at: credential.expires_at,
            status: credential.status,
            last_error: credential.last_error,
        })
    }

    /// Load a credential that is still active. Evicts the cached token otherwise.
    pub(super) async fn load_active(&self, credential_id: &str) -> Result<Credential, TokenError> {
        let result = match self.inner.credentials.get_credential(credential_id).await? {
            None => Err(TokenError::NotFound(credential_id.to_string())),
            Some(c) if !c.is_active => Err(TokenError::NoActiveCredential(format!(
                "credential {credential_id} is inactive"
            ))),
            Some(c) => Ok(c),
        };
        if result.is_err() && self.inner.cache.remove(credential_id).is_some() {
            tracing::info!(credential_id, "Evicted cached token of unusable credential");
        }
        result
    }

    /// Call the provider and persist the outcome. Caller holds the credential lock.
    pub(super) async fn refresh_locked(
        &self,
        credential: &Credential,
    ) -> Result<IssuedToken, TokenError> {
        let provider = self.inner.providers.for_type(credential.credential_type);
        let margin_ms = self.margin_ms();

        let result = self
            .inner
            .settings
            .retry
            .run("token_refresh", || async move {
                let grant = provider.obtain_token(credential).await?;
                if grant.expires_in_secs.saturating_mul(1000) <= margin_ms {
                    return Err(ProviderError::Transient(format!(
                        "granted lifetime of {}s is inside the safety margin",
                        grant.expires_in_secs
                    )));
                }
                Ok(grant)
            })
            .await;

        match result {
            Ok(grant) => self.store_grant(credential, grant).await,
            Err(RetryFailure {
                error: ProviderError::Rejected { status, message },
                ..
            }) => {
                self.inner.cache.remove(&credential.id);
                let reason = format!("provider rejected credential ({status}): {message}");
                self.inner
                    .credentials
                    .mark_needs_attention(&credential.id, &reason)
                    .await?;
                tracing::error!(
                    credential_id = %credential.id,
                    instance = %credential.instance_name,
                    status,
                    "Credential rejected, marked NEEDS_ATTENTION"
                );
                self.record_event(
                    EventType::CredentialRejected,
                    credential,
                    format!("Credential {} rejected", credential.instance_name),
                    reason.clone(),
                    json!({ "httpStatus": status }),
                )
                .await;
                Err(TokenError::RefreshRejected {
                    credential_id: credential.id.clone(),
                    message: reason,
                })
            }
            Err(RetryFailure { error, attempts }) => {
                let message = error.to_string();
                if let Err(e) = self
                    .inner
                    .credentials
                    .record_refresh_error(&credential.id, &message)
                    .await
                {
                    tracing::warn!(credential_id = %credential.id, error = %e, "Failed to record refresh error");
                }
                tracing::error!(
                    credential_id = %credential.id,
                    attempts,
                    "Token refresh failed: {message}"
                );
                self.record_event(
                    EventType::CredentialRefreshFailed,
                    credential,
                    format!("Token refresh failed for {}", credential.instance_name),
                    message.clone(),
                    json!({ "attempts": attempts }),
                )
                .await;
                let credential_id = credential.id.clone();
                Err(match error {
                    ProviderError::Unreachable(_) => TokenError::ProviderUnreachable {
                        credential_id,
                        message,
                    },
                    _ => TokenError::RefreshTransientFailure {
                        credential_id,
                        attempts,
                        message,
                    },
                })
            }
        }
    }

    async fn store_grant(
        &self,
        credential: &Credential,
        grant: TokenGrant,
    ) -> Result<IssuedToken, TokenError> {
        let expires_at = now_millis().saturating_add(grant.expires_in_secs.saturating_mul(1000));
        let update = TokenUpdate {
            access_token: grant.access_token.clone(),
            refresh_token: grant.refresh_token,
            expires_at,
        };
        self.inner
            .credentials
            .save_token(&credential.id, &update)
            .await?;

        let token = IssuedToken {
            credential_id: credential.id.clone(),
            credential_type: credential.credential_type,
            access_token: grant.access_token,
            expires_at,
            instance_name: credential.instance_name.clone(),
        };
        self.inner
            .cache
            .insert(credential.id.clone(), token.clone());

        tracing::info!(
            credential_id = %credential.id,
            instance = %credential.instance_name,
            token = %token.masked(),
            expires_at,
            "Token refreshed"
        );
        self.record_event(
            EventType::CredentialRefreshed,
            credential,
            format!("Token refreshed for {}", credential.instance_name),
            format!("New token valid for {}s", grant.expires_in_secs),
            json!({ "expiresAt": expires_at }),
        )
        .await;
        Ok(token)
    }

    async fn record_event(
        &self,
        event_type: EventType,
        credential: &Credential,
        title: String,
        description: String,
        extra: Value,
    ) {
        let mut metadata = json!({
            "credentialId": credential.id,
            "credentialType": credential.credential_type,
        });
        if let (Some(target), Value::Object(extra)) = (metadata.as_object_mut(), extra) {
            target.extend(extra);
        }
        let event = Event {
            id: uuid::Uuid::new_v4().to_string(),
            event_type,
            title,
            description,
            related_order_id: None,
            related_store_id: None,
            metadata,
            created_at: now_millis(),
        };
        if let Err(e) = self.inner.events.append_event(&event).await {
            tracing::warn!(event = %event_type, error = %e, "Failed to record credential event");
        }
    }
}

#[cfg(test)]
pub(super) mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::providers::TokenProvider;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    pub(crate) struct FakeProvider {
        pub calls: AtomicUsize,
        delay: Duration,
        script: Mutex<VecDeque<Result<TokenGrant, ProviderError>>>,
    }

    impl FakeProvider {
        pub fn new(delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                delay,
                script: Mutex::new(VecDeque::new()),
            })
        }

        pub fn push(&self, outcome: Result<TokenGrant, ProviderError>) {
            self.script.lock().unwrap().push_back(outcome);
        }

        pub fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl TokenProvider for FakeProvider {
        async fn obtain_token(&self, _: &Credential) -> Result<TokenGrant, ProviderError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            tokio::time::sleep(self.delay).await;
            let scripted = self.script.lock().unwrap().pop_front();
            scripted.unwrap_or_else(|| {
                Ok(TokenGrant {
                    access_token: format!("fresh-token-{n}"),
                    refresh_token: Some(format!("refresh-{n}")),
                    expires_in_secs: 3600,
                })
            })
        }
    }

    pub(crate) fn credential(id: &str, token: Option<&str>, expires_in_ms: Option<i64>) -> Credential {
        Credential {
            id: id.to_string(),
            credential_type: CredentialType::Delivery,
            is_active: true,
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            access_token: token.map(str::to_string),
            refresh_token: Some("refresh-0".to_string()),
            expires_at: expires_in_ms.map(|ms| now_millis() + ms),
            instance_name: format!("store {id}"),
            status: CredentialStatus::Ok,
            last_error: None,
            updated_at: now_millis(),
        }
    }

    pub(crate) fn fast_settings() -> TokenSettings {
        TokenSettings {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                multiplier: 2,
            },
            ..TokenSettings::default()
        }
    }

    pub(crate) fn manager(store: &Arc<MemoryStore>, provider: &Arc<FakeProvider>) -> TokenManager {
        let providers = TokenProviders {
            delivery: provider.clone(),
            carrier: provider.clone(),
        };
        TokenManager::new(
            &Stores::from_backend(store.clone()),
            providers,
            fast_settings(),
        )
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_refresh() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::from_millis(50));
        let tokens = manager(&store, &provider);

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let tokens = tokens.clone();
                tokio::spawn(async move { tokens.get_valid_token("c1").await })
            })
            .collect();

        let mut issued = Vec::new();
        for handle in handles {
            issued.push(handle.await.unwrap().unwrap().access_token);
        }
        assert_eq!(provider.calls(), 1);
        assert!(issued.iter().all(|t| t == "fresh-token-1"));
    }

    #[tokio::test]
    async fn token_inside_margin_is_refreshed() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", Some("old"), Some(30_000)));
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        let before = now_millis();
        let token = tokens.get_valid_token("c1").await.unwrap();
        assert_eq!(token.access_token, "fresh-token-1");
        assert!(token.expires_at - before >= 3600 * 1000 - 1000);

        let stored = store.credential("c1").unwrap();
        assert_eq!(stored.access_token.as_deref(), Some("fresh-token-1"));
        assert_eq!(stored.refresh_token.as_deref(), Some("refresh-1"));
        assert!(
            store
                .events()
                .iter()
                .any(|e| e.event_type == EventType::CredentialRefreshed)
        );
    }

    #[tokio::test]
    async fn stored_valid_token_needs_no_provider_call() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", Some("still-good"), Some(3_600_000)));
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        let token = tokens.get_valid_token("c1").await.unwrap();
        assert_eq!(token.access_token, "still-good");
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn rejection_marks_needs_attention_and_stops_calls() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::ZERO);
        provider.push(Err(ProviderError::Rejected {
            status: 401,
            message: "invalid_client".to_string(),
        }));
        let tokens = manager(&store, &provider);

        let err = tokens.get_valid_token("c1").await.unwrap_err();
        assert!(matches!(err, TokenError::RefreshRejected { .. }));
        assert_eq!(provider.calls(), 1);

        let stored = store.credential("c1").unwrap();
        assert!(stored.needs_attention());
        assert!(stored.last_error.unwrap().contains("invalid_client"));
        assert!(
            store
                .events()
                .iter()
                .any(|e| e.event_type == EventType::CredentialRejected)
        );

        let again = tokens.get_valid_token("c1").await.unwrap_err();
        assert!(matches!(again, TokenError::RefreshRejected { .. }));
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn transient_failures_use_every_attempt() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::ZERO);
        for _ in 0..3 {
            provider.push(Err(ProviderError::Transient("HTTP 503".to_string())));
        }
        let tokens = manager(&store, &provider);

        let err = tokens.get_valid_token("c1").await.unwrap_err();
        assert!(matches!(
            err,
            TokenError::RefreshTransientFailure { attempts: 3, .. }
        ));
        assert_eq!(provider.calls(), 3);

        let stored = store.credential("c1").unwrap();
        assert!(!stored.needs_attention());
        assert!(stored.last_error.is_some());
        assert!(
            store
                .events()
                .iter()
                .any(|e| e.event_type == EventType::CredentialRefreshFailed)
        );
    }

    #[tokio::test]
    async fn transient_then_success_recovers() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::ZERO);
        provider.push(Err(ProviderError::Unreachable("connection refused".to_string())));
        let tokens = manager(&store, &provider);

        let token = tokens.get_valid_token("c1").await.unwrap();
        assert_eq!(token.access_token, "fresh-token-2");
        assert_eq!(provider.calls(), 2);
    }

    #[tokio::test]
    async fn short_grant_is_not_accepted() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::ZERO);
        for _ in 0..3 {
            provider.push(Ok(TokenGrant {
                access_token: "short".to_string(),
                refresh_token: None,
                expires_in_secs: 30,
            }));
        }
        let tokens = manager(&store, &provider);

        let err = tokens.get_valid_token("c1").await.unwrap_err();
        assert!(matches!(err, TokenError::RefreshTransientFailure { .. }));
    }

    #[tokio::test]
    async fn missing_and_inactive_credentials() {
        let store = Arc::new(MemoryStore::new());
        let mut inactive = credential("off", Some("tok"), Some(3_600_000));
        inactive.is_active = false;
        store.insert_credential(inactive);
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        assert!(matches!(
            tokens.get_valid_token("nope").await,
            Err(TokenError::NotFound(_))
        ));
        assert!(matches!(
            tokens.get_valid_token("off").await,
            Err(TokenError::NoActiveCredential(_))
        ));
        assert!(matches!(
            tokens.get_valid_token_for_type(CredentialType::Carrier).await,
            Err(TokenError::NoActiveCredential(_))
        ));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn force_refresh_clears_attention() {
        let store = Arc::new(MemoryStore::new());
        let mut flagged = credential("c1", Some("tok"), Some(3_600_000));
        flagged.status = CredentialStatus::NeedsAttention;
        flagged.last_error = Some("rotated secret".to_string());
        store.insert_credential(flagged);
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        let token = tokens.force_refresh("c1").await.unwrap();
        assert_eq!(token.access_token, "fresh-token-1");
        let stored = store.credential("c1").unwrap();
        assert!(!stored.needs_attention());
        assert!(stored.last_error.is_none());
    }

    #[tokio::test]
    async fn status_reports_without_provider_call() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", Some("tok"), Some(120_000)));
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        let status = tokens.token_status("c1").await.unwrap();
        assert!(status.is_valid);
        assert!(status.needs_refresh);
        assert!(status.seconds_until_expiry.unwrap() > 100);
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn status_inside_margin_is_not_valid() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", Some("tok"), Some(30_000)));
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);

        let status = tokens.token_status("c1").await.unwrap();
        assert!(!status.is_valid);
        assert!(status.needs_refresh);
    }

    #[tokio::test]
    async fn deactivated_credential_stops_serving_cached_token() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::ZERO);
        let tokens = manager(&store, &provider);
        tokens.get_valid_token("c1").await.unwrap();

        let mut revoked = store.credential("c1").unwrap();
        revoked.is_active = false;
        store.insert_credential(revoked);

        assert!(matches!(
            tokens.get_valid_token("c1").await,
            Err(TokenError::NoActiveCredential(_))
        ));
        assert!(tokens.inner.cache.get("c1").is_none());
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn huge_grant_lifetime_saturates() {
        let store = Arc::new(MemoryStore::new());
        store.insert_credential(credential("c1", None, None));
        let provider = FakeProvider::new(Duration::ZERO);
        provider.push(Ok(TokenGrant {
            access_token: "forever".to_string(),
            refresh_token: None,
            expires_in_secs: i64::MAX,
        }));
        let tokens = manager(&store, &provider);

        let token = tokens.get_valid_token("c1").await.unwrap();
        assert_eq!(token.access_token, "forever");
        assert_eq!(token.expires_at, i64::MAX);
    }
}
