//! In-memory store for development and tests

use async_trait::async_trait;
use shared::models::{
    Credential, CredentialStatus, CredentialType, Event, Order, SupplierAssignment,
};
use shared::util::now_millis;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{
    AssignmentStore, CommitOutcome, CredentialStore, EventStore, OrderCommit, OrderStore,
    StoreError, StoreResult, TokenUpdate,
};

#[derive(Default)]
struct Inner {
    credentials: BTreeMap<String, Credential>,
    /// external_order_id → order
    orders: HashMap<String, Order>,
    processed: HashSet<String>,
    events: Vec<Event>,
    assignments: Vec<SupplierAssignment>,
}

/// Process-local store. One lock scope per operation gives `commit` its atomicity.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn insert_credential(&self, credential: Credential) {
        self.write()
            .credentials
            .insert(credential.id.clone(), credential);
    }

    pub fn insert_assignment(&self, assignment: SupplierAssignment) {
        self.write().assignments.push(assignment);
    }

    pub fn insert_order(&self, order: Order) {
        self.write()
            .orders
            .insert(order.external_order_id.clone(), order);
    }

    pub fn credential(&self, id: &str) -> Option<Credential> {
        self.read().credentials.get(id).cloned()
    }

    pub fn order(&self, external_order_id: &str) -> Option<Order> {
        self.read().orders.get(external_order_id).cloned()
    }

    pub fn order_count(&self) -> usize {
        self.read().orders.len()
    }

    pub fn events(&self) -> Vec<Event> {
        self.read().events.clone()
    }

    fn with_credential<F>(&self, id: &str, f: F) -> StoreResult<()>
    where
        F: FnOnce(&mut Credential),
    {
        let mut inner = self.write();
        let credential = inner
            .credentials
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("credential {id}")))?;
        f(credential);
        credential.updated_at = now_millis();
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn get_credential(&self, id: &str) -> StoreResult<Option<Credential>> {
        Ok(self.credential(id))
    }

    async fn list_active_credentials(
        &self,
        credential_type: Option<CredentialType>,
    ) -> StoreResult<Vec<Credential>> {
        Ok(self
            .read()
            .credentials
            .values()
            .filter(|c| c.is_active)
            .filter(|c| credential_type.is_none_or(|t| c.credential_type == t))
            .cloned()
            .collect())
    }

    async fn save_token(&self, id: &str, update: &TokenUpdate) -> StoreResult<()> {
        self.with_credential(id, |c| {
            c.access_token = Some(update.access_token.clone());
            if let Some(refresh) = &update.refresh_token {
                c.refresh_token = Some(refresh.clone());
            }
            c.expires_at = Some(update.expires_at);
            c.status = CredentialStatus::Ok;
            c.last_error = None;
        })
    }

    async fn mark_needs_attention(&self, id: &str, reason: &str) -> StoreResult<()> {
        self.with_credential(id, |c| {
            c.status = CredentialStatus::NeedsAttention;
            c.last_error = Some(reason.to_string());
        })
    }

    async fn record_refresh_error(&self, id: &str, message: &str) -> StoreResult<()> {
        self.with_credential(id, |c| c.last_error = Some(message.to_string()))
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn find_order_by_external_id(
        &self,
        external_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        Ok(self.order(external_order_id))
    }

    async fn orders_for_credential(&self, credential_id: &str) -> StoreResult<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .read()
            .orders
            .values()
            .filter(|o| o.credential_id.as_deref() == Some(credential_id))
            .cloned()
            .collect();
        orders.sort_by(|a, b| {
            (a.created_at, &a.external_order_id).cmp(&(b.created_at, &b.external_order_id))
        });
        Ok(orders)
    }

    async fn is_processed(&self, dedupe_key: &str) -> StoreResult<bool> {
        Ok(self.read().processed.contains(dedupe_key))
    }

    async fn commit(&self, commit: OrderCommit) -> StoreResult<CommitOutcome> {
        let mut inner = self.write();
        if !inner.processed.insert(commit.dedupe_key) {
            return Ok(CommitOutcome::Duplicate);
        }
        if let Some(order) = commit.order {
            inner.orders.insert(order.external_order_id.clone(), order);
        }
        if let Some(event) = commit.event {
            inner.events.push(event);
        }
        Ok(CommitOutcome::Applied)
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append_event(&self, event: &Event) -> StoreResult<()> {
        self.write().events.push(event.clone());
        Ok(())
    }

    async fn events_for_order(&self, order_id: &str) -> StoreResult<Vec<Event>> {
        Ok(self
            .read()
            .events
            .iter()
            .filter(|e| e.related_order_id.as_deref() == Some(order_id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl AssignmentStore for MemoryStore {
    async fn active_assignments(&self) -> StoreResult<Vec<SupplierAssignment>> {
        Ok(self
            .read()
            .assignments
            .iter()
            .filter(|a| a.is_active)
            .cloned()
            .collect())
    }
}
