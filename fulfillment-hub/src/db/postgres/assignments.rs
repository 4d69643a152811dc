use async_trait::async_trait;
use shared::models::{AssignmentTarget, SupplierAssignment};

use super::PgStore;
use crate::db::{AssignmentStore, StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct AssignmentRow {
    supplier_id: String,
    target_kind: String,
    target: String,
    is_active: bool,
    priority: i32,
}

impl TryFrom<AssignmentRow> for SupplierAssignment {
    type Error = StoreError;

    fn try_from(row: AssignmentRow) -> Result<Self, Self::Error> {
        let target = match row.target_kind.as_str() {
            "sku" => AssignmentTarget::Sku(row.target),
            "category" => AssignmentTarget::Category(row.target),
            other => {
                return Err(StoreError::Corrupt(format!(
                    "assignment for supplier {} has unknown kind {other}",
                    row.supplier_id
                )));
            }
        };
        Ok(SupplierAssignment {
            supplier_id: row.supplier_id,
            target,
            is_active: row.is_active,
            priority: row.priority,
        })
    }
}

#[async_trait]
impl AssignmentStore for PgStore {
    async fn active_assignments(&self) -> StoreResult<Vec<SupplierAssignment>> {
        let rows: Vec<AssignmentRow> = sqlx::query_as(
            "SELECT supplier_id, target_kind, target, is_active, priority \
             FROM supplier_assignments WHERE is_active ORDER BY priority, supplier_id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(SupplierAssignment::try_from).collect()
    }
}
