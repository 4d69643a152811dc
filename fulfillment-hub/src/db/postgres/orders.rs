use async_trait::async_trait;
use serde_json::Value;
use shared::models::{LineItem, Order, OrderStatus, StatusClock};
use shared::util::now_millis;
use sqlx::types::Json;

use super::PgStore;
use super::events::insert_event;
use crate::db::{CommitOutcome, OrderCommit, OrderStore, StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: String,
    external_order_id: String,
    order_code: Option<String>,
    status: String,
    status_changed_at: i64,
    status_clock: String,
    line_items: Json<Vec<LineItem>>,
    metadata: Value,
    store_id: Option<String>,
    credential_id: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl TryFrom<OrderRow> for Order {
    type Error = StoreError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let status = OrderStatus::from_provider(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!("order {} has unknown status {}", row.id, row.status))
        })?;
        let status_clock = StatusClock::parse(&row.status_clock).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "order {} has unknown status clock {}",
                row.id, row.status_clock
            ))
        })?;
        Ok(Order {
            id: row.id,
            external_order_id: row.external_order_id,
            order_code: row.order_code,
            status,
            status_changed_at: row.status_changed_at,
            status_clock,
            line_items: row.line_items.0,
            metadata: row.metadata,
            store_id: row.store_id,
            credential_id: row.credential_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

const ORDER_COLUMNS: &str = "id, external_order_id, order_code, status, status_changed_at, \
     status_clock, line_items, metadata, store_id, credential_id, created_at, updated_at";

#[async_trait]
impl OrderStore for PgStore {
    async fn find_order_by_external_id(
        &self,
        external_order_id: &str,
    ) -> StoreResult<Option<Order>> {
        let row: Option<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE external_order_id = $1"
        ))
        .bind(external_order_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Order::try_from).transpose()
    }

    async fn orders_for_credential(&self, credential_id: &str) -> StoreResult<Vec<Order>> {
        let rows: Vec<OrderRow> = sqlx::query_as(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE credential_id = $1 \
             ORDER BY created_at, external_order_id"
        ))
        .bind(credential_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Order::try_from).collect()
    }

    async fn is_processed(&self, dedupe_key: &str) -> StoreResult<bool> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT dedupe_key FROM processed_order_updates WHERE dedupe_key = $1")
                .bind(dedupe_key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.is_some())
    }

    async fn commit(&self, commit: OrderCommit) -> StoreResult<CommitOutcome> {
        let mut tx = self.pool.begin().await?;

        // Ledger first: a duplicate key aborts before anything else is written
        let inserted = sqlx::query(
            "INSERT INTO processed_order_updates (dedupe_key, processed_at) VALUES ($1, $2) \
             ON CONFLICT (dedupe_key) DO NOTHING",
        )
        .bind(&commit.dedupe_key)
        .bind(now_millis())
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CommitOutcome::Duplicate);
        }

        if let Some(order) = &commit.order {
            sqlx::query(
                r#"
                INSERT INTO orders (
                    id, external_order_id, order_code, status, status_changed_at,
                    status_clock, line_items, metadata, store_id, credential_id,
                    created_at, updated_at
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
                ON CONFLICT (external_order_id)
                DO UPDATE SET order_code = EXCLUDED.order_code,
                              status = EXCLUDED.status,
                              status_changed_at = EXCLUDED.status_changed_at,
                              status_clock = EXCLUDED.status_clock,
                              line_items = EXCLUDED.line_items,
                              metadata = EXCLUDED.metadata,
                              store_id = EXCLUDED.store_id,
                              credential_id = EXCLUDED.credential_id,
                              updated_at = EXCLUDED.updated_at
                "#,
            )
            .bind(&order.id)
            .bind(&order.external_order_id)
            .bind(&order.order_code)
            .bind(order.status.as_str())
            .bind(order.status_changed_at)
            .bind(order.status_clock.as_str())
            .bind(Json(&order.line_items))
            .bind(&order.metadata)
            .bind(&order.store_id)
            .bind(&order.credential_id)
            .bind(order.created_at)
            .bind(order.updated_at)
            .execute(&mut *tx)
            .await?;
        }

        if let Some(event) = &commit.event {
            insert_event(&mut *tx, event).await?;
        }

        tx.commit().await?;
        Ok(CommitOutcome::Applied)
    }
}
