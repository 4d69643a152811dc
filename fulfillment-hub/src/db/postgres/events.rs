use async_trait::async_trait;
use serde_json::Value;
use shared::models::{Event, EventType};

use super::PgStore;
use crate::db::{EventStore, StoreError, StoreResult};

#[derive(sqlx::FromRow)]
struct EventRow {
    id: String,
    event_type: String,
    title: String,
    description: String,
    related_order_id: Option<String>,
    related_store_id: Option<String>,
    metadata: Value,
    created_at: i64,
}

impl TryFrom<EventRow> for Event {
    type Error = StoreError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let event_type = EventType::parse(&row.event_type).ok_or_else(|| {
            StoreError::Corrupt(format!("event {} has unknown type {}", row.id, row.event_type))
        })?;
        Ok(Event {
            id: row.id,
            event_type,
            title: row.title,
            description: row.description,
            related_order_id: row.related_order_id,
            related_store_id: row.related_store_id,
            metadata: row.metadata,
            created_at: row.created_at,
        })
    }
}

pub(super) async fn insert_event<'e, E>(executor: E, event: &Event) -> Result<(), sqlx::Error>
where
    E: sqlx::PgExecutor<'e>,
{
    sqlx::query(
        "INSERT INTO events (id, event_type, title, description, related_order_id, \
         related_store_id, metadata, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(&event.id)
    .bind(event.event_type.as_str())
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.related_order_id)
    .bind(&event.related_store_id)
    .bind(&event.metadata)
    .bind(event.created_at)
    .execute(executor)
    .await?;
    Ok(())
}

#[async_trait]
impl EventStore for PgStore {
    async fn append_event(&self, event: &Event) -> StoreResult<()> {
        insert_event(&self.pool, event).await?;
        Ok(())
    }

    async fn events_for_order(&self, order_id: &str) -> StoreResult<Vec<Event>> {
        let rows: Vec<EventRow> = sqlx::query_as(
            "SELECT id, event_type, title, description, related_order_id, related_store_id, \
             metadata, created_at FROM events WHERE related_order_id = $1 ORDER BY created_at, id",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Event::try_from).collect()
    }
}
