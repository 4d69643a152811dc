use async_trait::async_trait;
use shared::models::{Credential, CredentialStatus, CredentialType};
use shared::util::now_millis;

use super::PgStore;
use crate::db::{CredentialStore, StoreError, StoreResult, TokenUpdate};

#[derive(sqlx::FromRow)]
struct CredentialRow {
    id: String,
    credential_type: String,
    is_active: bool,
    client_id: String,
    client_secret: String,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    instance_name: String,
    status: String,
    last_error: Option<String>,
    updated_at: i64,
}

impl TryFrom<CredentialRow> for Credential {
    type Error = StoreError;

    fn try_from(row: CredentialRow) -> Result<Self, Self::Error> {
        let credential_type = CredentialType::parse(&row.credential_type).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "credential {} has unknown type {}",
                row.id, row.credential_type
            ))
        })?;
        Ok(Credential {
            id: row.id,
            credential_type,
            is_active: row.is_active,
            client_id: row.client_id,
            client_secret: row.client_secret,
            access_token: row.access_token,
            refresh_token: row.refresh_token,
            expires_at: row.expires_at,
            instance_name: row.instance_name,
            status: CredentialStatus::parse(&row.status),
            last_error: row.last_error,
            updated_at: row.updated_at,
        })
    }
}

const SELECT_CREDENTIAL: &str = "SELECT id, credential_type, is_active, client_id, client_secret, \
     access_token, refresh_token, expires_at, instance_name, status, last_error, updated_at \
     FROM credentials";

fn ensure_updated(result: sqlx::postgres::PgQueryResult, id: &str) -> StoreResult<()> {
    if result.rows_affected() == 0 {
        return Err(StoreError::NotFound(format!("credential {id}")));
    }
    Ok(())
}

#[async_trait]
impl CredentialStore for PgStore {
    async fn get_credential(&self, id: &str) -> StoreResult<Option<Credential>> {
        let row: Option<CredentialRow> =
            sqlx::query_as(&format!("{SELECT_CREDENTIAL} WHERE id = $1"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(Credential::try_from).transpose()
    }

    async fn list_active_credentials(
        &self,
        credential_type: Option<CredentialType>,
    ) -> StoreResult<Vec<Credential>> {
        let rows: Vec<CredentialRow> = sqlx::query_as(&format!(
            "{SELECT_CREDENTIAL} WHERE is_active AND ($1::TEXT IS NULL OR credential_type = $1) ORDER BY id"
        ))
        .bind(credential_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Credential::try_from).collect()
    }

    async fn save_token(&self, id: &str, update: &TokenUpdate) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE credentials SET access_token = $2, refresh_token = COALESCE($3, refresh_token), \
             expires_at = $4, status = 'OK', last_error = NULL, updated_at = $5 WHERE id = $1",
        )
        .bind(id)
        .bind(&update.access_token)
        .bind(&update.refresh_token)
        .bind(update.expires_at)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        ensure_updated(result, id)
    }

    async fn mark_needs_attention(&self, id: &str, reason: &str) -> StoreResult<()> {
        let result = sqlx::query(
            "UPDATE credentials SET status = 'NEEDS_ATTENTION', last_error = $2, updated_at = $3 WHERE id = $1",
        )
        .bind(id)
        .bind(reason)
        .bind(now_millis())
        .execute(&self.pool)
        .await?;
        ensure_updated(result, id)
    }

    async fn record_refresh_error(&self, id: &str, message: &str) -> StoreResult<()> {
        let result =
            sqlx::query("UPDATE credentials SET last_error = $2, updated_at = $3 WHERE id = $1")
                .bind(id)
                .bind(message)
                .bind(now_millis())
                .execute(&self.pool)
                .await?;
        ensure_updated(result, id)
    }
}
