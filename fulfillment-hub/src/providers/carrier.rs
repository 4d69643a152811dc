//! Communications-carrier client
//!
//! The carrier authenticates with static account credentials (account id +
//! auth token). "Obtaining a token" verifies the account against
//! `GET /2010-04-01/Accounts/{accountId}.json` and hands the auth token back
//! with a configured lifetime, so carrier credentials go through the same
//! lifecycle and sweep as OAuth ones.

use async_trait::async_trait;
use serde::Deserialize;
use shared::models::Credential;
use std::time::Duration;

use super::{ProviderError, TokenGrant, TokenProvider, http_client};

#[derive(Deserialize)]
struct AccountResponse {
    #[serde(default)]
    status: Option<String>,
}

pub struct CarrierClient {
    http: reqwest::Client,
    base_url: String,
    token_lifetime: Duration,
}

impl CarrierClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        token_lifetime: Duration,
    ) -> Result<Self, ProviderError> {
        Ok(Self {
            http: http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token_lifetime,
        })
    }
}

#[async_trait]
impl TokenProvider for CarrierClient {
    async fn obtain_token(&self, credential: &Credential) -> Result<TokenGrant, ProviderError> {
        let url = format!(
            "{}/2010-04-01/Accounts/{}.json",
            self.base_url, credential.client_id
        );
        let response = self
            .http
            .get(&url)
            .basic_auth(&credential.client_id, Some(&credential.client_secret))
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let account: AccountResponse = response.json().await.map_err(ProviderError::from_reqwest)?;
        if let Some(state) = account.status.as_deref()
            && !state.eq_ignore_ascii_case("active")
        {
            return Err(ProviderError::Rejected {
                status: status.as_u16(),
                message: format!("carrier account is {state}"),
            });
        }

        Ok(TokenGrant {
            access_token: credential.client_secret.clone(),
            refresh_token: None,
            expires_in_secs: self.token_lifetime.as_secs() as i64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use serde_json::json;
    use shared::models::{CredentialStatus, CredentialType};

    fn credential(secret: &str) -> Credential {
        Credential {
            id: "twl-1".into(),
            credential_type: CredentialType::Carrier,
            is_active: true,
            client_id: "AC123".into(),
            client_secret: secret.into(),
            access_token: None,
            refresh_token: None,
            expires_at: None,
            instance_name: "SMS".into(),
            status: CredentialStatus::Ok,
            last_error: None,
            updated_at: 0,
        }
    }

    async fn serve() -> String {
        // "AC123:right" in basic auth
        let app = Router::new().route(
            "/2010-04-01/Accounts/{file}",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                if auth == "Basic QUMxMjM6cmlnaHQ=" {
                    (StatusCode::OK, axum::Json(json!({"sid": "AC123", "status": "active"})))
                } else {
                    (StatusCode::UNAUTHORIZED, axum::Json(json!({"code": 20003})))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn verified_account_yields_configured_lifetime() {
        let client = CarrierClient::new(
            serve().await,
            Duration::from_secs(5),
            Duration::from_secs(86_400),
        )
        .unwrap();
        let grant = client.obtain_token(&credential("right")).await.unwrap();
        assert_eq!(grant.access_token, "right");
        assert_eq!(grant.expires_in_secs, 86_400);
    }

    #[tokio::test]
    async fn wrong_secret_is_rejected() {
        let client =
            CarrierClient::new(serve().await, Duration::from_secs(5), Duration::from_secs(60))
                .unwrap();
        let err = client.obtain_token(&credential("wrong")).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 401, .. }));
    }
}
