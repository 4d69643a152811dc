//! Delivery-fulfillment provider client
//!
//! - `POST /oauth/token` (refresh-token grant, client-credentials fallback)
//! - `GET /v2/laas/parcels` and `GET /v2/laas/parcels/{trackingNumber}`

use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use shared::models::{Credential, LineItem};
use shared::util::{de_opt_string_or_number, parse_timestamp_millis};
use std::time::Duration;

use super::{OrderProvider, ProviderError, RemoteOrder, TokenGrant, TokenProvider, http_client};

#[derive(Serialize)]
#[serde(tag = "grantType", rename_all = "snake_case")]
enum TokenRequest<'a> {
    #[serde(rename_all = "camelCase")]
    RefreshToken { refresh_token: &'a str },
    #[serde(rename_all = "camelCase")]
    ClientCredentials {
        client_id: &'a str,
        client_secret: &'a str,
    },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ParcelStatus {
    #[serde(default)]
    state: Option<String>,
    #[serde(default, alias = "createdAt", deserialize_with = "de_opt_string_or_number")]
    updated_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PackageDetails {
    #[serde(default)]
    products: Vec<LineItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Parcel {
    #[serde(deserialize_with = "de_opt_string_or_number", default)]
    tracking_number: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    order_code: Option<String>,
    #[serde(default, deserialize_with = "de_opt_string_or_number")]
    partner_id: Option<String>,
    #[serde(default)]
    status: Option<ParcelStatus>,
    #[serde(default)]
    package_details: Option<PackageDetails>,
    #[serde(default)]
    address: Value,
    #[serde(default)]
    pickup_details: Value,
    #[serde(default)]
    contact: Value,
    #[serde(default)]
    price: Value,
}

impl Parcel {
    fn into_remote(self) -> Option<RemoteOrder> {
        let external_order_id = self.tracking_number.filter(|t| !t.trim().is_empty())?;
        let status = self.status.unwrap_or_default();
        let details = json!({
            "address": self.address,
            "pickupDetails": self.pickup_details,
            "contact": self.contact,
            "price": self.price,
        });
        Some(RemoteOrder {
            external_order_id,
            order_code: self.order_code,
            status_at: status.updated_at.as_deref().and_then(parse_timestamp_millis),
            status: status.state,
            store_id: self.partner_id,
            line_items: self.package_details.map(|p| p.products).unwrap_or_default(),
            details,
        })
    }
}

/// The list endpoint answers either a bare array or an envelope
#[derive(Deserialize)]
#[serde(untagged)]
enum ParcelList {
    Bare(Vec<Parcel>),
    Envelope {
        #[serde(alias = "data", alias = "items")]
        parcels: Vec<Parcel>,
    },
}

const PARCELS_PATH: [&str; 3] = ["v2", "laas", "parcels"];

pub struct DeliveryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl DeliveryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let raw = base_url.into();
        let base_url = Url::parse(&raw)
            .map_err(|e| ProviderError::Unreachable(format!("invalid base URL {raw}: {e}")))?;
        Ok(Self {
            http: http_client(timeout)?,
            base_url,
        })
    }

    /// Base URL plus path segments, each percent-encoded as a single segment
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| {
                ProviderError::Unreachable(format!("base URL {} cannot carry a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request_token(&self, body: &TokenRequest<'_>) -> Result<TokenGrant, ProviderError> {
        let url = self.endpoint(&["oauth", "token"])?;
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }

        let token: TokenResponse = response.json().await.map_err(ProviderError::from_reqwest)?;
        if token.access_token.is_empty() {
            return Err(ProviderError::Transient(
                "token response without access token".into(),
            ));
        }
        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_in_secs: token.expires_in,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        segments: &[&str],
        access_token: &str,
    ) -> Result<T, ProviderError> {
        let url = self.endpoint(segments)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(ProviderError::from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, &body));
        }
        response.json().await.map_err(ProviderError::from_reqwest)
    }
}

#[async_trait]
impl TokenProvider for DeliveryClient {
    async fn obtain_token(&self, credential: &Credential) -> Result<TokenGrant, ProviderError> {
        let client_credentials = TokenRequest::ClientCredentials {
            client_id: &credential.client_id,
            client_secret: &credential.client_secret,
        };

        let Some(refresh_token) = credential.refresh_token.as_deref().filter(|t| !t.is_empty())
        else {
            return self.request_token(&client_credentials).await;
        };

        match self
            .request_token(&TokenRequest::RefreshToken { refresh_token })
            .await
        {
            Err(ProviderError::Rejected { status, message }) => {
                tracing::info!(
                    credential_id = %credential.id,
                    status,
                    reason = %message,
                    "Refresh-token grant rejected, falling back to client credentials"
                );
                self.request_token(&client_credentials).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl OrderProvider for DeliveryClient {
    async fn list_orders(&self, access_token: &str) -> Result<Vec<RemoteOrder>, ProviderError> {
        let list: ParcelList = self.get_json(&PARCELS_PATH, access_token).await?;
        let parcels = match list {
            ParcelList::Bare(p) | ParcelList::Envelope { parcels: p } => p,
        };
        let total = parcels.len();
        let orders: Vec<RemoteOrder> = parcels.into_iter().filter_map(Parcel::into_remote).collect();
        if orders.len() < total {
            tracing::warn!(
                skipped = total - orders.len(),
                "Provider returned parcels without tracking number"
            );
        }
        Ok(orders)
    }

    async fn get_order(
        &self,
        access_token: &str,
        external_order_id: &str,
    ) -> Result<RemoteOrder, ProviderError> {
        // Dot segments would be dropped from the path and hit another resource
        if matches!(external_order_id.trim(), "" | "." | "..") {
            return Err(ProviderError::Rejected {
                status: 400,
                message: format!("unusable parcel id {external_order_id:?}"),
            });
        }
        let [v2, laas, parcels] = PARCELS_PATH;
        let parcel: Parcel = self
            .get_json(&[v2, laas, parcels, external_order_id], access_token)
            .await?;
        parcel.into_remote().ok_or_else(|| {
            ProviderError::Transient(format!(
                "parcel {external_order_id} returned without tracking number"
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use shared::models::{CredentialStatus, CredentialType};
    use std::sync::{Arc, Mutex};

    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn credential(refresh_token: Option<&str>) -> Credential {
        Credential {
            id: "glv-1".into(),
            credential_type: CredentialType::Delivery,
            is_active: true,
            client_id: "client-1".into(),
            client_secret: "secret-1".into(),
            access_token: None,
            refresh_token: refresh_token.map(str::to_string),
            expires_at: None,
            instance_name: "Store 1".into(),
            status: CredentialStatus::Ok,
            last_error: None,
            updated_at: 0,
        }
    }

    async fn token_endpoint(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
        match body["grantType"].as_str() {
            Some("refresh_token") if body["refreshToken"] == "good-refresh" => (
                StatusCode::OK,
                Json(json!({"accessToken": "from-refresh", "refreshToken": "rotated", "expiresIn": 3600})),
            ),
            Some("refresh_token") => (StatusCode::UNAUTHORIZED, Json(json!({"error": "invalid_grant"}))),
            Some("client_credentials") if body["clientId"] == "client-1" && body["clientSecret"] == "secret-1" => (
                StatusCode::OK,
                Json(json!({"accessToken": "from-client", "expiresIn": 1800})),
            ),
            _ => (StatusCode::BAD_REQUEST, Json(json!({"error": "invalid_client"}))),
        }
    }

    #[tokio::test]
    async fn refresh_grant_is_used_when_available() {
        let base = serve(Router::new().route("/oauth/token", post(token_endpoint))).await;
        let client = DeliveryClient::new(base, Duration::from_secs(5)).unwrap();

        let grant = client.obtain_token(&credential(Some("good-refresh"))).await.unwrap();
        assert_eq!(grant.access_token, "from-refresh");
        assert_eq!(grant.refresh_token.as_deref(), Some("rotated"));
        assert_eq!(grant.expires_in_secs, 3600);
    }

    #[tokio::test]
    async fn rejected_refresh_falls_back_to_client_credentials() {
        let base = serve(Router::new().route("/oauth/token", post(token_endpoint))).await;
        let client = DeliveryClient::new(base, Duration::from_secs(5)).unwrap();

        let grant = client.obtain_token(&credential(Some("stale"))).await.unwrap();
        assert_eq!(grant.access_token, "from-client");
        assert!(grant.refresh_token.is_none());
    }

    #[tokio::test]
    async fn bad_client_credentials_are_rejected() {
        let base = serve(Router::new().route("/oauth/token", post(token_endpoint))).await;
        let client = DeliveryClient::new(base, Duration::from_secs(5)).unwrap();
        let mut cred = credential(None);
        cred.client_secret = "wrong".into();

        let err = client.obtain_token(&cred).await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
    }

    #[tokio::test]
    async fn server_errors_are_transient() {
        let app = Router::new().route(
            "/oauth/token",
            post(|| async { StatusCode::SERVICE_UNAVAILABLE }),
        );
        let client = DeliveryClient::new(serve(app).await, Duration::from_secs(5)).unwrap();
        let err = client.obtain_token(&credential(None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
    }

    #[tokio::test]
    async fn closed_port_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = DeliveryClient::new(format!("http://{addr}"), Duration::from_secs(5)).unwrap();
        let err = client.obtain_token(&credential(None)).await.unwrap_err();
        assert!(matches!(err, ProviderError::Unreachable(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn parcels_are_mapped() {
        let app = Router::new()
            .route(
                "/v2/laas/parcels",
                get(|| async {
                    Json(json!({"parcels": [
                        {"trackingNumber": "T-1", "status": {"state": "DELIVERED", "updatedAt": "2024-05-01T10:00:00Z"}},
                        {"orderCode": "no-tracking"}
                    ]}))
                }),
            )
            .route(
                "/v2/laas/parcels/{tracking}",
                get(|| async {
                    Json(json!({
                        "trackingNumber": "T-9",
                        "orderCode": "ABC",
                        "partnerId": 55,
                        "status": {"state": "CREATED"},
                        "packageDetails": {"products": [{"sku": "A1", "name": "Milk", "quantity": 2}]},
                        "contact": {"name": "Ana"}
                    }))
                }),
            );
        let client = DeliveryClient::new(serve(app).await, Duration::from_secs(5)).unwrap();

        let list = client.list_orders("tok").await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].status.as_deref(), Some("DELIVERED"));
        assert!(list[0].status_at.is_some());

        let order = client.get_order("tok", "T-9").await.unwrap();
        assert_eq!(order.order_code.as_deref(), Some("ABC"));
        assert_eq!(order.store_id.as_deref(), Some("55"));
        assert_eq!(order.line_items[0].resolved_sku(), Some("A1"));
        assert_eq!(order.details["contact"]["name"], "Ana");
    }

    #[tokio::test]
    async fn parcel_id_stays_one_path_segment() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let app = Router::new().fallback(move |uri: axum::http::Uri| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(uri.to_string());
                StatusCode::NOT_FOUND
            }
        });
        let client = DeliveryClient::new(serve(app).await, Duration::from_secs(5)).unwrap();

        let err = client
            .get_order("tok", "../../oauth/token?x=1")
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 404, .. }));

        let seen = seen.lock().unwrap().clone();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].starts_with("/v2/laas/parcels/"), "{}", seen[0]);
        assert!(!seen[0].contains('?'));
        assert!(!seen[0].contains("oauth/token"));
    }

    #[tokio::test]
    async fn dot_segment_parcel_id_is_refused() {
        let client = DeliveryClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        let err = client.get_order("tok", "..").await.unwrap_err();
        assert!(matches!(err, ProviderError::Rejected { status: 400, .. }));
    }
}
