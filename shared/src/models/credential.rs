//! Provider credential

use serde::{Deserialize, Serialize};

/// Which provider a credential talks to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialType {
    /// Delivery-fulfillment provider (OAuth client credentials + refresh token)
    Delivery,
    /// Communications carrier (static account credentials)
    Carrier,
}

impl CredentialType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Delivery => "DELIVERY",
            Self::Carrier => "CARRIER",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DELIVERY" => Some(Self::Delivery),
            "CARRIER" => Some(Self::Carrier),
            _ => None,
        }
    }
}

impl std::fmt::Display for CredentialType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operational state of a credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CredentialStatus {
    #[default]
    Ok,
    /// Provider rejected the refresh material; an operator must re-issue it
    NeedsAttention,
}

impl CredentialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::NeedsAttention => "NEEDS_ATTENTION",
        }
    }

    pub fn parse(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("NEEDS_ATTENTION") {
            Self::NeedsAttention
        } else {
            Self::Ok
        }
    }
}

/// Provider credential record
///
/// Created out-of-band by an operator. Only the token lifecycle manager
/// writes `access_token`, `refresh_token` and `expires_at`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub id: String,
    #[serde(rename = "type")]
    pub credential_type: CredentialType,
    pub is_active: bool,
    pub client_id: String,
    #[serde(skip_serializing, default)]
    pub client_secret: String,
    #[serde(skip_serializing, default)]
    pub access_token: Option<String>,
    #[serde(skip_serializing, default)]
    pub refresh_token: Option<String>,
    /// Token expiry (epoch millis)
    pub expires_at: Option<i64>,
    pub instance_name: String,
    #[serde(default)]
    pub status: CredentialStatus,
    pub last_error: Option<String>,
    pub updated_at: i64,
}

impl Credential {
    /// Milliseconds left before the stored token expires (negative once expired)
    pub fn millis_until_expiry(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|exp| exp - now)
    }

    /// Token usable for at least `margin_ms` more
    pub fn has_valid_token(&self, now: i64, margin_ms: i64) -> bool {
        self.access_token.as_deref().is_some_and(|t| !t.is_empty())
            && self
                .millis_until_expiry(now)
                .is_some_and(|left| left > margin_ms)
    }

    pub fn needs_attention(&self) -> bool {
        self.status == CredentialStatus::NeedsAttention
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(access: Option<&str>, expires_at: Option<i64>) -> Credential {
        Credential {
            id: "c1".into(),
            credential_type: CredentialType::Delivery,
            is_active: true,
            client_id: "client".into(),
            client_secret: "secret".into(),
            access_token: access.map(str::to_string),
            refresh_token: None,
            expires_at,
            instance_name: "Store A".into(),
            status: CredentialStatus::Ok,
            last_error: None,
            updated_at: 0,
        }
    }

    #[test]
    fn token_inside_margin_is_not_valid() {
        let now = 1_000_000;
        let c = credential(Some("tok"), Some(now + 30_000));
        assert!(!c.has_valid_token(now, 60_000));
        assert!(c.has_valid_token(now, 10_000));
    }

    #[test]
    fn missing_token_or_expiry_is_not_valid() {
        assert!(!credential(None, Some(i64::MAX)).has_valid_token(0, 0));
        assert!(!credential(Some("tok"), None).has_valid_token(0, 0));
        assert!(!credential(Some(""), Some(i64::MAX)).has_valid_token(0, 0));
    }

    #[test]
    fn secrets_are_not_serialized() {
        let json = serde_json::to_value(credential(Some("tok"), Some(5))).unwrap();
        assert_eq!(json["type"], "DELIVERY");
        assert_eq!(json["instanceName"], "Store A");
        assert!(json.get("accessToken").is_none());
        assert!(json.get("clientSecret").is_none());
    }

    #[test]
    fn type_parse_is_case_insensitive() {
        assert_eq!(CredentialType::parse("carrier"), Some(CredentialType::Carrier));
        assert_eq!(CredentialType::parse("fax"), None);
    }
}
