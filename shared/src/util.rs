use serde::{Deserialize, Deserializer};
use sha2::{Digest, Sha256};

/// Current UTC timestamp in milliseconds
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Mask a secret for logs and external responses.
///
/// Keeps the first 8 characters; anything shorter is fully hidden.
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        return "***".to_string();
    }
    let head: String = token.chars().take(8).collect();
    format!("{head}...")
}

/// Deterministic id from a set of parts (hex SHA-256 of the parts joined by `|`).
pub fn derive_id(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b"|");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Parse an RFC 3339 string or a numeric epoch-millis string into epoch millis.
pub fn parse_timestamp_millis(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    chrono::DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

/// Accept `"abc"`, `123` or `null` for an optional identifier field.
pub fn de_opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Str(String),
        Int(i64),
        Float(f64),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Str(s)) => Some(s),
        Some(Raw::Int(n)) => Some(n.to_string()),
        Some(Raw::Float(f)) => Some(f.to_string()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_keeps_prefix_only() {
        assert_eq!(mask_token("abcdefghijklmnop"), "abcdefgh...");
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token(""), "***");
    }

    #[test]
    fn derive_id_is_stable_and_separated() {
        let a = derive_id(&["T-1", "CANCEL"]);
        assert_eq!(a, derive_id(&["T-1", "CANCEL"]));
        assert_ne!(a, derive_id(&["T-1C", "ANCEL"]));
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn parse_timestamp_accepts_both_forms() {
        assert_eq!(parse_timestamp_millis("1700000000000"), Some(1_700_000_000_000));
        assert_eq!(
            parse_timestamp_millis("2023-11-14T22:13:20Z"),
            Some(1_700_000_000_000)
        );
        assert_eq!(parse_timestamp_millis("yesterday"), None);
        assert_eq!(parse_timestamp_millis("  "), None);
    }
}
