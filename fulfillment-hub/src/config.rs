//! Hub configuration

use std::time::Duration;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Hub configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP port (webhooks, admin API, notification channel)
    pub http_port: u16,
    /// PostgreSQL connection URL; in-memory store when absent
    pub database_url: Option<String>,
    /// Environment: development | staging | production
    pub environment: String,
    /// Directory for daily-rolling log files (stdout when unset)
    pub log_dir: Option<String>,
    /// Delivery provider API base URL
    pub delivery_api_base_url: String,
    /// Carrier provider API base URL
    pub carrier_api_base_url: String,
    /// Timeout for every outbound provider call
    pub provider_timeout: Duration,
    /// Tokens closer than this to expiry are treated as expired
    pub token_safety_margin: Duration,
    /// Attempts per refresh (first try included)
    pub refresh_max_attempts: u32,
    pub refresh_base_delay: Duration,
    pub refresh_backoff_multiplier: u32,
    /// Interval of the proactive refresh sweep
    pub token_sweep_interval: Duration,
    /// Lifetime assigned to verified carrier account credentials
    pub carrier_token_lifetime: Duration,
    /// Outbound queue length per notification session
    pub session_buffer: usize,
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(var = name, value = %raw, "Invalid value, using default");
                default
            }
        },
        _ => default,
    }
}

fn base_url(name: &str, default: &str) -> Result<String, BoxError> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    let url = raw.trim().trim_end_matches('/').to_string();
    if !(url.starts_with("http://") || url.starts_with("https://")) {
        return Err(format!("{name} must be an http(s) URL, got {raw:?}").into());
    }
    Ok(url)
}

impl Default for Config {
    /// Development defaults, also the fallback for every unset variable
    fn default() -> Self {
        Self {
            http_port: 8080,
            database_url: None,
            environment: "development".to_string(),
            log_dir: None,
            delivery_api_base_url: "http://127.0.0.1:9100".to_string(),
            carrier_api_base_url: "https://api.twilio.com".to_string(),
            provider_timeout: Duration::from_secs(15),
            token_safety_margin: Duration::from_secs(60),
            refresh_max_attempts: 3,
            refresh_base_delay: Duration::from_millis(1000),
            refresh_backoff_multiplier: 2,
            token_sweep_interval: Duration::from_secs(300),
            carrier_token_lifetime: Duration::from_secs(86_400),
            session_buffer: 64,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        let d = Self::default();
        let environment = std::env::var("ENVIRONMENT").unwrap_or(d.environment);

        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());
        if database_url.is_none() && environment != "development" {
            return Err(format!("DATABASE_URL must be set in {environment} environment").into());
        }

        let secs = |name: &str, default: Duration| Duration::from_secs(env_or(name, default.as_secs()));

        Ok(Self {
            http_port: env_or("HTTP_PORT", d.http_port),
            database_url,
            log_dir: std::env::var("LOG_DIR").ok().filter(|s| !s.is_empty()),
            delivery_api_base_url: base_url("DELIVERY_API_BASE_URL", &d.delivery_api_base_url)?,
            carrier_api_base_url: base_url("CARRIER_API_BASE_URL", &d.carrier_api_base_url)?,
            provider_timeout: secs("PROVIDER_TIMEOUT_SECS", d.provider_timeout),
            token_safety_margin: secs("TOKEN_SAFETY_MARGIN_SECS", d.token_safety_margin),
            refresh_max_attempts: env_or("TOKEN_REFRESH_MAX_ATTEMPTS", d.refresh_max_attempts).max(1),
            refresh_base_delay: Duration::from_millis(env_or(
                "TOKEN_REFRESH_BASE_DELAY_MS",
                d.refresh_base_delay.as_millis() as u64,
            )),
            refresh_backoff_multiplier: env_or(
                "TOKEN_REFRESH_BACKOFF_MULTIPLIER",
                d.refresh_backoff_multiplier,
            )
            .max(1),
            token_sweep_interval: secs("TOKEN_SWEEP_INTERVAL_SECS", d.token_sweep_interval)
                .max(Duration::from_secs(1)),
            carrier_token_lifetime: secs("CARRIER_TOKEN_LIFETIME_SECS", d.carrier_token_lifetime),
            session_buffer: env_or("SESSION_BUFFER", d.session_buffer).max(1),
            environment,
        })
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}
