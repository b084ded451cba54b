use std::path::PathBuf;
use std::time::Duration;

/// Default REST origin, matching the backend's development port.
pub const DEFAULT_API_URL: &str = "http://localhost:3000";

/// Client configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// REST API origin (e.g. `http://localhost:3000`).
    pub api_url: String,
    /// Realtime gateway URL (e.g. `ws://localhost:3000/gateway`).
    pub gateway_url: String,
    /// Where the auth token is persisted. `None` keeps it in memory only.
    pub token_path: Option<PathBuf>,
    /// Per-request timeout for REST calls.
    pub request_timeout: Duration,
    /// First reconnect delay; doubles per failed attempt.
    pub reconnect_delay: Duration,
    /// Upper bound for the reconnect delay.
    pub max_reconnect_delay: Duration,
    /// Give up reconnecting after this many consecutive failures.
    pub max_reconnect_attempts: Option<u32>,
    /// Interval between client heartbeats on the realtime channel.
    pub heartbeat_interval: Duration,
}

impl Config {
    /// Defaults for the given API origin.
    pub fn new(api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            gateway_url: gateway_url_for(&api_url),
            api_url,
            token_path: None,
            request_timeout: Duration::from_millis(15_000),
            reconnect_delay: Duration::from_millis(500),
            max_reconnect_delay: Duration::from_millis(10_000),
            max_reconnect_attempts: None,
            heartbeat_interval: Duration::from_millis(25_000),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset or unparsable values fall back to
    /// the defaults of [`Config::new`].
    pub fn from_env() -> Self {
        let api_url = std::env::var("PAWSITIVE_API_URL")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string());
        let mut config = Self::new(api_url);

        if let Some(url) = std::env::var("PAWSITIVE_GATEWAY_URL").ok().filter(|s| !s.is_empty()) {
            config.gateway_url = url;
        }
        config.token_path = std::env::var("PAWSITIVE_TOKEN_PATH")
            .ok()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        if let Some(ms) = millis_var("PAWSITIVE_REQUEST_TIMEOUT_MS") {
            config.request_timeout = ms;
        }
        if let Some(ms) = millis_var("PAWSITIVE_RECONNECT_DELAY_MS") {
            config.reconnect_delay = ms;
        }
        if let Some(ms) = millis_var("PAWSITIVE_MAX_RECONNECT_DELAY_MS") {
            config.max_reconnect_delay = ms;
        }
        config.max_reconnect_attempts = std::env::var("PAWSITIVE_MAX_RECONNECT_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse().ok());
        if let Some(ms) = millis_var("PAWSITIVE_HEARTBEAT_INTERVAL_MS") {
            config.heartbeat_interval = ms;
        }
        config
    }
}

fn millis_var(name: &str) -> Option<Duration> {
    std::env::var(name).ok().as_deref().and_then(parse_millis)
}

/// Positive millisecond count. Zero is rejected: every duration here is a
/// period or a timeout.
fn parse_millis(value: &str) -> Option<Duration> {
    value
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

/// Derive the gateway URL from the API origin: `http` → `ws`, path `/gateway`.
fn gateway_url_for(api_url: &str) -> String {
    let ws = if let Some(rest) = api_url.strip_prefix("https://") {
        format!("wss://{rest}")
    } else if let Some(rest) = api_url.strip_prefix("http://") {
        format!("ws://{rest}")
    } else {
        api_url.to_string()
    };
    format!("{ws}/gateway")
}
