use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// The live TeachAssist deployment.
pub const DEFAULT_BASE_URL: &str = "https://ta.yrdsb.ca/live/";

/// Configuration for simulating human browsing behavior via randomized delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelayConfig {
    /// Minimum sleep duration in milliseconds between requests.
    pub min_delay_ms: u64,
    /// Maximum sleep duration in milliseconds between requests.
    pub max_delay_ms: u64,
    /// Whether the randomized delay logic is active.
    pub enabled: bool,
}

impl Default for DelayConfig {
    /// Default configuration: 200ms - 800ms, enabled.
    fn default() -> Self {
        Self {
            min_delay_ms: 200,
            max_delay_ms: 800,
            enabled: true,
        }
    }
}

impl DelayConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Default::default()
        }
    }
}

/// Settings for talking to the portal.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Portal root. Must end with a slash so relative paths join under it.
    pub base_url: String,
    /// Per-request timeout. The portal is known to hang.
    pub timeout: Duration,
    /// Request budget for this client, refilled continuously.
    pub requests_per_minute: u32,
    /// How many times the pipeline retries a network failure.
    pub max_retries: u32,
    /// Backoff before the first retry; doubled for each further attempt.
    pub retry_backoff: Duration,
    /// Upper bound on detail pages fetched at once.
    pub detail_concurrency: usize,
    pub delay: DelayConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(20),
            requests_per_minute: 30,
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
            detail_concurrency: 4,
            delay: DelayConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Builds a config from the environment, reading a `.env` file first if present.
    ///
    /// Recognised variables: `TA_BASE_URL`, `TA_TIMEOUT_SECS`,
    /// `TA_REQUESTS_PER_MINUTE`, `TA_MAX_RETRIES`, `TA_DETAIL_CONCURRENCY`.
    /// Values that fail to parse leave the default in place.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();
        if let Ok(url) = env::var("TA_BASE_URL") {
            config.base_url = with_trailing_slash(url);
        }
        if let Some(secs) = parse_var::<u64>("TA_TIMEOUT_SECS") {
            config.timeout = Duration::from_secs(secs);
        }
        if let Some(rpm) = parse_var("TA_REQUESTS_PER_MINUTE") {
            config.requests_per_minute = rpm;
        }
        if let Some(retries) = parse_var("TA_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(n) = parse_var::<usize>("TA_DETAIL_CONCURRENCY") {
            config.detail_concurrency = n.max(1);
        }
        config
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = with_trailing_slash(base_url.into());
        self
    }
}

fn with_trailing_slash(mut url: String) -> String {
    if !url.ends_with('/') {
        url.push('/');
    }
    url
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    let raw = env::var(key).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring malformed configuration value");
            None
        }
    }
}
