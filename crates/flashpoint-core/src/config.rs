//! Resolved session configuration for one Flashpoint instance.
//!
//! The integration layer resolves credentials, proxies and TLS policy before
//! anything here runs; this type only carries the resolved values.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use crate::defaults;
use crate::error::{Error, Result};

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://fp.tools/api/v4";

/// Connection and pacing settings for one instance.
#[derive(Clone)]
pub struct SessionConfig {
    /// Base URL of the search API; the search path is appended to it.
    pub base_url: String,
    /// Bearer token sent on every call.
    pub token: String,
    /// Verify upstream TLS certificates.
    pub verify_tls: bool,
    /// Proxy URLs keyed by scheme (`http`, `https`, or `all`).
    pub proxies: HashMap<String, String>,
    /// Retries of a rate-limited request before giving up.
    pub max_retries: u32,
    /// Worker pool size for concurrent fetches.
    pub max_workers: usize,
    /// Base backoff delay; retry `n` waits `backoff_base * 3^n`.
    pub backoff_base: Duration,
    /// Pause after each completion collected by the dispatcher.
    pub throttle: Duration,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Media asset endpoint.
    pub media_assets_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            token: String::new(),
            verify_tls: true,
            proxies: HashMap::new(),
            max_retries: defaults::MAX_RETRIES,
            max_workers: defaults::MAX_WORKERS,
            backoff_base: Duration::from_millis(defaults::BACKOFF_BASE_MS),
            throttle: Duration::from_millis(defaults::THROTTLE_MS),
            timeout_secs: defaults::REQUEST_TIMEOUT_SECS,
            media_assets_url: defaults::MEDIA_ASSETS_URL.to_string(),
        }
    }
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("base_url", &self.base_url)
            .field("token", &if self.token.is_empty() { "" } else { "***" })
            .field("verify_tls", &self.verify_tls)
            .field("proxies", &self.proxies)
            .field("max_retries", &self.max_retries)
            .field("max_workers", &self.max_workers)
            .field("backoff_base", &self.backoff_base)
            .field("throttle", &self.throttle)
            .field("timeout_secs", &self.timeout_secs)
            .field("media_assets_url", &self.media_assets_url)
            .finish()
    }
}

impl SessionConfig {
    /// Config for `https://{host}` with the given token.
    pub fn new(host: &str, token: impl Into<String>) -> Self {
        Self {
            base_url: format!("https://{}", host.trim_end_matches('/')),
            token: token.into(),
            ..Self::default()
        }
    }

    /// Create config from environment variables (with defaults).
    ///
    /// | Variable | Default | Description |
    /// |----------|---------|-------------|
    /// | `FLASHPOINT_TOKEN` | (required) | Bearer token |
    /// | `FLASHPOINT_BASE_URL` | `https://fp.tools/api/v4` | Full API base URL |
    /// | `FLASHPOINT_HOST` | (unset) | Host, used as `https://{host}` when no base URL is set |
    /// | `FLASHPOINT_VERIFY_TLS` | `true` | Verify TLS certificates |
    /// | `FLASHPOINT_HTTP_PROXY` | (unset) | Proxy for `http` |
    /// | `FLASHPOINT_HTTPS_PROXY` | (unset) | Proxy for `https` |
    /// | `FLASHPOINT_MAX_RETRIES` | `3` | Retries on HTTP 429 |
    /// | `FLASHPOINT_MAX_WORKERS` | `10` | Concurrent fetches |
    /// | `FLASHPOINT_TIMEOUT` | `60` | Request timeout (seconds) |
    /// | `FLASHPOINT_MEDIA_ASSETS_URL` | `https://fp.tools/ui/v4/media/assets` | Media endpoint |
    pub fn from_env() -> Result<Self> {
        let token = std::env::var("FLASHPOINT_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| Error::Config("FLASHPOINT_TOKEN is not set".to_string()))?;

        let base_url = std::env::var("FLASHPOINT_BASE_URL")
            .ok()
            .or_else(|| {
                std::env::var("FLASHPOINT_HOST")
                    .ok()
                    .map(|h| format!("https://{}", h.trim_end_matches('/')))
            })
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let mut proxies = HashMap::new();
        if let Ok(p) = std::env::var("FLASHPOINT_HTTP_PROXY") {
            proxies.insert("http".to_string(), p);
        }
        if let Ok(p) = std::env::var("FLASHPOINT_HTTPS_PROXY") {
            proxies.insert("https".to_string(), p);
        }

        let config = Self {
            base_url,
            token,
            verify_tls: std::env::var("FLASHPOINT_VERIFY_TLS")
                .map(|v| parse_bool(&v).unwrap_or(true))
                .unwrap_or(true),
            proxies,
            max_retries: std::env::var("FLASHPOINT_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::MAX_RETRIES),
            max_workers: std::env::var("FLASHPOINT_MAX_WORKERS")
                .ok()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(defaults::MAX_WORKERS)
                .max(1),
            timeout_secs: std::env::var("FLASHPOINT_TIMEOUT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults::REQUEST_TIMEOUT_SECS),
            media_assets_url: std::env::var("FLASHPOINT_MEDIA_ASSETS_URL")
                .unwrap_or_else(|_| defaults::MEDIA_ASSETS_URL.to_string()),
            ..Self::default()
        };

        Ok(config)
    }

    /// Full URL of the search endpoint.
    pub fn search_url(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            defaults::SEARCH_PATH
        )
    }

    /// `Authorization` header value.
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_media_assets_url(mut self, url: impl Into<String>) -> Self {
        self.media_assets_url = url.into();
        self
    }

    pub fn with_verify_tls(mut self, verify: bool) -> Self {
        self.verify_tls = verify;
        self
    }

    pub fn with_proxy(mut self, scheme: impl Into<String>, url: impl Into<String>) -> Self {
        self.proxies.insert(scheme.into(), url.into());
        self
    }

    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }

    /// Set the worker pool size (clamped to at least one).
    pub fn with_max_workers(mut self, max: usize) -> Self {
        self.max_workers = max.max(1);
        self
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn with_throttle(mut self, throttle: Duration) -> Self {
        self.throttle = throttle;
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Parse a boolean toggle as written by users ("true", "1", "yes", "off", ...).
pub fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert!(config.verify_tls);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.backoff_base, Duration::from_secs(1));
        assert_eq!(config.throttle, Duration::from_millis(100));
        assert_eq!(config.media_assets_url, defaults::MEDIA_ASSETS_URL);
    }

    #[test]
    fn test_new_builds_https_base_url() {
        let config = SessionConfig::new("api.example.test/", "tok");
        assert_eq!(config.base_url, "https://api.example.test");
        assert_eq!(config.search_url(), "https://api.example.test/all/search");
        assert_eq!(config.bearer(), "Bearer tok");
    }

    #[test]
    fn test_search_url_trims_trailing_slash() {
        let config = SessionConfig::default().with_base_url("http://127.0.0.1:9000/");
        assert_eq!(config.search_url(), "http://127.0.0.1:9000/all/search");
    }

    #[test]
    fn test_debug_redacts_token() {
        let config = SessionConfig::new("h", "super-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn test_with_max_workers_clamps_to_one() {
        let config = SessionConfig::default().with_max_workers(0);
        assert_eq!(config.max_workers, 1);
    }

    #[test]
    fn test_parse_bool() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool(" off "), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
