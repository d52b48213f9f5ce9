//! Single-item fetch with rate-limit backoff.
//!
//! A worker sends one [`FetchItem`] and classifies the response:
//! - `200`: success, hit count derived from the body
//! - `429`: sleep `base * 3^n` and retry, up to `max_retries` times; once
//!   exhausted the item completes with `429` and zero hits
//! - anything else: hard failure for that item, no retry

use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{debug, warn};

use flashpoint_core::defaults::BACKOFF_MULTIPLIER;
use flashpoint_core::{extract_hits, CorrelationKey, FetchItem, FetchResult, SessionConfig};

use crate::progress::Progress;
use crate::transport::{HttpTransport, RawResponse};

const HTTP_OK: u16 = 200;
const HTTP_TOO_MANY_REQUESTS: u16 = 429;

/// Longest response excerpt kept in a status error.
const ERROR_BODY_EXCERPT: usize = 200;

/// Per-item failure. Carries the correlation key so callers can report
/// which origin failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("HTTP {status} for {key}")]
    Status {
        key: CorrelationKey,
        status: u16,
        body: String,
    },

    #[error("Request failed for {key}: {message}")]
    Transport { key: CorrelationKey, message: String },

    #[error("Malformed response for {key}: {message}")]
    Decode { key: CorrelationKey, message: String },
}

impl FetchError {
    pub fn key(&self) -> &CorrelationKey {
        match self {
            FetchError::Status { key, .. }
            | FetchError::Transport { key, .. }
            | FetchError::Decode { key, .. } => key,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            FetchError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<FetchError> for flashpoint_core::Error {
    fn from(e: FetchError) -> Self {
        match e {
            FetchError::Status { key, status, .. } => flashpoint_core::Error::Upstream {
                status,
                origin: key.to_string(),
            },
            FetchError::Transport { message, .. } => flashpoint_core::Error::Request(message),
            FetchError::Decode { message, .. } => {
                flashpoint_core::Error::MalformedResponse(message)
            }
        }
    }
}

/// Result of fetching one item.
pub type FetchOutcome = std::result::Result<FetchResult, FetchError>;

/// Backoff schedule for rate-limited requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    pub fn from_config(config: &SessionConfig) -> Self {
        Self::new(config.max_retries, config.backoff_base)
    }

    /// Delay before retry number `retry` (1-based): `base * 3^retry`.
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay
            .saturating_mul(BACKOFF_MULTIPLIER.saturating_pow(retry))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&SessionConfig::default())
    }
}

/// Fetches single items. Cheap to clone; clones share the transport.
#[derive(Clone)]
pub struct HttpFetchWorker {
    transport: Arc<dyn HttpTransport>,
    policy: RetryPolicy,
}

impl HttpFetchWorker {
    pub fn new(transport: Arc<dyn HttpTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Fetch `item`, retrying on 429.
    ///
    /// `progress` is incremented exactly once when the item completes with
    /// a [`FetchResult`] (200, or 429 after retries ran out). Hard failures
    /// leave it untouched.
    pub async fn fetch(&self, item: FetchItem, progress: Option<&Progress>) -> FetchOutcome {
        let start = Instant::now();
        let mut retries: u32 = 0;

        loop {
            let response = self
                .transport
                .send(&item)
                .await
                .map_err(|e| FetchError::Transport {
                    key: item.key().clone(),
                    message: e.to_string(),
                })?;

            match response.status {
                HTTP_OK => {
                    let hit_count = count_hits(&response).map_err(|message| FetchError::Decode {
                        key: item.key().clone(),
                        message,
                    })?;
                    if let Some(progress) = progress {
                        progress.record_completion();
                    }
                    debug!(
                        correlation_key = %item.key(),
                        status = response.status,
                        hit_count,
                        attempt = retries + 1,
                        duration_ms = start.elapsed().as_millis() as u64,
                        "Fetch completed"
                    );
                    return Ok(into_result(&item, response, hit_count));
                }
                HTTP_TOO_MANY_REQUESTS if retries < self.policy.max_retries => {
                    retries += 1;
                    let delay = self.policy.delay_for(retries);
                    warn!(
                        correlation_key = %item.key(),
                        attempt = retries,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                HTTP_TOO_MANY_REQUESTS => {
                    warn!(
                        correlation_key = %item.key(),
                        attempt = retries + 1,
                        "Rate limited, retries exhausted"
                    );
                    if let Some(progress) = progress {
                        progress.record_completion();
                    }
                    return Ok(into_result(&item, response, 0));
                }
                status => {
                    let body = String::from_utf8_lossy(&response.body);
                    let body: String = body.chars().take(ERROR_BODY_EXCERPT).collect();
                    warn!(
                        correlation_key = %item.key(),
                        status,
                        error = %body,
                        "Upstream returned an error status"
                    );
                    return Err(FetchError::Status {
                        key: item.key().clone(),
                        status,
                        body,
                    });
                }
            }
        }
    }
}

fn into_result(item: &FetchItem, response: RawResponse, hit_count: usize) -> FetchResult {
    FetchResult {
        key: item.key().clone(),
        status: response.status,
        content_type: response.content_type,
        body: response.body,
        hit_count,
    }
}

/// Matched records in a 200 body: `hits.hits` length for JSON, 1 otherwise.
fn count_hits(response: &RawResponse) -> std::result::Result<usize, String> {
    let is_json = response
        .content_type
        .as_deref()
        .map(|ct| ct.contains("application/json"))
        .unwrap_or(false);

    if !is_json {
        return Ok(1);
    }

    let body: serde_json::Value =
        serde_json::from_slice(&response.body).map_err(|e| e.to_string())?;
    extract_hits(&body)
        .map(|hits| hits.len())
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use flashpoint_core::HttpMethod;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of responses and records when each call happened.
    struct ScriptedTransport {
        responses: Mutex<VecDeque<RawResponse>>,
        calls: Mutex<Vec<tokio::time::Instant>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<RawResponse>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<tokio::time::Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpTransport for ScriptedTransport {
        async fn send(&self, _item: &FetchItem) -> flashpoint_core::Result<RawResponse> {
            self.calls.lock().unwrap().push(tokio::time::Instant::now());
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| flashpoint_core::Error::Request("script exhausted".into()))
        }
    }

    fn status(code: u16) -> RawResponse {
        RawResponse {
            status: code,
            content_type: None,
            body: Vec::new(),
        }
    }

    fn json_hits(n: usize) -> RawResponse {
        let hits: Vec<_> = (0..n).map(|i| json!({"_id": i})).collect();
        RawResponse {
            status: 200,
            content_type: Some("application/json; charset=utf-8".into()),
            body: serde_json::to_vec(&json!({"hits": {"hits": hits}})).unwrap(),
        }
    }

    fn item() -> FetchItem {
        FetchItem::new(
            HttpMethod::Post,
            "https://example.test/all/search",
            CorrelationKey::Query("alpha".into()),
            json!({}),
            Vec::new(),
        )
    }

    fn worker(transport: Arc<ScriptedTransport>, max_retries: u32) -> HttpFetchWorker {
        HttpFetchWorker::new(
            transport,
            RetryPolicy::new(max_retries, Duration::from_secs(1)),
        )
    }

    #[test]
    fn test_delay_schedule_is_powers_of_three() {
        let policy = RetryPolicy::new(3, Duration::from_secs(1));
        assert_eq!(policy.delay_for(1), Duration::from_secs(3));
        assert_eq!(policy.delay_for(2), Duration::from_secs(9));
        assert_eq!(policy.delay_for(3), Duration::from_secs(27));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_429_then_succeeds_with_expected_delays() {
        let transport = ScriptedTransport::new(vec![status(429), status(429), json_hits(4)]);
        let progress = Progress::new(1);

        let result = worker(transport.clone(), 3)
            .fetch(item(), Some(&progress))
            .await
            .unwrap();

        assert_eq!(result.status, 200);
        assert_eq!(result.hit_count, 4);
        assert_eq!(progress.completed(), 1);

        let calls = transport.call_times();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1] - calls[0], Duration::from_secs(3));
        assert_eq!(calls[2] - calls[1], Duration::from_secs(9));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_429_completes_with_zero_hits() {
        let transport = ScriptedTransport::new(vec![status(429); 4]);
        let progress = Progress::new(1);

        let result = worker(transport.clone(), 3)
            .fetch(item(), Some(&progress))
            .await
            .unwrap();

        assert_eq!(result.status, 429);
        assert_eq!(result.hit_count, 0);
        assert!(!result.is_success());
        assert_eq!(progress.completed(), 1);
        assert_eq!(transport.call_times().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_returns_first_429() {
        let transport = ScriptedTransport::new(vec![status(429)]);
        let result = worker(transport.clone(), 0).fetch(item(), None).await.unwrap();
        assert_eq!(result.status, 429);
        assert_eq!(transport.call_times().len(), 1);
    }

    #[tokio::test]
    async fn test_hard_error_is_not_retried_and_not_counted() {
        let transport = ScriptedTransport::new(vec![RawResponse {
            status: 500,
            content_type: Some("text/plain".into()),
            body: b"boom".to_vec(),
        }]);
        let progress = Progress::new(1);

        let err = worker(transport.clone(), 3)
            .fetch(item(), Some(&progress))
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert_eq!(err.key(), &CorrelationKey::Query("alpha".into()));
        assert_eq!(transport.call_times().len(), 1);
        assert_eq!(progress.completed(), 0);
    }

    #[tokio::test]
    async fn test_binary_body_counts_as_one_hit() {
        let transport = ScriptedTransport::new(vec![RawResponse {
            status: 200,
            content_type: Some("image/jpeg".into()),
            body: vec![0xFF, 0xD8, 0xFF],
        }]);
        let result = worker(transport, 3).fetch(item(), None).await.unwrap();
        assert_eq!(result.hit_count, 1);
        assert_eq!(result.body, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_json_without_hits_is_a_decode_error() {
        let transport = ScriptedTransport::new(vec![RawResponse {
            status: 200,
            content_type: Some("application/json".into()),
            body: br#"{"error": "nope"}"#.to_vec(),
        }]);
        let err = worker(transport, 3).fetch(item(), None).await.unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_transport_failure_carries_key() {
        let transport = ScriptedTransport::new(Vec::new());
        let err = worker(transport, 3).fetch(item(), None).await.unwrap_err();
        match err {
            FetchError::Transport { key, message } => {
                assert_eq!(key, CorrelationKey::Query("alpha".into()));
                assert!(message.contains("script exhausted"));
            }
            other => panic!("expected transport error, got {:?}", other),
        }
    }

    #[test]
    fn test_fetch_error_converts_to_upstream() {
        let err: flashpoint_core::Error = FetchError::Status {
            key: CorrelationKey::Query("beta".into()),
            status: 500,
            body: String::new(),
        }
        .into();
        assert_eq!(err.to_string(), "Upstream error: HTTP 500 for beta");
    }
}
