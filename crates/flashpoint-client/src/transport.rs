//! HTTP transport abstraction.
//!
//! The fetch worker only needs "send this item, give me status, content
//! type and body". Putting that behind a trait lets tests script upstream
//! behavior without a network.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Proxy};
use tracing::{debug, info};

use flashpoint_core::{Error, FetchItem, HttpMethod, Result, SessionConfig};

/// What came back from one HTTP exchange.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

/// Sends a single [`FetchItem`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Perform the request once. Non-2xx statuses are returned, not raised;
    /// only transport-level failures are errors.
    async fn send(&self, item: &FetchItem) -> Result<RawResponse>;
}

/// reqwest-backed transport honoring the session's TLS, proxy and timeout
/// settings.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let mut builder = Client::builder().timeout(Duration::from_secs(config.timeout_secs));

        if !config.verify_tls {
            builder = builder.danger_accept_invalid_certs(true);
        }

        for (scheme, url) in &config.proxies {
            let proxy = match scheme.as_str() {
                "http" => Proxy::http(url),
                "https" => Proxy::https(url),
                "all" => Proxy::all(url),
                other => {
                    return Err(Error::Config(format!(
                        "Unsupported proxy scheme '{}', expected http, https or all",
                        other
                    )))
                }
            }
            .map_err(|e| Error::Config(format!("Invalid {} proxy '{}': {}", scheme, url, e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %config.base_url,
            verify_tls = config.verify_tls,
            proxies = config.proxies.len(),
            timeout_secs = config.timeout_secs,
            "Initialized Flashpoint HTTP transport"
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, item: &FetchItem) -> Result<RawResponse> {
        let mut req = match item.method() {
            HttpMethod::Get => self.client.get(item.url()).query(&item.query_params()),
            HttpMethod::Post => self.client.post(item.url()),
        };

        // Explicit headers go first so `.json()` keeps our Content-Type.
        for (name, value) in item.headers() {
            req = req.header(name.as_str(), value.as_str());
        }

        if item.method() == HttpMethod::Post {
            req = req.json(item.payload());
        }

        debug!(
            method = item.method().as_str(),
            url = item.url(),
            correlation_key = %item.key(),
            "Sending request"
        );

        let response = req.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }
}
