// # HTTP Feed Fetcher
//
// This crate provides the network side of feed polling: an HTTP GET that
// returns the raw response body for the core decoder.
//
// ## Failure Mapping
//
// Every failure becomes `Error::Fetch`, which the engine contains within the
// tick:
// - Transport errors (DNS, connect, TLS, client timeout)
// - Non-2xx status codes
// - Bodies larger than the configured limit (10 MiB by default)

use feedpoll_core::traits::FeedFetcher;
use feedpoll_core::{Error, Result};

use std::time::Duration;

/// Default request timeout
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default upper bound on a feed body
pub const DEFAULT_MAX_BYTES: usize = 10 * 1024 * 1024;

const USER_AGENT: &str = concat!("feedpoll/", env!("CARGO_PKG_VERSION"));

/// HTTP-based feed fetcher
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    /// HTTP client
    client: reqwest::Client,

    /// Request timeout applied to the client
    timeout: Duration,

    /// Largest body accepted, in bytes
    max_bytes: usize,
}

impl HttpFeedFetcher {
    /// Create a fetcher with the default timeout and size limit
    pub fn new() -> Self {
        Self::with_limits(Duration::from_secs(DEFAULT_TIMEOUT_SECS), DEFAULT_MAX_BYTES)
    }

    /// Create a fetcher with a custom request timeout and body size limit
    ///
    /// # Parameters
    ///
    /// - `timeout`: Upper bound on one request, including reading the body
    /// - `max_bytes`: Bodies larger than this fail the fetch
    pub fn with_limits(timeout: Duration, max_bytes: usize) -> Self {
        Self {
            client: build_client(timeout),
            timeout,
            max_bytes,
        }
    }

    /// Replace the request timeout
    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self::with_limits(timeout, self.max_bytes)
    }

    /// Replace the body size limit
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Read the body, failing once it grows past `max_bytes`
    async fn read_limited(&self, mut response: reqwest::Response) -> Result<Vec<u8>> {
        if let Some(len) = response.content_length() {
            if len > self.max_bytes as u64 {
                return Err(Error::fetch(format!(
                    "Response too large: {} bytes (limit {})",
                    len, self.max_bytes
                )));
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| Error::fetch(format!("Failed to read response: {}", e)))?
        {
            if body.len().saturating_add(chunk.len()) > self.max_bytes {
                return Err(Error::fetch(format!(
                    "Response too large: over {} bytes",
                    self.max_bytes
                )));
            }
            body.extend_from_slice(&chunk);
        }

        Ok(body)
    }
}

impl Default for HttpFeedFetcher {
    fn default() -> Self {
        Self::new()
    }
}

fn build_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(USER_AGENT)
        .build()
        .unwrap_or_default()
}

#[async_trait::async_trait]
impl FeedFetcher for HttpFeedFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::fetch(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch(format!("HTTP error: {}", status)));
        }

        let body = self.read_limited(response).await?;
        tracing::trace!("Fetched {} bytes from {}", body.len(), url);
        Ok(body)
    }

    fn fetcher_name(&self) -> &'static str {
        "http"
    }
}
