//! HTTP transport seam.
//!
//! The pagination engine and the follower only see the [`Transport`] trait.
//! [`HttpTransport`] is the reqwest-backed default; tests substitute stubs.

use crate::config::CachePolicy;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Default request timeout for [`HttpTransport`].
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

/// Body and status of a completed GET.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body decoded as text.
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// A 200 response with `body`.
    pub fn ok(body: impl Into<String>) -> Self {
        Self::new(200, body)
    }
}

/// Something that can GET a URL.
///
/// Implementations report transport failures as [`Error::Network`] with no
/// status; any HTTP status, including errors, comes back as a response.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchResponse>;
}

/// reqwest-backed transport. Follows up to five redirects and never retries.
#[derive(Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    timeout: Option<Duration>,
}

impl HttpTransport {
    pub fn new(timeout_ms: u64) -> Self {
        let timeout = Duration::from_millis(timeout_ms);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::limited(5))
            .user_agent(concat!("indexflow/", env!("CARGO_PKG_VERSION")))
            .build()
            .unwrap_or_default();
        Self {
            client,
            timeout: Some(timeout),
        }
    }

    /// Wrap an existing client, e.g. one with custom TLS or proxy settings.
    /// The client's own timeout applies.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            timeout: None,
        }
    }

    /// Timeout configured by [`new`](Self::new); `None` for a wrapped client.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_MS)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn fetch(&self, url: &Url, cache: CachePolicy) -> Result<FetchResponse> {
        let mut request = self.client.get(url.clone());
        if let Some(directive) = cache.cache_control() {
            request = request.header(reqwest::header::CACHE_CONTROL, directive);
        }

        let response = request.send().await.map_err(|e| network_error(url, &e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| network_error(url, &e))?;

        tracing::trace!(%url, status, bytes = body.len(), "fetched");
        Ok(FetchResponse { status, body })
    }
}

fn network_error(url: &Url, err: &reqwest::Error) -> Error {
    let description = if err.is_timeout() {
        format!("request timed out: {err}")
    } else if err.is_connect() {
        format!("connection failed: {err}")
    } else {
        err.to_string()
    };
    Error::Network {
        url: url.to_string(),
        status: None,
        description,
    }
}
