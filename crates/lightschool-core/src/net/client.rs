//! Network side of the cache manager.
//!
//! The `Fetcher` trait is the only way the manager reaches the network, so
//! tests can swap in a scripted implementation. `HttpFetcher` is the real one.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use tracing::debug;

use super::{CacheRequest, CachedResponse, FetchError, FetchResult};

/// HTTP request timeout in seconds.
/// 30s allows for slow responses while failing fast enough for good UX.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Issue `request` against the network.
    ///
    /// Resolves with whatever the server answered, including error statuses.
    async fn fetch(&self, request: &CacheRequest) -> FetchResult<CachedResponse>;
}

/// `Fetcher` backed by reqwest.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> FetchResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    fn headers(request: &CacheRequest) -> FetchResult<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        for (name, value) in &request.headers {
            let name = header::HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| FetchError::InvalidRequest(format!("header {}: {}", name, e)))?;
            headers.append(name, value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &CacheRequest) -> FetchResult<CachedResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(Self::headers(request)?);
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?;

        debug!(url = %request.url, status, bytes = body.len(), "Network response received");

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
