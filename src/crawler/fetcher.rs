//! HTTP fetcher
//!
//! [`Fetcher`] is the seam between the pipeline and the network. The
//! production [`HttpFetcher`] is built once with the proxy setting and keeps
//! two reqwest clients: one routed through the proxy and one direct.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Proxy};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised while fetching a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(String),

    #[error("request to {url} failed: {source}")]
    Request { url: String, source: reqwest::Error },

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("invalid header '{0}'")]
    Header(String),
}

/// Network settings shared by every request
#[derive(Debug, Clone, Default)]
pub struct FetchSettings {
    /// Proxy URL; `None` or empty means direct connections only
    pub proxy: Option<String>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` and returns the raw body
    ///
    /// Any non-2xx response is an error.
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        use_proxy: bool,
    ) -> Result<Vec<u8>, FetchError>;
}

/// reqwest-backed [`Fetcher`]
///
/// Requests carry no timeout; a run is bounded only by the remote side.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    proxied: Client,
    direct: Client,
}

impl HttpFetcher {
    pub fn new(settings: &FetchSettings) -> Result<Self, FetchError> {
        let direct = base_builder()
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))?;

        let proxied = match settings.proxy.as_deref().filter(|p| !p.is_empty()) {
            Some(proxy) => {
                let proxy = Proxy::all(proxy).map_err(|e| FetchError::Client(e.to_string()))?;
                base_builder()
                    .proxy(proxy)
                    .build()
                    .map_err(|e| FetchError::Client(e.to_string()))?
            }
            None => direct.clone(),
        };

        Ok(Self { proxied, direct })
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    Client::builder()
        .user_agent(concat!("web2feed/", env!("CARGO_PKG_VERSION")))
        .gzip(true)
        .brotli(true)
}

/// Converts configured headers into a header map
pub fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap, FetchError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| FetchError::Header(name.clone()))?;
        let value = HeaderValue::from_str(value).map_err(|_| FetchError::Header(name.to_string()))?;
        map.insert(name, value);
    }
    Ok(map)
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        use_proxy: bool,
    ) -> Result<Vec<u8>, FetchError> {
        let client = if use_proxy { &self.proxied } else { &self.direct };

        let response = client
            .get(url)
            .headers(header_map(headers)?)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;
        Ok(body.to_vec())
    }
}
