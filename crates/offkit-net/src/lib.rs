//! # Offkit Net
//!
//! Network abstraction for the Offkit offline worker engine.
//!
//! ## Design Goals
//!
//! 1. **Injectable network**: the worker never reaches for a global client;
//!    it is handed a [`Fetcher`] and calls `fetch(request)` on it
//! 2. **Cheap duplication**: [`Response`] is `Clone`, with a `Bytes` body,
//!    so a response can be duplicated before either copy is consumed
//! 3. **Failure taxonomy**: connect-level failures are distinguishable from
//!    HTTP-level ones, so callers can fall back to a cache when offline

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use thiserror::Error;
use tracing::{debug, trace, warn};
use url::Url;

/// Errors that can occur in networking.
#[derive(Error, Debug)]
pub enum NetError {
    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Timeout after {0:?}")]
    Timeout(Duration),

    #[error("Network unreachable: {0}")]
    Offline(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl NetError {
    /// Check whether this failure means the network itself was unreachable
    /// (as opposed to the server answering with an error).
    pub fn is_offline(&self) -> bool {
        matches!(self, NetError::Offline(_) | NetError::Timeout(_))
    }
}

/// HTTP request.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: Url,
    pub method: Method,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
    pub timeout: Option<Duration>,
}

impl Request {
    /// Create a GET request.
    pub fn get(url: Url) -> Self {
        Self {
            url,
            method: Method::GET,
            headers: HeaderMap::new(),
            body: None,
            timeout: Some(Duration::from_secs(30)),
        }
    }

    /// Add a header.
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set timeout.
    pub fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Check if this is a GET request.
    pub fn is_get(&self) -> bool {
        self.method == Method::GET
    }
}

/// HTTP response.
///
/// The body is fully buffered as `Bytes`, so cloning a response yields a
/// byte-identical duplicate without consuming either copy.
#[derive(Debug, Clone)]
pub struct Response {
    pub url: Url,
    pub status: StatusCode,
    pub headers: HeaderMap,
    body: Bytes,
}

impl Response {
    /// Create a response from parts.
    pub fn new(url: Url, status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            url,
            status,
            headers,
            body,
        }
    }

    /// Check if the request was successful (2xx).
    pub fn ok(&self) -> bool {
        self.status.is_success()
    }

    /// Get the body as bytes.
    pub fn bytes(&self) -> Bytes {
        self.body.clone()
    }

    /// Get the body as text.
    pub fn text(&self) -> Result<String, NetError> {
        String::from_utf8(self.body.to_vec()).map_err(|e| NetError::RequestFailed(e.to_string()))
    }
}

/// The network seam: fetch(request) → response or failure.
///
/// Implementations must be safe to share across concurrently in-flight
/// requests.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform a network fetch.
    async fn fetch(&self, request: Request) -> Result<Response, NetError>;
}

/// HTTP fetcher configuration.
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    /// User agent string.
    pub user_agent: String,
    /// Default timeout.
    pub default_timeout: Duration,
    /// Maximum redirects.
    pub max_redirects: usize,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: "Offkit/1.0".to_string(),
            default_timeout: Duration::from_secs(30),
            max_redirects: 10,
        }
    }
}

/// Fetcher backed by a real HTTP client.
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Create a new HTTP fetcher.
    pub fn new(config: FetcherConfig) -> Result<Self, NetError> {
        let client = reqwest::Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.default_timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .build()
            .map_err(|e| NetError::RequestFailed(e.to_string()))?;

        debug!("HttpFetcher initialized");

        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: Request) -> Result<Response, NetError> {
        debug!(url = %request.url, method = %request.method, "Fetching resource");

        let mut req_builder = self
            .client
            .request(request.method.clone(), request.url.clone());

        for (name, value) in request.headers.iter() {
            req_builder = req_builder.header(name, value);
        }

        if let Some(body) = request.body {
            req_builder = req_builder.body(body);
        }

        if let Some(timeout) = request.timeout {
            req_builder = req_builder.timeout(timeout);
        }

        let response = req_builder.send().await.map_err(|e| {
            if e.is_timeout() {
                NetError::Timeout(request.timeout.unwrap_or(Duration::ZERO))
            } else if e.is_connect() {
                warn!(url = %request.url, "Network unreachable");
                NetError::Offline(e.to_string())
            } else {
                NetError::HttpError(e)
            }
        })?;

        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        trace!(
            url = %url,
            status = %status,
            body_len = body.len(),
            "Response received"
        );

        Ok(Response::new(url, status, headers, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_request_builder() {
        let url = Url::parse("https://example.com/").unwrap();
        let request = Request::get(url.clone())
            .header(
                HeaderName::from_static("accept"),
                HeaderValue::from_static("application/json"),
            )
            .timeout(Duration::from_secs(10));

        assert_eq!(request.url, url);
        assert!(request.is_get());
        assert!(request.headers.contains_key("accept"));
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_response_clone_is_byte_identical() {
        let url = Url::parse("https://example.com/a.js").unwrap();
        let response = Response::new(
            url,
            StatusCode::OK,
            HeaderMap::new(),
            Bytes::from_static(b"console.log(1)"),
        );

        let copy = response.clone();
        assert_eq!(response.bytes(), copy.bytes());
        // Reading one copy does not consume the other.
        let _ = response.bytes();
        assert_eq!(copy.bytes(), Bytes::from_static(b"console.log(1)"));
    }

    #[test]
    fn test_fetcher_config_default() {
        let config = FetcherConfig::default();
        assert_eq!(config.user_agent, "Offkit/1.0");
        assert_eq!(config.max_redirects, 10);
    }

    #[test]
    fn test_offline_classification() {
        assert!(NetError::Offline("refused".to_string()).is_offline());
        assert!(NetError::Timeout(Duration::from_secs(1)).is_offline());
        assert!(!NetError::RequestFailed("bad".to_string()).is_offline());
    }

    #[tokio::test]
    async fn test_http_fetcher_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/manifest.webmanifest"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"{\"name\":\"app\"}" as &[u8]))
            .mount(&server)
            .await;

        let fetcher = HttpFetcher::new(FetcherConfig::default()).unwrap();
        let url = Url::parse(&format!("{}/manifest.webmanifest", server.uri())).unwrap();
        let response = fetcher.fetch(Request::get(url)).await.unwrap();

        assert!(response.ok());
        assert_eq!(response.bytes(), Bytes::from_static(b"{\"name\":\"app\"}"));
    }

    #[tokio::test]
    async fn test_http_fetcher_connect_failure_is_offline() {
        let fetcher = HttpFetcher::new(FetcherConfig {
            default_timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();

        // Nothing listens on this port.
        let url = Url::parse("http://127.0.0.1:19/unreachable").unwrap();
        let err = fetcher.fetch(Request::get(url)).await.unwrap_err();
        assert!(err.is_offline());
    }
}
