//! HTTP fetch client: the real network behind the offline cache.
//!
//! ### Behavior
//! - Any response the server produced is returned, whatever its status;
//!   only transport failures are errors.
//! - Redirects are followed here rather than by reqwest, so every hop is
//!   known; a chain that touched another origin is never basic.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable); larger bodies fail like a dropped
//!   connection would.
//! - Requests time out (default 20s) and the timeout is reported as a
//!   network failure, so the cache falls back instead of hanging.

pub mod classify;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, StatusCode};
use url::Url;

use shellcache_core::{AppConfig, AssetRequest, CapturedResponse, Error, Network};

pub use classify::{classify, flatten_headers, redirect_target};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Origin the page is served from; decides which responses are basic.
    pub origin: Url,

    /// User agent string (default: "shellcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl FetchConfig {
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            user_agent: "shellcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }

    /// Fetch settings from the application configuration.
    pub fn from_app(config: &AppConfig) -> Result<Self, Error> {
        let origin = config.origin_url().map_err(|e| Error::InvalidUrl(e.to_string()))?;
        Ok(Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Self::new(origin)
        })
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::none())
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn build_headers(request: &AssetRequest) -> Result<HeaderMap, Error> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| Error::InvalidInput(format!("invalid header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| Error::InvalidInput(format!("invalid header value for {name}: {e}")))?;
            headers.insert(name, value);
        }
        Ok(headers)
    }

    /// Method for the next hop: 303, and 301/302 after a POST, continue as GET.
    fn redirect_method(status: StatusCode, method: &Method) -> Method {
        let downgrade = status == StatusCode::SEE_OTHER
            || (matches!(status, StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND) && *method == Method::POST);
        if downgrade && *method != Method::HEAD { Method::GET } else { method.clone() }
    }

    fn transport_error(url: &Url, err: &reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::FetchTimeout(format!("{url}: {err}"))
        } else {
            Error::Network(format!("{url}: {err}"))
        }
    }
}

#[async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &AssetRequest) -> Result<CapturedResponse, Error> {
        let start = Instant::now();
        let mut method = Method::from_bytes(request.method.as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {:?}: {}", request.method, e)))?;
        let mut headers = Self::build_headers(request)?;
        let mut target = request.url.clone();
        let mut chain = vec![target.clone()];

        let response = loop {
            let response = self
                .http
                .request(method.clone(), target.clone())
                .headers(headers.clone())
                .send()
                .await
                .map_err(|e| Self::transport_error(&target, &e))?;

            let next = if response.status().is_redirection() {
                redirect_target(&target, response.headers())
            } else {
                None
            };
            let Some(next) = next else {
                break response;
            };

            if chain.len() > self.config.max_redirects {
                return Err(Error::Network(format!(
                    "{}: more than {} redirects",
                    request.url, self.config.max_redirects
                )));
            }
            if next.origin() != target.origin() {
                headers.remove(header::AUTHORIZATION);
                headers.remove(header::COOKIE);
            }
            tracing::debug!(from = %target, to = %next, status = response.status().as_u16(), "following redirect");
            method = Self::redirect_method(response.status(), &method);
            chain.push(next.clone());
            target = next;
        };

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let status = response.status().as_u16();
        let final_url = response.url().clone();
        let response_type = classify(&self.config.origin, &chain, response.headers());
        let headers = flatten_headers(response.headers());

        let body = response
            .bytes()
            .await
            .map_err(|e| Self::transport_error(&request.url, &e))?;

        if body.len() > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", body.len(), self.config.max_bytes)));
        }

        tracing::debug!(
            method = %request.method,
            url = %request.url,
            final_url = %final_url,
            hops = chain.len() - 1,
            status,
            response_type = %response_type,
            bytes = body.len(),
            fetch_ms = start.elapsed().as_millis() as u64,
            "fetched"
        );

        Ok(CapturedResponse { url: final_url, status, response_type, headers, body })
    }
}
