//! One HTTP exchange, blocking or async.
//!
//! The executors only see [`ApiRequest`] in and [`ApiResponse`] or
//! [`TransportError`] out, so tests and callers can plug in their own
//! transport.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};

use crate::{ApiKey, ClientOptions, OilPriceError, Result, TransportError};

/// A GET request relative to the client's base URL.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiRequest {
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Bound for a single attempt.
    pub timeout: Duration,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            path: path.into(),
            query: Vec::new(),
            timeout,
        }
    }

    pub fn with_query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    /// First value of query parameter `name`.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// Raw response: status, lowercased headers and body text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: BTreeMap::new(),
            body: body.into(),
        }
    }

    pub fn json(status: u16, body: &serde_json::Value) -> Self {
        Self::new(status, body.to_string())
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub const fn is_success(&self) -> bool {
        self.status >= 200 && self.status < 300
    }
}

/// Blocking transport: performs one exchange on the calling thread.
pub trait Transport: Send + Sync {
    fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError>;
}

/// Boxed future returned by [`AsyncTransport::send`].
pub type TransportFuture<'a> =
    Pin<Box<dyn Future<Output = std::result::Result<ApiResponse, TransportError>> + Send + 'a>>;

/// Async transport: performs one exchange without blocking the runtime.
///
/// Dropping the returned future must abort the exchange.
pub trait AsyncTransport: Send + Sync {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a>;
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        (**self).send(request)
    }
}

impl<T: AsyncTransport + ?Sized> AsyncTransport for Arc<T> {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
        (**self).send(request)
    }
}

fn default_headers(api_key: &ApiKey) -> Result<HeaderMap> {
    let mut authorization = HeaderValue::from_str(&format!("Token {}", api_key.expose()))
        .map_err(|_| {
            OilPriceError::Configuration("API key contains invalid header characters".to_owned())
        })?;
    authorization.set_sensitive(true);

    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, authorization);
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    Ok(headers)
}

fn request_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn map_reqwest_error(err: &reqwest::Error, timeout: Duration) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout(timeout)
    } else if err.is_connect() {
        TransportError::Connect(err.to_string())
    } else {
        TransportError::Other(err.to_string())
    }
}

fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|value| (name.as_str().to_owned(), value.to_owned()))
        })
        .collect()
}

fn build_error(err: reqwest::Error) -> OilPriceError {
    OilPriceError::Configuration(format!("failed to build HTTP client: {err}"))
}

/// Production async transport backed by `reqwest::Client`.
#[derive(Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl fmt::Debug for ReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl ReqwestTransport {
    pub fn new(api_key: &ApiKey, options: &ClientOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .default_headers(default_headers(api_key)?)
            .user_agent(options.user_agent.as_str())
            .pool_max_idle_per_host(options.pool.max_idle)
            .timeout(options.timeout)
            .build()
            .map_err(build_error)?;
        Ok(Self {
            http,
            base_url: options.base_url.clone(),
        })
    }
}

impl AsyncTransport for ReqwestTransport {
    fn send<'a>(&'a self, request: &'a ApiRequest) -> TransportFuture<'a> {
        Box::pin(async move {
            let response = self
                .http
                .get(request_url(&self.base_url, &request.path))
                .query(&request.query)
                .timeout(request.timeout)
                .send()
                .await
                .map_err(|err| map_reqwest_error(&err, request.timeout))?;

            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());
            let body = response
                .text()
                .await
                .map_err(|err| map_reqwest_error(&err, request.timeout))?;

            Ok(ApiResponse {
                status,
                headers,
                body,
            })
        })
    }
}

/// Production blocking transport backed by `reqwest::blocking::Client`.
///
/// Like the underlying client, it must not be created or dropped inside an
/// async runtime.
#[derive(Clone)]
pub struct BlockingReqwestTransport {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl fmt::Debug for BlockingReqwestTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingReqwestTransport")
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl BlockingReqwestTransport {
    pub fn new(api_key: &ApiKey, options: &ClientOptions) -> Result<Self> {
        let http = reqwest::blocking::Client::builder()
            .default_headers(default_headers(api_key)?)
            .user_agent(options.user_agent.as_str())
            .pool_max_idle_per_host(options.pool.max_idle)
            .timeout(options.timeout)
            .build()
            .map_err(build_error)?;
        Ok(Self {
            http,
            base_url: options.base_url.clone(),
        })
    }
}

impl Transport for BlockingReqwestTransport {
    fn send(&self, request: &ApiRequest) -> std::result::Result<ApiResponse, TransportError> {
        let response = self
            .http
            .get(request_url(&self.base_url, &request.path))
            .query(&request.query)
            .timeout(request.timeout)
            .send()
            .map_err(|err| map_reqwest_error(&err, request.timeout))?;

        let status = response.status().as_u16();
        let headers = collect_headers(response.headers());
        let body = response
            .text()
            .map_err(|err| map_reqwest_error(&err, request.timeout))?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
