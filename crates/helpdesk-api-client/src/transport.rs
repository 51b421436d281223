//! HTTP transport seam.
//!
//! The client talks to the backend only through [`HttpTransport`]. The
//! production implementation wraps `reqwest`; tests substitute a scripted
//! backend.

use crate::{ApiError, ApiResult};
use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A logical API call as issued by a caller: method, path under the base
/// URL, query parameters and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Append a query parameter (values are encoded when the URL is built).
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Attach a JSON body.
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach a serializable body.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> ApiResult<Self> {
        Ok(self.with_body(serde_json::to_value(body)?))
    }

    /// Resolve this request against the backend base URL.
    ///
    /// The path is appended to the base (a base path prefix is kept), and
    /// query parameters are added on top of any query already in `path`.
    pub fn url(&self, base: &Url) -> ApiResult<Url> {
        let base = base.as_str().trim_end_matches('/');
        let path = if self.path.starts_with('/') {
            self.path.clone()
        } else {
            format!("/{}", self.path)
        };

        let mut url = Url::parse(&format!("{}{}", base, path))?;
        if !self.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &self.query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }
}

/// A fully resolved request handed to the transport.
#[derive(Debug, Clone)]
pub struct OutgoingRequest {
    pub method: Method,
    pub url: Url,
    /// Bearer credential for the `Authorization` header; `None` sends no header.
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

/// A received response. Any status is a response; only missing responses
/// are transport errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Decode the body as JSON. An empty body decodes as `null`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Sends one HTTP request and returns whatever response arrives.
///
/// Implementations must not retry and must not interpret status codes;
/// transport failures (including the per-request deadline) are
/// [`ApiError::Network`].
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: OutgoingRequest) -> ApiResult<ApiResponse>;
}

/// `reqwest`-backed transport with a uniform per-request deadline.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> ApiResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Network(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: OutgoingRequest) -> ApiResult<ApiResponse> {
        let mut builder = self
            .http_client
            .request(request.method, request.url)
            .header("Accept", "application/json");

        if let Some(token) = &request.bearer {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        Ok(ApiResponse { status, body })
    }
}
