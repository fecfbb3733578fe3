use async_trait::async_trait;
use log::{debug, trace};
use reqwest::{Client, Method, header};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use crate::constants::HEADER_REQUEST_ID;
use crate::error::{AppError, AppResult};

/// An outbound API call. It is cheap to clone, so the response pipeline can
/// re-issue the exact original request.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/api/courses`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Bearer credential attached by the request pipeline.
    pub bearer: Option<String>,
    /// Bypass credential handling (login, register, health checks).
    pub skip_auth: bool,
    pub request_id: String,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            bearer: None,
            skip_auth: false,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    pub fn head(path: impl Into<String>) -> Self {
        Self::new(Method::HEAD, path)
    }

    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> AppResult<Self> {
        self.body = Some(serde_json::to_value(body)?);
        Ok(self)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn without_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn with_bearer(mut self, token: impl Into<String>) -> Self {
        self.bearer = Some(token.into());
        self
    }
}

/// A completed HTTP exchange, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json<T: serde::de::DeserializeOwned>(&self) -> AppResult<T> {
        serde_json::from_str(&self.body).map_err(|e| {
            AppError::InvalidResponse(format!(
                "Failed to parse response (HTTP {}): {}",
                self.status, e
            ))
        })
    }
}

/// The generic transport wrapped by the session pipelines.
///
/// Implementations return `Ok` for every response that arrived, including
/// 4xx/5xx, and `Err(AppError::NetworkError)` when none did.
#[async_trait]
pub trait HttpTransport: Send + Sync + std::fmt::Debug {
    async fn execute(&self, request: &ApiRequest) -> AppResult<ApiResponse>;
}

pub fn create_http_client(timeout: Duration) -> AppResult<Client> {
    Client::builder()
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .timeout(timeout)
        .build()
        .map_err(|e| AppError::ConfigError(format!("Failed to build HTTP client: {}", e)))
}

/// `reqwest`-backed transport rooted at the API base URL.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> AppResult<Self> {
        Ok(Self {
            http_client: create_http_client(timeout)?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url_for(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: &ApiRequest) -> AppResult<ApiResponse> {
        let url = self.url_for(&request.path);
        debug!("{} {} [{}]", request.method, url, request.request_id);

        let mut builder = self
            .http_client
            .request(request.method.clone(), &url)
            .header(header::ACCEPT, "application/json")
            .header(HEADER_REQUEST_ID, &request.request_id);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(|e| {
            AppError::NetworkError(format!("{} {} failed: {}", request.method, request.path, e))
        })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| {
            AppError::NetworkError(format!("Failed to read response body: {}", e))
        })?;
        trace!("{} {} -> {} ({} bytes)", request.method, request.path, status, body.len());

        Ok(ApiResponse { status, body })
    }
}
