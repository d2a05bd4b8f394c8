use crate::redact::redact_secrets;
use crate::state::TokenStore;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const CLIENT_USER_AGENT: &str = concat!("loyalbridge-console/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
        }
    }
}

#[derive(Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    /// Path relative to the API base, including any query string.
    pub path: String,
    pub bearer: Option<String>,
    pub body: Option<Value>,
}

impl fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpRequest")
            .field("method", &self.method)
            .field("path", &self.path)
            .field("bearer", &self.bearer.as_ref().map(|_| "[PROTECTED]"))
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct TransportError {
    pub message: String,
}

/// Raw HTTP exchange, below envelope parsing.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

fn build_headers(bearer: Option<&str>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));
    if let Some(token) = bearer {
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {token}")) {
            headers.insert(AUTHORIZATION, value);
        }
    }
    headers
}

fn network_message(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Request timed out.".to_string()
    } else if err.is_connect() {
        "Unable to reach the server.".to_string()
    } else {
        redact_secrets(&err.to_string()).to_string()
    }
}

pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::transport(network_message(&e)))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
        };

        let mut builder = self
            .http
            .request(method, self.url(&request.path))
            .headers(build_headers(request.bearer.as_deref()));
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let res = builder.send().await.map_err(|e| TransportError {
            message: network_message(&e),
        })?;
        let status = res.status().as_u16();
        let body = res.text().await.map_err(|e| TransportError {
            message: network_message(&e),
        })?;
        Ok(HttpResponse { status, body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorKind {
    /// The request never produced an HTTP response.
    Transport,
    /// Non-2xx status.
    Http,
    /// 2xx with `success: false`.
    Rejected,
    /// Body did not match the expected shape.
    Decode,
}

/// The one error shape every backend call reports.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    pub kind: ApiErrorKind,
}

impl ApiError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            kind: ApiErrorKind::Transport,
        }
    }

    fn decode(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
            kind: ApiErrorKind::Decode,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == Some(401)
    }
}

/// Result of one backend read, as a value.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiOutcome<T> {
    Ok { data: T },
    Failed { message: String, status: Option<u16> },
}

impl<T> From<Result<T, ApiError>> for ApiOutcome<T> {
    fn from(result: Result<T, ApiError>) -> Self {
        match result {
            Ok(data) => Self::Ok { data },
            Err(err) => Self::Failed {
                message: err.message,
                status: err.status,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ApiEnvelope {
    fn failure_message(&self) -> Option<String> {
        [self.error.as_deref(), self.message.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|s| !s.is_empty())
            .map(str::to_string)
    }
}

#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: HttpMethod,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: HttpMethod::Get,
            body: None,
        }
    }

    pub fn with_body<B: Serialize>(method: HttpMethod, body: &B) -> Result<Self, ApiError> {
        let body = serde_json::to_value(body).map_err(|e| ApiError {
            message: format!("failed to encode request body: {e}"),
            status: None,
            kind: ApiErrorKind::Decode,
        })?;
        Ok(Self {
            method,
            body: Some(body),
        })
    }

    pub fn empty(method: HttpMethod) -> Self {
        Self { method, body: None }
    }
}

/// Single chokepoint for backend calls: attaches the stored bearer token and
/// normalizes every failure into [`ApiError`].
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    tokens: TokenStore,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn HttpTransport>, tokens: TokenStore) -> Self {
        Self { transport, tokens }
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Result<T, ApiError> {
        let bearer = self.tokens.access_token().await;
        let method = options.method;
        debug!(method = method.as_str(), path, authenticated = bearer.is_some(), "api request");

        let response = self
            .transport
            .send(HttpRequest {
                method,
                path: path.to_string(),
                bearer,
                body: options.body,
            })
            .await
            .map_err(|e| ApiError::transport(e.message))?;

        let result = parse_envelope(response);
        if let Err(err) = &result {
            debug!(
                method = method.as_str(),
                path,
                status = ?err.status,
                error = %redact_secrets(&err.message),
                "api request failed"
            );
        }
        result
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(path, RequestOptions::get()).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(path, RequestOptions::with_body(HttpMethod::Post, body)?)
            .await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(path, RequestOptions::empty(HttpMethod::Post))
            .await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.request(path, RequestOptions::with_body(HttpMethod::Put, body)?)
            .await
    }

    pub async fn patch_empty<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.request(path, RequestOptions::empty(HttpMethod::Patch))
            .await
    }
}

fn parse_envelope<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    let status = response.status;
    let envelope = serde_json::from_str::<ApiEnvelope>(&response.body);

    if !(200..300).contains(&status) {
        let message = envelope
            .ok()
            .and_then(|e| e.failure_message())
            .unwrap_or_else(|| format!("HTTP error! status: {status}"));
        return Err(ApiError {
            message,
            status: Some(status),
            kind: ApiErrorKind::Http,
        });
    }

    let envelope = envelope
        .map_err(|e| ApiError::decode(status, format!("invalid response body: {e}")))?;
    if !envelope.success {
        return Err(ApiError {
            message: envelope
                .failure_message()
                .unwrap_or_else(|| "The server could not complete the request.".to_string()),
            status: Some(status),
            kind: ApiErrorKind::Rejected,
        });
    }

    serde_json::from_value(envelope.data.unwrap_or(Value::Null))
        .map_err(|e| ApiError::decode(status, format!("unexpected response data: {e}")))
}
