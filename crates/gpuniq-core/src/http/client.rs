//! Authenticated transport and the retrying client built on it
//!
//! [`HttpTransport`] performs exactly one network call per invocation.
//! [`Client`] wraps it with the configured [`RetryPolicy`](crate::http::RetryPolicy)
//! and decodes payloads into typed results.

use std::sync::Arc;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client as ReqwestClient, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::{ClientConfig, Credentials};
use crate::error::{Error, Result};
use crate::http::auth::{ApiKeyAuth, AuthHandler};
use crate::http::envelope::ApiResponse;
use crate::http::error::ErrorClassifier;
use crate::http::request::{ApiRequest, Query, RequestBody};
use crate::http::retry::execute_with_retry;
use crate::http::timeout::{effective_timeout, with_timeout};

const USER_AGENT: &str = concat!("gpuniq-rust/", env!("CARGO_PKG_VERSION"));

/// Single-shot authenticated HTTP transport
pub struct HttpTransport {
    client: ReqwestClient,
    credentials: Arc<Credentials>,
    auth_handler: Arc<dyn AuthHandler>,
    classifier: ErrorClassifier,
}

impl HttpTransport {
    /// Create a transport for the given credentials
    pub fn new(credentials: Arc<Credentials>, classifier: ErrorClassifier) -> Result<Self> {
        let client = ReqwestClient::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(credentials.timeout())
            .build()
            .map_err(|e| Error::configuration(format!("Failed to create HTTP client: {}", e)))?;

        let auth_handler: Arc<dyn AuthHandler> = Arc::new(ApiKeyAuth::new(credentials.clone()));

        Ok(Self {
            client,
            credentials,
            auth_handler,
            classifier,
        })
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Build the reqwest request for a descriptor
    fn build_request(&self, request: &ApiRequest) -> Result<reqwest::Request> {
        let url = self.credentials.endpoint(&request.path)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        self.auth_handler.apply_auth(&mut headers)?;

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .headers(headers);

        if !request.query.is_empty() {
            builder = builder.query(&request.query.pairs());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(body) => builder.json(body),
            RequestBody::Bytes(bytes) => builder
                .header(CONTENT_TYPE, "application/octet-stream")
                .body(bytes.clone()),
        };

        builder.build().map_err(|e| {
            Error::configuration(format!("Failed to build request for {}: {}", request.path, e))
        })
    }

    /// Issue the call and return the raw response, whatever its status
    async fn dispatch(&self, request: &ApiRequest) -> Result<Response> {
        let http_request = self.build_request(request)?;
        debug!(method = %request.method, path = %request.path, "Sending request");

        self.client
            .execute(http_request)
            .await
            .map_err(|e| map_request_error(e, request, self.credentials.timeout()))
    }

    /// One call: classify failures, parse the JSON body of successes
    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse> {
        let timeout = effective_timeout(self.credentials.timeout(), request.timeout);

        with_timeout(
            async {
                let response = self.dispatch(request).await?;
                let status = response.status();
                let headers = response.headers().clone();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| map_request_error(e, request, timeout))?;

                debug!(path = %request.path, status = status.as_u16(), "Received response");

                if !status.is_success() {
                    return Err(self.classifier.classify(status, &headers, &bytes, &request.path));
                }

                let body = if bytes.iter().all(u8::is_ascii_whitespace) {
                    Value::Null
                } else {
                    serde_json::from_slice::<Value>(&bytes).map_err(|e| {
                        Error::decode(
                            format!("Failed to parse response as JSON: {}", e),
                            Some(status.as_u16()),
                        )
                    })?
                };

                Ok(ApiResponse {
                    status,
                    headers,
                    body,
                })
            },
            timeout,
            &request.path,
        )
        .await
    }

    /// One call whose body is consumed as a stream by the caller.
    ///
    /// The deadline covers the response head only, so large downloads are not
    /// cut off by the per-call timeout.
    pub async fn open_stream(&self, request: &ApiRequest) -> Result<Response> {
        let timeout = effective_timeout(self.credentials.timeout(), request.timeout);

        with_timeout(
            async {
                let response = self.dispatch(request).await?;
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let headers = response.headers().clone();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| map_request_error(e, request, timeout))?;
                Err(self.classifier.classify(status, &headers, &bytes, &request.path))
            },
            timeout,
            &request.path,
        )
        .await
    }
}

fn map_request_error(error: reqwest::Error, request: &ApiRequest, timeout: std::time::Duration) -> Error {
    if error.is_timeout() {
        return Error::Timeout {
            path: request.path.clone(),
            timeout,
        };
    }

    Error::Network {
        message: format!("{} {} failed: {}", request.method, request.path, error),
        source: anyhow::Error::new(error),
    }
}

/// GPUniq API client: transport plus rate-limit retries.
///
/// Cheap to clone; clones share the connection pool and the immutable
/// credentials. Per-call state lives in the request descriptor only.
#[derive(Clone)]
pub struct Client {
    transport: Arc<HttpTransport>,
    config: ClientConfig,
}

impl Client {
    /// Create a client from a validated configuration
    pub fn new(config: ClientConfig) -> Result<Self> {
        let classifier = ErrorClassifier::new(config.retry_policy.rate_limit_fallback);
        let transport = HttpTransport::new(config.credentials.clone(), classifier)?;

        Ok(Self {
            transport: Arc::new(transport),
            config,
        })
    }

    /// Create a client with default settings for an API key
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self> {
        Self::new(ClientConfig::new(api_key)?)
    }

    /// Create a client from `GPUNIQ_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn credentials(&self) -> &Credentials {
        self.transport.credentials()
    }

    /// Execute a request with retry, returning the raw envelope
    pub async fn call(&self, request: &ApiRequest) -> Result<ApiResponse> {
        execute_with_retry(
            || self.transport.send(request),
            &self.config.retry_policy,
            self.config.sleeper.as_ref(),
        )
        .await
    }

    /// Execute a request with retry and decode the unwrapped payload
    pub async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.call(&request).await?.decode()
    }

    /// Open a streaming response with retry on the response head
    pub async fn open_stream(&self, request: &ApiRequest) -> Result<Response> {
        execute_with_retry(
            || self.transport.open_stream(request),
            &self.config.retry_policy,
            self.config.sleeper.as_ref(),
        )
        .await
    }

    /// GET with query parameters
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: Query) -> Result<T> {
        self.send(ApiRequest::get(path).with_query(query)).await
    }

    /// POST without a body
    pub async fn post<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::post(path)).await
    }

    /// POST with a JSON body
    pub async fn post_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::post(path).with_json(body)?).await
    }

    /// PUT with a JSON body
    pub async fn put_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::put(path).with_json(body)?).await
    }

    /// PATCH with a JSON body
    pub async fn patch_json<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T> {
        self.send(ApiRequest::patch(path).with_json(body)?).await
    }

    /// DELETE
    pub async fn delete<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.send(ApiRequest::delete(path)).await
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client").field("config", &self.config).finish()
    }
}
