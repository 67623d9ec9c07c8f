use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::error::ApiError;

/// Control-plane API client. Every call is a single attempt; retries,
/// backoff and cancellation belong to the reconciliation engine.
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    base_url: String,
    auth_header: String,
    request_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub request_timeout: Duration,
    pub connection_timeout: Duration,
    pub idle_timeout: Duration,
    pub max_idle_connections: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            connection_timeout: Duration::from_secs(10),
            idle_timeout: Duration::from_secs(90),
            max_idle_connections: 10,
        }
    }
}

/// Error body returned by the control plane on 4xx/5xx
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl Client {
    /// Create a new API client with default configuration
    pub fn new(endpoint: &str, token: &str) -> Result<Self, ApiError> {
        Self::with_config(endpoint, token, ClientConfig::default())
    }

    pub fn with_config(endpoint: &str, token: &str, config: ClientConfig) -> Result<Self, ApiError> {
        let parsed =
            url::Url::parse(endpoint).map_err(|e| ApiError::InvalidEndpoint(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ApiError::InvalidEndpoint(format!(
                "unsupported scheme '{}'",
                parsed.scheme()
            )));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .connect_timeout(config.connection_timeout)
            .pool_idle_timeout(config.idle_timeout)
            .pool_max_idle_per_host(config.max_idle_connections)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                base_url: endpoint.trim_end_matches('/').to_string(),
                auth_header: format!("Bearer {}", token),
                request_timeout: config.request_timeout,
            }),
        })
    }

    /// SNS platform application operations
    pub fn sns(&self) -> crate::api::sns::SnsApi<'_> {
        crate::api::sns::SnsApi::new(self)
    }

    /// EC2 VPC endpoint operations
    pub fn ec2(&self) -> crate::api::ec2::Ec2Api<'_> {
        crate::api::ec2::Ec2Api::new(self)
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.execute::<T, ()>(Method::GET, path, None).await
    }

    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::POST, path, Some(body)).await
    }

    pub async fn put<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::PUT, path, Some(body)).await
    }

    pub async fn patch<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.execute(Method::PATCH, path, Some(body)).await
    }

    /// Any response body is accepted and discarded
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.execute::<IgnoredAny, ()>(Method::DELETE, path, None)
            .await
            .map(|_| ())
    }

    async fn execute<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.inner.base_url, path);
        tracing::debug!("{} request to: {}", method, url);

        let mut request = self
            .inner
            .http_client
            .request(method, &url)
            .header(AUTHORIZATION, &self.inner.auth_header);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| self.transport_error(e))?;

        if response.status().is_success() {
            self.parse_success_response(response).await
        } else {
            Err(self.handle_error_response(response, path).await)
        }
    }

    fn transport_error(&self, e: reqwest::Error) -> ApiError {
        if e.is_timeout() {
            ApiError::Timeout(self.inner.request_timeout)
        } else if e.is_connect() {
            ApiError::ServiceUnavailable {
                status: 0,
                message: e.to_string(),
            }
        } else {
            ApiError::RequestError(e)
        }
    }

    async fn parse_success_response<T: DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, ApiError> {
        let text = response.text().await.map_err(|e| self.transport_error(e))?;
        tracing::debug!("API response body: {}", text);

        // Empty bodies (e.g. DELETE) decode as null
        let body = if text.trim().is_empty() { "null" } else { &text };
        serde_json::from_str::<T>(body).map_err(|e| {
            tracing::error!("Failed to deserialize response: {}, body: {}", e, text);
            ApiError::ParseError(format!("Failed to parse response: {}", e))
        })
    }

    async fn handle_error_response(&self, response: reqwest::Response, path: &str) -> ApiError {
        let status = response.status();
        let text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let body = serde_json::from_str::<ErrorBody>(&text).ok();
        let message = body
            .as_ref()
            .and_then(|b| b.message.clone())
            .unwrap_or_else(|| text.clone());

        tracing::debug!("API error response ({}): {}", status, text);

        match status.as_u16() {
            404 => ApiError::NotFound(path.to_string()),
            401 | 403 => ApiError::AuthError,
            429 => ApiError::RateLimited,
            code if status.is_server_error() => ApiError::ServiceUnavailable {
                status: code,
                message,
            },
            code => ApiError::ApiError {
                status: code,
                code: body
                    .and_then(|b| b.code)
                    .unwrap_or_else(|| format!("HTTP{}", code)),
                message,
            },
        }
    }
}
