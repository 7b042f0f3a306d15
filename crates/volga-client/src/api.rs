//! Authenticated control API client with retry, backoff and timeout.
//!
//! [`ApiClient`] is the single place requests leave the process. Every call
//! merges the caller's parameters with the fixed credential fields, bounds
//! the attempt with a timeout, and retries transient transport failures with
//! a linearly increasing delay. HTTP-level and application-level errors are
//! never retried — they are deterministic and surface immediately.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, error, warn};

use volga_core::{ApiError, ApiResult, ApiSender, Params};

/// Default control API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.vk.com/method";

/// Default protocol version sent with every request.
pub const DEFAULT_API_VERSION: &str = "5.199";

fn empty_object() -> Value {
    Value::Object(Map::new())
}

pub(crate) fn map_transport(error: reqwest::Error) -> ApiError {
    if error.is_timeout() {
        ApiError::Timeout
    } else {
        ApiError::Network(error.to_string())
    }
}

/// Authenticated HTTP client for the control API.
///
/// Cheap to share behind an `Arc`; the underlying connection pool is reused
/// across calls, including the long-poll GETs issued through [`http`].
///
/// [`http`]: ApiClient::http
pub struct ApiClient {
    http: Client,
    access_token: String,
    api_version: String,
    base_url: String,
    timeout: Duration,
    max_retries: u32,
    retry_delay: Duration,
}

impl ApiClient {
    /// Creates a client with default endpoint, version and retry policy.
    ///
    /// The reqwest client deliberately carries no global timeout: the
    /// long-poll GET holds its connection far longer than a control call, so
    /// timeouts are applied per request instead.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.into(),
            api_version: DEFAULT_API_VERSION.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 3,
            retry_delay: Duration::from_secs(1),
        }
    }

    /// Overrides the API base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Overrides the protocol version field.
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Overrides the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overrides the maximum number of attempts for transient failures.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Overrides the base backoff delay (attempt N sleeps `N * delay`).
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// The shared HTTP client, for requests outside the control API
    /// (the long-poll GET).
    pub fn http(&self) -> &Client {
        &self.http
    }

    /// Calls an API method with form-encoded parameters.
    ///
    /// The caller's `params` are merged with `access_token` and `v` into a
    /// fresh vector; the original is never mutated. On success the inner
    /// `response` payload is returned, or an empty object when absent.
    pub async fn request(&self, method: &str, params: &Params) -> ApiResult<Value> {
        let mut form = params.clone();
        form.push(("access_token".into(), self.access_token.clone()));
        form.push(("v".into(), self.api_version.clone()));

        let url = format!("{}/{}", self.base_url, method);
        let mut attempt = 1u32;

        loop {
            match self.attempt(&url, &form).await {
                Ok(value) => {
                    debug!(method, attempt, "API request succeeded");
                    return Ok(value);
                }
                Err(err) if err.is_transient() && attempt < self.max_retries => {
                    warn!(method, attempt, error = %err, "API request attempt failed, retrying");
                    tokio::time::sleep(self.retry_delay * attempt).await;
                    attempt += 1;
                }
                Err(err) => {
                    if err.is_transient() {
                        error!(method, attempts = attempt, error = %err, "Max retries reached");
                    } else {
                        error!(method, error = %err, "API request failed");
                    }
                    return Err(err);
                }
            }
        }
    }

    /// One bounded request/decode attempt.
    async fn attempt(&self, url: &str, form: &Params) -> ApiResult<Value> {
        let body: Value = tokio::time::timeout(self.timeout, async {
            let response = self
                .http
                .post(url)
                .form(form)
                .send()
                .await
                .map_err(map_transport)?;

            let status = response.status();
            if !status.is_success() {
                return Err(ApiError::Http {
                    status: status.as_u16(),
                    reason: status.canonical_reason().unwrap_or("unknown").to_string(),
                });
            }

            response
                .json()
                .await
                .map_err(|e| ApiError::Json(e.to_string()))
        })
        .await
        .map_err(|_| ApiError::Timeout)??;

        if let Some(envelope) = body.get("error") {
            return Err(ApiError::Api {
                code: envelope
                    .get("error_code")
                    .and_then(Value::as_i64)
                    .unwrap_or(-1),
                message: envelope
                    .get("error_msg")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
            });
        }

        Ok(body.get("response").cloned().unwrap_or_else(empty_object))
    }

    /// Resolves a full message record via `messages.getById`.
    ///
    /// Returns an empty object when the message is not found.
    pub async fn fetch_message(&self, message_id: i64) -> ApiResult<Value> {
        let params: Params = vec![
            ("message_ids".into(), message_id.to_string()),
            ("extended".into(), "1".into()),
        ];
        let response = self.request("messages.getById", &params).await?;

        Ok(response
            .get("items")
            .and_then(Value::as_array)
            .and_then(|items| items.first())
            .cloned()
            .unwrap_or_else(empty_object))
    }
}

#[async_trait]
impl ApiSender for ApiClient {
    async fn send(&self, method: &str, params: &Params) -> ApiResult<Value> {
        self.request(method, params).await
    }

    async fn fetch_message(&self, message_id: i64) -> ApiResult<Value> {
        Self::fetch_message(self, message_id).await
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}
