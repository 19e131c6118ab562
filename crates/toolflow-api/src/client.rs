//! Shared HTTP client for the streaming provider APIs.

use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Serialize;
use toolflow_types::ApiError;

use crate::retry::{RetryConfig, is_retryable};
use crate::stream::SseStream;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client that opens SSE responses with retry on transient failures.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    retry_config: RetryConfig,
}

impl ApiClient {
    pub fn new() -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        Ok(Self {
            http,
            retry_config: RetryConfig::default(),
        })
    }

    /// Set the retry configuration for transient errors (429, 529, 5xx, network).
    pub fn with_retry_config(mut self, config: RetryConfig) -> Self {
        self.retry_config = config;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry_config
    }

    /// POST a JSON body and return the response as a stream of SSE events.
    pub async fn open_sse<T: Serialize + Sync>(
        &self,
        url: &str,
        mut headers: HeaderMap,
        body: &T,
    ) -> Result<SseStream, ApiError> {
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));

        let body = serde_json::to_string(body).map_err(|e| ApiError::BadRequest {
            message: format!("Failed to serialize request: {e}"),
        })?;

        let max_retries = self.retry_config.max_retries;
        let mut attempt = 0;
        loop {
            tracing::debug!("POST {url} (attempt {}/{})", attempt + 1, max_retries + 1);

            let result = self
                .http
                .post(url)
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            let (err, retry_after) = match result {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(SseStream::new(response.bytes_stream()));
                    }
                    let retry_after = parse_retry_after(response.headers());
                    let body_text = response.text().await.unwrap_or_default();
                    (
                        classify_error(status.as_u16(), &body_text, retry_after),
                        retry_after,
                    )
                }
                Err(e) if e.is_timeout() => (ApiError::Timeout, None),
                Err(e) => (ApiError::Network(e.to_string()), None),
            };

            if !is_retryable(&err) || attempt >= max_retries {
                return Err(err);
            }

            let delay = self.retry_config.delay_for(attempt, retry_after);
            tracing::warn!(
                "Retryable API error (attempt {}/{}): {err}. Retrying in {delay}ms...",
                attempt + 1,
                max_retries,
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }
}

/// Header value helper for credentials.
pub(crate) fn secret_header(value: &str) -> Result<HeaderValue, ApiError> {
    let mut header = HeaderValue::from_str(value).map_err(|_| ApiError::Auth {
        message: "Invalid API key format".into(),
    })?;
    header.set_sensitive(true);
    Ok(header)
}

/// Strip trailing slashes so paths can be appended with a leading `/`.
pub(crate) fn trim_base(url: &str) -> &str {
    url.trim_end_matches('/')
}

/// Parse the `retry-after` header value as seconds and convert to milliseconds.
fn parse_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse::<f64>().ok())
        .map(|secs| (secs * 1000.0) as u64)
}

/// Classify an HTTP error response into a typed ApiError.
///
/// All three providers wrap failures as `{"error": {"message": ...}}`.
fn classify_error(status: u16, body: &str, retry_after: Option<u64>) -> ApiError {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        error: Option<ErrorDetail>,
    }
    #[derive(serde::Deserialize)]
    struct ErrorDetail {
        message: Option<String>,
    }

    let message = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .and_then(|e| e.message)
        .unwrap_or_else(|| body.to_string());

    match status {
        401 | 403 => ApiError::Auth { message },
        400 | 404 | 422 => ApiError::BadRequest { message },
        429 => ApiError::RateLimited {
            retry_after_ms: retry_after,
        },
        529 => ApiError::Overloaded,
        _ => ApiError::Server { status, message },
    }
}
