//! OpenAI-compatible HTTP client with client-side rate limiting

use super::types::ApiError;
use crate::providers::{invalid_response, rate_limited, request_failed};
use parley_core::ParleyResult;
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Semaphore};
use tokio::time::Instant;

const PROVIDER: &str = "openai";
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// HTTP client shared by the chat model and the embedding provider.
///
/// Requests hold a semaphore permit and are spaced by at least
/// `60_000 / requests_per_minute` milliseconds.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    in_flight: Arc<Semaphore>,
    spacing: Duration,
    /// Earliest instant the next request may go out.
    next_slot: Mutex<Option<Instant>>,
}

impl OpenAiClient {
    pub fn new(api_key: impl Into<String>, requests_per_minute: u32) -> Self {
        let per_minute = u64::from(requests_per_minute.max(1));
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            in_flight: Arc::new(Semaphore::new(per_minute as usize)),
            spacing: Duration::from_millis((60_000 / per_minute).max(10)),
            next_slot: Mutex::new(None),
        }
    }

    /// Point the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// POST `body` to `endpoint` and decode the JSON response.
    pub async fn request<Req: Serialize, Res: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &Req,
    ) -> ParleyResult<Res> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("Rate limiter error: {}", e)))?;
        self.wait_for_slot().await;

        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!(%url, "Sending model request");
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| request_failed(PROVIDER, 0, format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let retry_after_ms = parse_retry_after_ms(response.headers()).unwrap_or(0);

        if status.is_success() {
            return response
                .json()
                .await
                .map_err(|e| invalid_response(PROVIDER, format!("Failed to parse response: {}", e)));
        }

        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        let error_msg = match serde_json::from_str::<ApiError>(&error_text) {
            Ok(api_error) => api_error.error.message,
            Err(_) => error_text,
        };
        tracing::warn!(status = status.as_u16(), error = %error_msg, "Model request failed");

        Err(match status {
            StatusCode::TOO_MANY_REQUESTS => rate_limited(PROVIDER, retry_after_ms),
            _ => request_failed(PROVIDER, status.as_u16() as i32, error_msg),
        })
    }
}

impl OpenAiClient {
    async fn wait_for_slot(&self) {
        let mut next_slot = self.next_slot.lock().await;
        if let Some(at) = *next_slot {
            if at > Instant::now() {
                tracing::trace!(
                    wait_ms = at.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "Throttling model request"
                );
                tokio::time::sleep_until(at).await;
            }
        }
        *next_slot = Some(Instant::now() + self.spacing);
    }
}

fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<i64> {
    headers
        .get("retry-after")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<f64>().ok())
        .map(|seconds| (seconds * 1000.0) as i64)
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"[REDACTED]")
            .field("spacing", &self.spacing)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::{HeaderMap, HeaderValue};

    #[test]
    fn test_retry_after_seconds_become_millis() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("1.5"));
        assert_eq!(parse_retry_after_ms(&headers), Some(1500));
        assert_eq!(parse_retry_after_ms(&HeaderMap::new()), None);
    }

    #[test]
    fn test_debug_redacts_key() {
        let client = OpenAiClient::new("sk-secret", 60).with_base_url("http://localhost:8080/v1/");
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("sk-secret"));
        assert_eq!(client.base_url(), "http://localhost:8080/v1");
    }

    #[test]
    fn test_interval_derived_from_rpm() {
        assert_eq!(OpenAiClient::new("k", 60).spacing, Duration::from_secs(1));
        assert_eq!(OpenAiClient::new("k", 0).spacing, Duration::from_secs(60));
        assert_eq!(OpenAiClient::new("k", 100_000).spacing, Duration::from_millis(10));
    }
}
