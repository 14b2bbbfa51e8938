//! Single-request transport with bounded retry.
//!
//! [`Fetcher`] retries connection failures, timeouts, and transient statuses
//! (5xx and 429 by default) with the configured [`Backoff`](crate::Backoff).
//! Any other response, including every non-rate-limit 4xx, is returned to the
//! caller unchanged: a 4xx is a negotiation signal, not a fault. Retry state
//! lives on the stack of each call.

use std::sync::Arc;

use thiserror::Error;

use crate::http_client::{HttpAuth, HttpClient, HttpMethod, HttpRequest, HttpResponse};
use crate::retry::RetryConfig;

/// Terminal failure of a single logical request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// Connection failures, timeouts, or transient statuses persisted through every attempt.
    #[error("transient network failure after {attempts} attempt(s): {message}")]
    TransientNetwork {
        attempts: u32,
        /// Last transient status observed, when the failure was a response.
        status: Option<u16>,
        message: String,
    },

    /// A transport failure that retrying cannot fix (malformed URL, TLS setup).
    #[error("transport error: {message}")]
    Transport { message: String },
}

impl FetchError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::TransientNetwork { .. } => "fetch.transient_network",
            Self::Transport { .. } => "fetch.transport",
        }
    }
}

/// Issues HTTP requests against one deployment with automatic retry.
#[derive(Clone)]
pub struct Fetcher {
    http_client: Arc<dyn HttpClient>,
    auth: HttpAuth,
    retry: RetryConfig,
    timeout_ms: u64,
}

impl Fetcher {
    pub fn new(http_client: Arc<dyn HttpClient>, auth: HttpAuth) -> Self {
        Self {
            http_client,
            auth,
            retry: RetryConfig::default(),
            timeout_ms: 15_000,
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Hard per-attempt timeout.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms.max(1);
        self
    }

    /// Send one logical request, re-issuing it identically on transient failure.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::TransientNetwork`] once every attempt has failed
    /// transiently, or [`FetchError::Transport`] for non-retryable transport errors.
    pub async fn fetch(
        &self,
        method: HttpMethod,
        url: &str,
        payload: Option<&serde_json::Value>,
    ) -> Result<HttpResponse, FetchError> {
        let max_attempts = self.retry.max_attempts();
        let mut request = HttpRequest::new(method, url)
            .with_header("accept", "application/json")
            .with_auth(&self.auth)
            .with_timeout_ms(self.timeout_ms);
        if let Some(payload) = payload {
            request = request.with_json_body(payload);
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            let has_attempts_left = attempt < max_attempts;

            match self.http_client.execute(request.clone()).await {
                Ok(response) if self.retry.should_retry_status(response.status) => {
                    if !has_attempts_left {
                        tracing::warn!(
                            %method, url, attempt, max_attempts, status = response.status,
                            "transient status persisted; giving up"
                        );
                        return Err(FetchError::TransientNetwork {
                            attempts: attempt,
                            status: Some(response.status),
                            message: format!(
                                "upstream returned status {}: {}",
                                response.status,
                                response.body_excerpt()
                            ),
                        });
                    }
                    tracing::warn!(
                        %method, url, attempt, max_attempts, status = response.status,
                        "transient status; retrying"
                    );
                }
                Ok(response) => {
                    tracing::debug!(
                        %method, url, attempt, max_attempts, status = response.status,
                        "request completed"
                    );
                    return Ok(response);
                }
                Err(error) if self.retry.should_retry_error(&error) => {
                    if !has_attempts_left {
                        tracing::warn!(
                            %method, url, attempt, max_attempts, error = %error,
                            "transport failure persisted; giving up"
                        );
                        return Err(FetchError::TransientNetwork {
                            attempts: attempt,
                            status: None,
                            message: error.message().to_owned(),
                        });
                    }
                    tracing::warn!(
                        %method, url, attempt, max_attempts, error = %error,
                        "transport failure; retrying"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        %method, url, attempt, max_attempts, error = %error,
                        "non-retryable transport failure"
                    );
                    return Err(FetchError::Transport {
                        message: error.message().to_owned(),
                    });
                }
            }

            let delay = self.retry.delay_for_attempt(attempt - 1);
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpError;
    use crate::testing::ScriptedHttpClient;
    use std::time::Duration;

    fn fetcher(client: Arc<ScriptedHttpClient>, max_retries: u32) -> Fetcher {
        Fetcher::new(client, HttpAuth::basic("dev", "token"))
            .with_retry(RetryConfig::fixed(Duration::ZERO, max_retries))
    }

    #[tokio::test]
    async fn retries_until_success() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(503, "")),
            Ok(HttpResponse::ok_json(r#"{"ok":true}"#)),
        ]));

        let response = fetcher(client.clone(), 4)
            .fetch(HttpMethod::Get, "https://jira.example.test/x", None)
            .await
            .expect("second attempt succeeds");

        assert_eq!(response.status, 200);
        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_returned_without_retry() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Ok(HttpResponse::new(
            404,
            "not here",
        ))]));

        let response = fetcher(client.clone(), 4)
            .fetch(HttpMethod::Post, "https://jira.example.test/x", None)
            .await
            .expect("4xx is a response, not an error");

        assert_eq!(response.status, 404);
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn rate_limit_is_retried() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Ok(HttpResponse::new(429, "slow down")),
            Ok(HttpResponse::ok_json("{}")),
        ]));

        fetcher(client.clone(), 4)
            .fetch(HttpMethod::Get, "https://jira.example.test/x", None)
            .await
            .expect("retry after rate limit");

        assert_eq!(client.request_count(), 2);
    }

    #[tokio::test]
    async fn non_retryable_transport_error_is_terminal_immediately() {
        let client = Arc::new(ScriptedHttpClient::new(vec![Err(HttpError::request(
            "relative URL without a base",
        ))]));

        let error = fetcher(client.clone(), 4)
            .fetch(HttpMethod::Get, "not-a-url", None)
            .await
            .expect_err("must fail");

        assert!(matches!(error, FetchError::Transport { .. }));
        assert_eq!(client.request_count(), 1);
    }

    #[tokio::test]
    async fn every_attempt_carries_auth_and_payload() {
        let client = Arc::new(ScriptedHttpClient::new(vec![
            Err(HttpError::timeout("timed out")),
            Ok(HttpResponse::ok_json("{}")),
        ]));
        let payload = serde_json::json!({"jql": "sprint = 3"});

        fetcher(client.clone(), 2)
            .with_timeout_ms(2_500)
            .fetch(HttpMethod::Post, "https://jira.example.test/search", Some(&payload))
            .await
            .expect("succeeds after timeout");

        let requests = client.recorded_requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
        assert_eq!(requests[1].timeout_ms, 2_500);
        assert!(requests[1].headers.contains_key("authorization"));
        assert_eq!(requests[1].body.as_deref(), Some(r#"{"jql":"sprint = 3"}"#));
    }
}
