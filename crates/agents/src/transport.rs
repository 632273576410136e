//! Shared HTTP transport for both agent roles.
//!
//! Handles:
//! - JSON POSTs to the agent's chat endpoint with a per-call timeout
//! - Mapping every transport outcome to a single `AgentFailure` reason
//! - Bounded retry with exponential backoff for transient failures
//! - Readiness probes against the agent's health endpoint

use parley_core::{AgentFailure, AgentRole, FailureReason};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, warn};

use crate::retry::RetryPolicy;

/// Longest slice of an error body kept in failure details.
const MAX_ERROR_BODY: usize = 200;

/// An HTTP endpoint for one remote agent.
pub struct AgentTransport {
    role: AgentRole,
    base_url: String,
    chat_path: String,
    health_path: String,
    probe_timeout: Duration,
    retry: RetryPolicy,
    client: reqwest::Client,
}

impl AgentTransport {
    /// Create a transport. `call_timeout` bounds every chat round-trip.
    pub fn new(
        role: AgentRole,
        base_url: impl Into<String>,
        call_timeout: Duration,
    ) -> Result<Self, parley_core::Error> {
        let client = reqwest::Client::builder()
            .timeout(call_timeout)
            .build()
            .map_err(|e| parley_core::Error::Internal(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            role,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            chat_path: "/api/chat".into(),
            health_path: "/".into(),
            probe_timeout: Duration::from_secs(5),
            retry: RetryPolicy::none(),
            client,
        })
    }

    pub fn with_paths(mut self, chat_path: impl Into<String>, health_path: impl Into<String>) -> Self {
        self.chat_path = chat_path.into();
        self.health_path = health_path.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// POST `body` to the chat endpoint and decode the JSON reply.
    ///
    /// Retries connection errors and retryable statuses according to the
    /// policy. Timeouts are not retried: the per-call timeout is what bounds
    /// how long a stop request takes to quiesce the bridge loop.
    pub async fn post_json<B, R>(&self, body: &B) -> Result<R, AgentFailure>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(&self.chat_path);
        let mut attempt = 1;

        loop {
            debug!(role = %self.role, attempt, url = %url, "Sending agent request");

            let failure = match self.client.post(&url).json(body).send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response.json::<R>().await.map_err(|e| {
                            if e.is_timeout() {
                                AgentFailure::timeout(format!("{} reply body timed out", self.role))
                            } else {
                                AgentFailure::rejected(format!(
                                    "Failed to parse {} reply: {e}",
                                    self.role
                                ))
                            }
                        });
                    }

                    let error_body = response.text().await.unwrap_or_default();
                    let failure = AgentFailure::rejected(format!(
                        "{} returned {}: {}",
                        self.role,
                        status.as_u16(),
                        truncate(&error_body, MAX_ERROR_BODY)
                    ));
                    if !self.retry.is_retryable_status(status.as_u16()) {
                        return Err(failure);
                    }
                    failure
                }
                Err(e) => {
                    let failure = classify(self.role, &e);
                    if failure.reason != FailureReason::Unreachable {
                        return Err(failure);
                    }
                    failure
                }
            };

            if !self.retry.allows_another(attempt) {
                return Err(failure);
            }

            let backoff = self.retry.backoff(attempt);
            warn!(
                role = %self.role,
                attempt,
                max_attempts = self.retry.max_attempts(),
                backoff_ms = backoff.as_millis() as u64,
                error = %failure,
                "Agent request failed, retrying"
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    /// Readiness probe: `GET` the health endpoint, ready on `200 OK`.
    pub async fn probe(&self) -> bool {
        let url = self.url(&self.health_path);
        match self
            .client
            .get(&url)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(response) => {
                let ready = response.status() == reqwest::StatusCode::OK;
                if !ready {
                    debug!(role = %self.role, status = response.status().as_u16(), "Probe failed");
                }
                ready
            }
            Err(e) => {
                debug!(role = %self.role, error = %e, "Probe failed");
                false
            }
        }
    }
}

/// Map a reqwest error onto a failure reason.
fn classify(role: AgentRole, error: &reqwest::Error) -> AgentFailure {
    if error.is_timeout() {
        AgentFailure::timeout(format!("{role} did not answer in time: {error}"))
    } else if error.is_connect() || error.is_request() || error.is_body() {
        AgentFailure::unreachable(format!("Cannot reach {role}: {error}"))
    } else {
        AgentFailure::rejected(format!("{role} request failed: {error}"))
    }
}

/// Truncate to at most `max` characters, on a char boundary.
pub(crate) fn truncate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dead_url, spawn_server};
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::{get, post};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, serde::Deserialize)]
    struct Reply {
        response: String,
    }

    fn fast_retry(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(
            max_attempts,
            Duration::from_millis(5),
            Duration::from_millis(20),
            vec![429, 500, 502, 503, 504],
        )
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 4), "héll...");
        assert_eq!(truncate("short", 10), "short");
    }

    #[tokio::test]
    async fn retries_server_errors_then_succeeds() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/api/chat",
            post(move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        (StatusCode::SERVICE_UNAVAILABLE, "warming up".to_string())
                    } else {
                        (StatusCode::OK, r#"{"response":"ready"}"#.to_string())
                    }
                }
            }),
        );
        let base = spawn_server(router).await;

        let transport = AgentTransport::new(AgentRole::Responder, base, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry(3));

        let reply: Reply = transport.post_json(&serde_json::json!({})).await.unwrap();
        assert_eq!(reply.response, "ready");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/api/chat",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::TOO_MANY_REQUESTS
                }
            }),
        );
        let base = spawn_server(router).await;

        let transport = AgentTransport::new(AgentRole::Responder, base, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry(3));

        let err = transport
            .post_json::<_, Reply>(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::Rejected);
        assert!(err.detail.contains("429"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let router = Router::new().route(
            "/api/chat",
            post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    StatusCode::BAD_REQUEST
                }
            }),
        );
        let base = spawn_server(router).await;

        let transport = AgentTransport::new(AgentRole::Responder, base, Duration::from_secs(5))
            .unwrap()
            .with_retry(fast_retry(3));

        let err = transport
            .post_json::<_, Reply>(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::Rejected);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let transport =
            AgentTransport::new(AgentRole::Subject, dead_url().await, Duration::from_secs(2))
                .unwrap();

        let err = transport
            .post_json::<_, Reply>(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::Unreachable);
    }

    #[tokio::test]
    async fn slow_agent_times_out() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                r#"{"response":"late"}"#
            }),
        );
        let base = spawn_server(router).await;

        let transport =
            AgentTransport::new(AgentRole::Subject, base, Duration::from_millis(100)).unwrap();

        let err = transport
            .post_json::<_, Reply>(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::Timeout);
    }

    #[tokio::test]
    async fn malformed_reply_is_rejected() {
        let router = Router::new().route("/api/chat", post(|| async { "not json" }));
        let base = spawn_server(router).await;

        let transport =
            AgentTransport::new(AgentRole::Subject, base, Duration::from_secs(2)).unwrap();

        let err = transport
            .post_json::<_, Reply>(&serde_json::json!({}))
            .await
            .unwrap_err();
        assert_eq!(err.reason, FailureReason::Rejected);
    }

    #[tokio::test]
    async fn probe_reports_readiness() {
        let router = Router::new()
            .route("/api/status", get(|| async { "ok" }))
            .route("/broken", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let base = spawn_server(router).await;

        let healthy = AgentTransport::new(AgentRole::Subject, base.clone(), Duration::from_secs(2))
            .unwrap()
            .with_paths("/api/chat", "/api/status");
        assert!(healthy.probe().await);

        let broken = AgentTransport::new(AgentRole::Subject, base, Duration::from_secs(2))
            .unwrap()
            .with_paths("/api/chat", "/broken");
        assert!(!broken.probe().await);

        let dead = AgentTransport::new(AgentRole::Subject, dead_url().await, Duration::from_secs(2))
            .unwrap();
        assert!(!dead.probe().await);
    }
}
