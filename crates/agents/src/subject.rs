//! HTTP client for the Subject agent.
//!
//! Wire format: `POST {message, callerId}` → `{response, auxiliaryMetrics?}`.
//! Older Subject builds report their state signals as `emotions`; both keys
//! are accepted. Non-numeric metric values are dropped.

use async_trait::async_trait;
use parley_config::SubjectConfig;
use parley_core::{AgentFailure, AgentReply, AgentRole, ConverseRequest, Metrics, RemoteAgent};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::retry::RetryPolicy;
use crate::transport::{AgentTransport, truncate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SubjectRequest<'a> {
    message: &'a str,
    caller_id: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubjectResponse {
    #[serde(default)]
    response: String,

    #[serde(default, alias = "emotions")]
    auxiliary_metrics: Option<BTreeMap<String, serde_json::Value>>,
}

/// The Subject side of the bridge.
pub struct HttpSubjectClient {
    transport: AgentTransport,
    caller_id: String,
}

impl HttpSubjectClient {
    pub fn new(transport: AgentTransport, caller_id: impl Into<String>) -> Self {
        Self {
            transport,
            caller_id: caller_id.into(),
        }
    }

    /// Build from the `[subject]` config section.
    pub fn from_config(
        config: &SubjectConfig,
        probe_timeout: Duration,
    ) -> Result<Self, parley_core::Error> {
        let transport = AgentTransport::new(
            AgentRole::Subject,
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_paths(config.chat_path.clone(), config.health_path.clone())
        .with_retry(RetryPolicy::from(&config.retry))
        .with_probe_timeout(probe_timeout);

        Ok(Self::new(transport, config.caller_id.clone()))
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

#[async_trait]
impl RemoteAgent for HttpSubjectClient {
    fn role(&self) -> AgentRole {
        AgentRole::Subject
    }

    async fn converse(&self, request: ConverseRequest) -> Result<AgentReply, AgentFailure> {
        let message = request.prompt.trim();
        if message.is_empty() {
            return Err(AgentFailure::rejected("Refusing to send an empty message"));
        }

        info!("→ Subject: {}", truncate(message, 60));

        let body = SubjectRequest {
            message,
            caller_id: &self.caller_id,
        };
        let response: SubjectResponse = self.transport.post_json(&body).await?;

        let text = response.response.trim();
        if text.is_empty() {
            return Err(AgentFailure::empty("Subject replied with no text"));
        }

        info!("← Subject: {}", truncate(text, 60));

        let metrics: Metrics = response
            .auxiliary_metrics
            .unwrap_or_default()
            .into_iter()
            .filter_map(|(name, value)| value.as_f64().map(|v| (name, v)))
            .collect();
        debug!(metrics = metrics.len(), "Subject metrics received");

        Ok(AgentReply {
            text: text.to_string(),
            metrics,
        })
    }

    async fn health_check(&self) -> bool {
        self.transport.probe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{dead_url, spawn_server};
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use parley_core::FailureReason;

    fn client(base: String) -> HttpSubjectClient {
        let transport = AgentTransport::new(AgentRole::Subject, base, Duration::from_secs(5))
            .unwrap()
            .with_paths("/api/chat", "/api/status");
        HttpSubjectClient::new(transport, "bridge_test")
    }

    #[tokio::test]
    async fn sends_message_and_caller_id() {
        let router = Router::new().route(
            "/api/chat",
            post(|Json(body): Json<serde_json::Value>| async move {
                Json(serde_json::json!({
                    "response": format!("  you said {} as {}  ", body["message"], body["callerId"]),
                    "auxiliaryMetrics": { "joy": 0.25, "label": "not a number" }
                }))
            }),
        );
        let subject = client(spawn_server(router).await);

        let reply = subject.converse(ConverseRequest::new("hi")).await.unwrap();
        assert_eq!(reply.text, r#"you said "hi" as "bridge_test""#);
        assert_eq!(reply.metrics.len(), 1);
        assert_eq!(reply.metrics["joy"], 0.25);
    }

    #[tokio::test]
    async fn accepts_emotions_alias() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async {
                Json(serde_json::json!({
                    "response": "fine",
                    "emotions": { "calm": 0.9 }
                }))
            }),
        );
        let subject = client(spawn_server(router).await);

        let reply = subject.converse(ConverseRequest::new("how are you")).await.unwrap();
        assert_eq!(reply.metrics["calm"], 0.9);
    }

    #[tokio::test]
    async fn blank_reply_is_empty_failure() {
        let router = Router::new().route(
            "/api/chat",
            post(|| async { Json(serde_json::json!({ "response": "   " })) }),
        );
        let subject = client(spawn_server(router).await);

        let err = subject.converse(ConverseRequest::new("hello")).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Empty);
    }

    #[tokio::test]
    async fn empty_prompt_never_hits_the_network() {
        let subject = client(dead_url().await);
        let err = subject.converse(ConverseRequest::new("  ")).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Rejected);
    }

    #[tokio::test]
    async fn unreachable_subject() {
        let subject = client(dead_url().await);
        let err = subject.converse(ConverseRequest::new("hello")).await.unwrap_err();
        assert_eq!(err.reason, FailureReason::Unreachable);
        assert!(!subject.health_check().await);
    }

    #[tokio::test]
    async fn health_check_uses_status_path() {
        let router = Router::new().route("/api/status", get(|| async { "ok" }));
        let subject = client(spawn_server(router).await);
        assert!(subject.health_check().await);
    }

    #[test]
    fn from_default_config() {
        let config = SubjectConfig::default();
        let subject = HttpSubjectClient::from_config(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(subject.base_url(), "http://localhost:8000");
        assert_eq!(subject.role(), AgentRole::Subject);
    }
}
