//! HTTP client for the Responder agent.
//!
//! Wire format:
//! `POST {message, recentHistory: [{priorSubjectText, priorResponderText}],
//! samplingTemperature, maxOutputUnits}` → `{response}`.

use async_trait::async_trait;
use parley_config::ResponderConfig;
use parley_core::{AgentFailure, AgentReply, AgentRole, ConverseRequest, RemoteAgent};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

use crate::retry::RetryPolicy;
use crate::transport::{AgentTransport, truncate};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct HistoryEntry<'a> {
    prior_subject_text: &'a str,
    prior_responder_text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResponderRequest<'a> {
    message: &'a str,
    recent_history: Vec<HistoryEntry<'a>>,
    sampling_temperature: f32,
    max_output_units: u32,
}

#[derive(Deserialize)]
struct ResponderResponse {
    #[serde(default)]
    response: String,
}

/// The Responder side of the bridge.
pub struct HttpResponderClient {
    transport: AgentTransport,
    history_limit: usize,
}

impl HttpResponderClient {
    /// `history_limit` caps how many recent pairs are forwarded per call.
    pub fn new(transport: AgentTransport, history_limit: usize) -> Self {
        Self {
            transport,
            history_limit,
        }
    }

    /// Build from the `[responder]` config section.
    pub fn from_config(
        config: &ResponderConfig,
        history_limit: usize,
        probe_timeout: Duration,
    ) -> Result<Self, parley_core::Error> {
        let transport = AgentTransport::new(
            AgentRole::Responder,
            config.url.clone(),
            Duration::from_secs(config.timeout_secs),
        )?
        .with_paths(config.chat_path.clone(), config.health_path.clone())
        .with_retry(RetryPolicy::from(&config.retry))
        .with_probe_timeout(probe_timeout);

        Ok(Self::new(transport, history_limit))
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }
}

#[async_trait]
impl RemoteAgent for HttpResponderClient {
    fn role(&self) -> AgentRole {
        AgentRole::Responder
    }

    async fn converse(&self, request: ConverseRequest) -> Result<AgentReply, AgentFailure> {
        let message = request.prompt.trim();
        if message.is_empty() {
            return Err(AgentFailure::rejected("Refusing to send an empty prompt"));
        }

        info!(history = request.history.len(), "→ Responder: {}", truncate(message, 60));

        let skip = request.history.len().saturating_sub(self.history_limit);
        let body = ResponderRequest {
            message,
            recent_history: request.history[skip..]
                .iter()
                .map(|pair| HistoryEntry {
                    prior_subject_text: &pair.subject_text,
                    prior_responder_text: &pair.responder_text,
                })
                .collect(),
            sampling_temperature: request.options.temperature,
            max_output_units: request.options.max_output_units,
        };
        let response: ResponderResponse = self.transport.post_json(&body).await?;

        let text = response.response.trim();
        if text.is_empty() {
            return Err(AgentFailure::empty("Responder replied with no text"));
        }

        info!("← Responder: {}", truncate(text, 60));
        Ok(AgentReply::text(text))
    }

    async fn health_check(&self) -> bool {
        self.transport.probe().await
    }
}
