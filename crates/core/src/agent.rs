//! RemoteAgent trait: the abstraction over the two externally-hosted
//! conversational agents.
//!
//! A RemoteAgent knows how to send a prompt (plus bounded recent history)
//! to its endpoint and get a textual reply back, and how to answer a
//! readiness probe. The bridge loop never sees HTTP.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentFailure;
use crate::exchange::{ContextPair, Metrics};

/// Which side of the dialogue an agent plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    /// Receives contextualized prompts; its output is relayed onward.
    Responder,
    /// The agent being conversed with; receives the Responder's output.
    Subject,
}

impl std::fmt::Display for AgentRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Responder => f.write_str("Responder"),
            Self::Subject => f.write_str("Subject"),
        }
    }
}

/// Generation options forwarded to the Responder. Ignored by the Subject.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConverseOptions {
    /// Sampling temperature (0.0 = deterministic).
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated output units (tokens).
    #[serde(default = "default_max_output_units")]
    pub max_output_units: u32,
}

fn default_temperature() -> f32 {
    0.8
}

fn default_max_output_units() -> u32 {
    150
}

impl Default for ConverseOptions {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_units: default_max_output_units(),
        }
    }
}

/// One call to a remote agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConverseRequest {
    /// The prompt text. Must be non-empty.
    pub prompt: String,

    /// Recent dialogue, oldest first. Already bounded by the caller.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<ContextPair>,

    #[serde(default)]
    pub options: ConverseOptions,
}

impl ConverseRequest {
    /// A bare prompt with no history and default options.
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
            options: ConverseOptions::default(),
        }
    }

    pub fn with_history(mut self, history: Vec<ContextPair>) -> Self {
        self.history = history;
        self
    }

    pub fn with_options(mut self, options: ConverseOptions) -> Self {
        self.options = options;
        self
    }
}

/// A successful reply: trimmed, non-empty text plus optional metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentReply {
    pub text: String,

    /// Auxiliary state signals (e.g. emotional state) reported by the Subject.
    #[serde(default, skip_serializing_if = "Metrics::is_empty")]
    pub metrics: Metrics,
}

impl AgentReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metrics: Metrics::new(),
        }
    }
}

/// The core RemoteAgent trait.
///
/// Both the Responder and the Subject clients implement this trait. The
/// bridge loop calls `converse()` without knowing which transport is used.
/// Failures are values, never panics: every way a call can go wrong maps to
/// an [`AgentFailure`] with a reason code.
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    /// Which side of the dialogue this agent plays.
    fn role(&self) -> AgentRole;

    /// Send a prompt and wait for the reply.
    async fn converse(&self, request: ConverseRequest) -> Result<AgentReply, AgentFailure>;

    /// Readiness probe: can we reach the agent right now?
    async fn health_check(&self) -> bool {
        true
    }
}
