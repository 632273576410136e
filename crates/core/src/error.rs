//! Error types for the Parley domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; every variant a caller can
//! observe carries a stable reason code.

use crate::agent::AgentRole;
use thiserror::Error;

/// The top-level error type for all Parley operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Bridge control errors ---
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    // --- Sockets and files ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Why a call to a remote agent produced no usable reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// Connection refused, DNS failure, reset before a response arrived.
    Unreachable,
    /// The call exceeded its per-call timeout.
    Timeout,
    /// The agent answered with a non-success status or an unparseable body.
    Rejected,
    /// The agent answered successfully but with no text.
    Empty,
}

impl FailureReason {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unreachable => "unreachable",
            Self::Timeout => "timeout",
            Self::Rejected => "rejected",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A failed remote agent call. Never fatal: the bridge loop skips the
/// iteration and carries on.
#[derive(Debug, Clone, Error)]
#[error("{reason}: {detail}")]
pub struct AgentFailure {
    pub reason: FailureReason,
    pub detail: String,
}

impl AgentFailure {
    pub fn new(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }

    pub fn unreachable(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Unreachable, detail)
    }

    pub fn timeout(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Timeout, detail)
    }

    pub fn rejected(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Rejected, detail)
    }

    pub fn empty(detail: impl Into<String>) -> Self {
        Self::new(FailureReason::Empty, detail)
    }
}

/// Errors surfaced by the bridge control operations (start/stop/flush).
#[derive(Debug, Clone, Error)]
pub enum BridgeError {
    #[error("A bridge session is already running")]
    AlreadyRunning,

    #[error("No bridge session is running")]
    NotRunning,

    #[error("{role} agent is not available: {reason}")]
    DependencyUnavailable { role: AgentRole, reason: String },

    #[error("Invalid bridge configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to persist session log: {0}")]
    Persistence(String),
}

impl BridgeError {
    /// Stable machine-readable code, used as the `error` field of API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::AlreadyRunning => "already_running",
            Self::NotRunning => "not_running",
            Self::DependencyUnavailable { .. } => "dependency_unavailable",
            Self::InvalidConfig(_) => "invalid_config",
            Self::Persistence(_) => "persistence_failed",
        }
    }
}
