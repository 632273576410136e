//! Session state and the value types exchanged with bridge callers.

use chrono::{DateTime, Utc};
use parley_config::StartDefaults;
use parley_core::{BridgeError, Exchange};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Lifecycle of the bridge loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Idle,
    Running,
    /// Stop was requested; the loop is finishing its current step.
    Stopping,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Running => f.write_str("running"),
            Self::Stopping => f.write_str("stopping"),
        }
    }
}

/// Parameters of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartParams {
    pub exchange_limit: u64,
    pub inter_exchange_delay_seconds: f64,
    pub topic_switch_interval: u64,
}

impl StartParams {
    pub fn validate(&self) -> Result<(), BridgeError> {
        if self.exchange_limit == 0 {
            return Err(BridgeError::InvalidConfig(
                "exchangeLimit must be greater than zero".into(),
            ));
        }
        if self.topic_switch_interval == 0 {
            return Err(BridgeError::InvalidConfig(
                "topicSwitchInterval must be greater than zero".into(),
            ));
        }
        self.delay()?;
        Ok(())
    }

    /// The inter-exchange delay as a `Duration`.
    pub fn delay(&self) -> Result<Duration, BridgeError> {
        Duration::try_from_secs_f64(self.inter_exchange_delay_seconds).map_err(|_| {
            BridgeError::InvalidConfig(format!(
                "interExchangeDelaySeconds must be a non-negative number of seconds, got {}",
                self.inter_exchange_delay_seconds
            ))
        })
    }
}

impl Default for StartParams {
    fn default() -> Self {
        Self::from(&StartDefaults::default())
    }
}

impl From<&StartDefaults> for StartParams {
    fn from(defaults: &StartDefaults) -> Self {
        Self {
            exchange_limit: defaults.exchange_limit,
            inter_exchange_delay_seconds: defaults.delay_secs,
            topic_switch_interval: defaults.topic_switch_interval,
        }
    }
}

/// A start request as received from a caller: any field left out falls
/// back to the configured default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StartRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exchange_limit: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inter_exchange_delay_seconds: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic_switch_interval: Option<u64>,
}

impl StartRequest {
    pub fn resolve(&self, defaults: &StartParams) -> StartParams {
        StartParams {
            exchange_limit: self.exchange_limit.unwrap_or(defaults.exchange_limit),
            inter_exchange_delay_seconds: self
                .inter_exchange_delay_seconds
                .unwrap_or(defaults.inter_exchange_delay_seconds),
            topic_switch_interval: self
                .topic_switch_interval
                .unwrap_or(defaults.topic_switch_interval),
        }
    }
}

/// The singleton session. Mutated by the active loop and by stop.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub phase: Phase,
    pub exchanges_completed: u64,
    pub exchange_limit: u64,
    pub topic_index: usize,
    pub messages_on_current_topic: u64,
    pub topic_switch_interval: u64,
    pub inter_exchange_delay_seconds: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub current_topic: String,
}

impl Session {
    /// An idle session carrying the given parameters.
    pub fn idle(params: &StartParams) -> Self {
        Self {
            phase: Phase::Idle,
            exchanges_completed: 0,
            exchange_limit: params.exchange_limit,
            topic_index: 0,
            messages_on_current_topic: 0,
            topic_switch_interval: params.topic_switch_interval,
            inter_exchange_delay_seconds: params.inter_exchange_delay_seconds,
            started_at: None,
            current_topic: String::new(),
        }
    }

    /// A fresh running session.
    pub fn started(params: &StartParams, started_at: DateTime<Utc>) -> Self {
        Self {
            phase: Phase::Running,
            started_at: Some(started_at),
            ..Self::idle(params)
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == Phase::Running
    }

    pub fn cap_reached(&self) -> bool {
        self.exchanges_completed >= self.exchange_limit
    }
}

/// Returned by a successful start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartReceipt {
    pub started_at: DateTime<Utc>,
    pub params: StartParams,
}

/// Returned by a successful stop.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopReceipt {
    pub exchanges_completed: u64,
}

/// Snapshot of the session plus live agent readiness.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub running: bool,
    pub phase: Phase,
    pub exchanges_completed: u64,
    pub exchange_limit: u64,
    pub current_topic: String,
    pub topic_index: usize,
    pub messages_on_current_topic: u64,
    pub topic_switch_interval: u64,
    pub inter_exchange_delay_seconds: f64,
    pub started_at: Option<DateTime<Utc>>,
    pub subject_reachable: bool,
    pub responder_reachable: bool,

    /// Location of the last session log written.
    #[serde(default)]
    pub last_artifact: Option<String>,

    /// Why the last flush failed, if it did.
    #[serde(default)]
    pub last_persist_error: Option<String>,
}

/// The most recent exchanges of the current (or last) run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub total_exchanges: usize,
    pub returned_count: usize,
    pub exchanges: Vec<Exchange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_config_defaults() {
        let params = StartParams::default();
        assert_eq!(params.exchange_limit, 100);
        assert_eq!(params.topic_switch_interval, 10);
        assert!((params.inter_exchange_delay_seconds - 2.0).abs() < f64::EPSILON);
        assert!(params.validate().is_ok());
    }

    #[test]
    fn invalid_params_rejected() {
        let base = StartParams::default();
        let cases = [
            StartParams { exchange_limit: 0, ..base },
            StartParams { topic_switch_interval: 0, ..base },
            StartParams { inter_exchange_delay_seconds: -1.0, ..base },
            StartParams { inter_exchange_delay_seconds: f64::NAN, ..base },
            StartParams { inter_exchange_delay_seconds: f64::INFINITY, ..base },
            StartParams { inter_exchange_delay_seconds: 1e20, ..base },
        ];
        for params in cases {
            let err = params.validate().unwrap_err();
            assert_eq!(err.code(), "invalid_config");
        }
    }

    #[test]
    fn request_fields_override_defaults() {
        let request: StartRequest = serde_json::from_str(r#"{"exchangeLimit": 3}"#).unwrap();
        let params = request.resolve(&StartParams::default());
        assert_eq!(params.exchange_limit, 3);
        assert_eq!(params.topic_switch_interval, 10);
    }

    #[test]
    fn delay_converts_fractional_seconds() {
        let params = StartParams { inter_exchange_delay_seconds: 0.25, ..StartParams::default() };
        assert_eq!(params.delay().unwrap(), Duration::from_millis(250));
    }

    #[test]
    fn misspelled_request_field_rejected() {
        let result = serde_json::from_str::<StartRequest>(r#"{"exchangeLimt": 3}"#);
        assert!(result.is_err());
    }

    #[test]
    fn started_session_is_running() {
        let session = Session::started(&StartParams::default(), Utc::now());
        assert!(session.is_running());
        assert!(session.started_at.is_some());
        assert_eq!(session.exchanges_completed, 0);
        assert!(!session.cap_reached());
    }

    #[test]
    fn phase_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Phase::Stopping).unwrap(), "\"stopping\"");
        assert_eq!(Phase::default(), Phase::Idle);
    }
}
