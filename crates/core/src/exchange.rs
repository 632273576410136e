//! Exchange and session log domain types.
//!
//! These are the value objects that flow out of the bridge loop:
//! Responder speaks → Subject replies → an [`Exchange`] is recorded → at run
//! end the whole run is persisted as one [`SessionLog`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Named auxiliary signals returned by the Subject (e.g. `"curiosity": 0.7`).
pub type Metrics = BTreeMap<String, f64>;

/// One recorded round of the dialogue. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exchange {
    pub timestamp: DateTime<Utc>,

    /// What was sent to the Subject agent.
    pub outbound_to_subject: String,

    /// What the Subject answered.
    pub subject_reply: String,

    #[serde(default)]
    pub auxiliary_metrics: Metrics,
}

impl Exchange {
    /// Record an exchange stamped with the current time.
    pub fn now(
        outbound_to_subject: impl Into<String>,
        subject_reply: impl Into<String>,
        auxiliary_metrics: Metrics,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            outbound_to_subject: outbound_to_subject.into(),
            subject_reply: subject_reply.into(),
            auxiliary_metrics,
        }
    }
}

/// One entry of the context window: what the Subject said and what the
/// Responder said around it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextPair {
    pub subject_text: String,
    pub responder_text: String,
}

impl ContextPair {
    pub fn new(subject_text: impl Into<String>, responder_text: impl Into<String>) -> Self {
        Self {
            subject_text: subject_text.into(),
            responder_text: responder_text.into(),
        }
    }
}

/// Header of a persisted session log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub started_at: Option<DateTime<Utc>>,
    pub exchanges_completed: u64,
}

/// The durable artifact written once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLog {
    pub session_info: SessionInfo,
    pub exchanges: Vec<Exchange>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exchange_uses_camel_case_fields() {
        let mut metrics = Metrics::new();
        metrics.insert("joy".into(), 0.5);
        let exchange = Exchange::now("hello", "hi there", metrics);

        let json = serde_json::to_value(&exchange).unwrap();
        assert_eq!(json["outboundToSubject"], "hello");
        assert_eq!(json["subjectReply"], "hi there");
        assert_eq!(json["auxiliaryMetrics"]["joy"], 0.5);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn session_log_shape() {
        let log = SessionLog {
            session_info: SessionInfo {
                started_at: None,
                exchanges_completed: 0,
            },
            exchanges: vec![],
        };
        let json = serde_json::to_value(&log).unwrap();
        assert!(json["sessionInfo"]["startedAt"].is_null());
        assert_eq!(json["sessionInfo"]["exchangesCompleted"], 0);
        assert!(json["exchanges"].as_array().unwrap().is_empty());
    }

    #[test]
    fn missing_metrics_default_to_empty() {
        let json = r#"{
            "timestamp": "2026-02-23T09:30:00Z",
            "outboundToSubject": "a",
            "subjectReply": "b"
        }"#;
        let exchange: Exchange = serde_json::from_str(json).unwrap();
        assert!(exchange.auxiliary_metrics.is_empty());
    }
}
