//! Configuration loading, validation, and management for Parley.
//!
//! Loads configuration from `~/.parley/config.toml` with environment
//! variable overrides. Validates all settings at startup, so a bad topic
//! list or endpoint never surfaces in the middle of a bridge run.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.parley/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP control plane
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// The agent being conversed with
    #[serde(default)]
    pub subject: SubjectConfig,

    /// The agent whose output is relayed to the Subject
    #[serde(default)]
    pub responder: ResponderConfig,

    /// Bridge loop settings
    #[serde(default)]
    pub bridge: BridgeConfig,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_host")]
    pub host: String,

    /// Allow cross-origin requests from any origin (dashboards served elsewhere).
    #[serde(default = "default_true")]
    pub permissive_cors: bool,
}

fn default_port() -> u16 {
    8032
}
fn default_host() -> String {
    "127.0.0.1".into()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            host: default_host(),
            permissive_cors: true,
        }
    }
}

/// Transport-level retry policy for one agent endpoint.
///
/// `max_attempts` counts the first try, so `1` disables retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// HTTP statuses worth another attempt.
    #[serde(default = "default_retry_statuses")]
    pub retry_statuses: Vec<u16>,
}

fn default_max_attempts() -> u32 {
    3
}
fn default_initial_backoff_ms() -> u64 {
    500
}
fn default_max_backoff_ms() -> u64 {
    8_000
}
fn default_retry_statuses() -> Vec<u16> {
    vec![429, 500, 502, 503, 504]
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn single_attempt() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            retry_statuses: default_retry_statuses(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubjectConfig {
    #[serde(default = "default_subject_url")]
    pub url: String,

    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    #[serde(default = "default_subject_health_path")]
    pub health_path: String,

    /// Identifier the Subject sees as the sender of every message.
    #[serde(default = "default_caller_id")]
    pub caller_id: String,

    #[serde(default = "default_subject_timeout")]
    pub timeout_secs: u64,

    /// No retries by default: a failed Subject call aborts only the
    /// current exchange.
    #[serde(default = "RetryConfig::single_attempt")]
    pub retry: RetryConfig,
}

fn default_subject_url() -> String {
    "http://localhost:8000".into()
}
fn default_chat_path() -> String {
    "/api/chat".into()
}
fn default_subject_health_path() -> String {
    "/api/status".into()
}
fn default_caller_id() -> String {
    "parley_bridge".into()
}
fn default_subject_timeout() -> u64 {
    30
}

impl Default for SubjectConfig {
    fn default() -> Self {
        Self {
            url: default_subject_url(),
            chat_path: default_chat_path(),
            health_path: default_subject_health_path(),
            caller_id: default_caller_id(),
            timeout_secs: default_subject_timeout(),
            retry: RetryConfig::single_attempt(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponderConfig {
    #[serde(default = "default_responder_url")]
    pub url: String,

    #[serde(default = "default_chat_path")]
    pub chat_path: String,

    #[serde(default = "default_responder_health_path")]
    pub health_path: String,

    #[serde(default = "default_responder_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_output_units")]
    pub max_output_units: u32,

    #[serde(default)]
    pub retry: RetryConfig,
}

fn default_responder_url() -> String {
    "http://localhost:8030".into()
}
fn default_responder_health_path() -> String {
    "/".into()
}
fn default_responder_timeout() -> u64 {
    60
}
fn default_temperature() -> f32 {
    0.8
}
fn default_max_output_units() -> u32 {
    150
}

impl Default for ResponderConfig {
    fn default() -> Self {
        Self {
            url: default_responder_url(),
            chat_path: default_chat_path(),
            health_path: default_responder_health_path(),
            timeout_secs: default_responder_timeout(),
            temperature: default_temperature(),
            max_output_units: default_max_output_units(),
            retry: RetryConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// Number of recent (Subject, Responder) pairs sent with each Responder
    /// prompt. The context window keeps twice as many.
    #[serde(default = "default_history_horizon")]
    pub history_horizon: usize,

    /// Discussion topics, rotated in order.
    #[serde(default = "default_topics")]
    pub topics: Vec<String>,

    /// First message sent to the Subject when a run begins.
    #[serde(default = "default_opening_message")]
    pub opening_message: String,

    /// Instruction sent to the Responder, without history, when its output
    /// starts repeating.
    #[serde(default = "default_loop_break_prompt")]
    pub loop_break_prompt: String,

    /// Directory receiving one JSON session log per run.
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,

    /// Timeout for readiness probes against either agent.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Defaults for start requests that omit a parameter.
    #[serde(default)]
    pub defaults: StartDefaults,
}

fn default_history_horizon() -> usize {
    5
}
fn default_topics() -> Vec<String> {
    [
        "What is something you noticed for the first time today?",
        "Tell me about a place that makes you feel calm.",
        "What do you think makes a friendship last?",
        "If you could learn any skill instantly, which would it be and why?",
        "What does it feel like to be curious about something?",
        "Describe a problem you would like to solve someday.",
        "What is the difference between knowing and understanding?",
        "Tell me about a story that changed how you see the world.",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}
fn default_opening_message() -> String {
    "Hello! I'm here to have a conversation with you. How are you today?".into()
}
fn default_loop_break_prompt() -> String {
    "The conversation has been going in circles. Change the subject: ask one short, \
     fresh question about something you have not discussed yet."
        .into()
}
fn default_log_dir() -> PathBuf {
    PathBuf::from("training_logs")
}
fn default_probe_timeout() -> u64 {
    5
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            history_horizon: default_history_horizon(),
            topics: default_topics(),
            opening_message: default_opening_message(),
            loop_break_prompt: default_loop_break_prompt(),
            log_dir: default_log_dir(),
            probe_timeout_secs: default_probe_timeout(),
            defaults: StartDefaults::default(),
        }
    }
}

/// Start parameters used when a request omits them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartDefaults {
    #[serde(default = "default_exchange_limit")]
    pub exchange_limit: u64,

    #[serde(default = "default_delay_secs")]
    pub delay_secs: f64,

    #[serde(default = "default_topic_switch_interval")]
    pub topic_switch_interval: u64,
}

fn default_exchange_limit() -> u64 {
    100
}
fn default_delay_secs() -> f64 {
    2.0
}
fn default_topic_switch_interval() -> u64 {
    10
}

impl Default for StartDefaults {
    fn default() -> Self {
        Self {
            exchange_limit: default_exchange_limit(),
            delay_secs: default_delay_secs(),
            topic_switch_interval: default_topic_switch_interval(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.parley/config.toml).
    ///
    /// Environment variables override the file:
    /// - `PARLEY_SUBJECT_URL`
    /// - `PARLEY_RESPONDER_URL`
    /// - `PARLEY_GATEWAY_PORT`
    /// - `PARLEY_LOG_DIR`
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::config_dir().join("config.toml");
        Self::load_with_env(&config_path)
    }

    /// Load from a specific file, then apply environment overrides.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Ok(url) = std::env::var("PARLEY_SUBJECT_URL") {
            config.subject.url = url;
        }

        if let Ok(url) = std::env::var("PARLEY_RESPONDER_URL") {
            config.responder.url = url;
        }

        if let Ok(port) = std::env::var("PARLEY_GATEWAY_PORT") {
            config.gateway.port = port.parse().map_err(|_| {
                ConfigError::ValidationError(format!("PARLEY_GATEWAY_PORT is not a port: {port}"))
            })?;
        }

        if let Ok(dir) = std::env::var("PARLEY_LOG_DIR") {
            config.bridge.log_dir = PathBuf::from(dir);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".parley")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.topics.is_empty() {
            return Err(ConfigError::ValidationError(
                "bridge.topics must contain at least one topic".into(),
            ));
        }

        if self.bridge.topics.iter().any(|t| t.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "bridge.topics must not contain blank entries".into(),
            ));
        }

        if self.bridge.history_horizon == 0 {
            return Err(ConfigError::ValidationError(
                "bridge.history_horizon must be at least 1".into(),
            ));
        }

        if self.bridge.opening_message.trim().is_empty()
            || self.bridge.loop_break_prompt.trim().is_empty()
        {
            return Err(ConfigError::ValidationError(
                "bridge.opening_message and bridge.loop_break_prompt must not be blank".into(),
            ));
        }

        let defaults = &self.bridge.defaults;
        if defaults.exchange_limit == 0 || defaults.topic_switch_interval == 0 {
            return Err(ConfigError::ValidationError(
                "bridge.defaults exchange_limit and topic_switch_interval must be > 0".into(),
            ));
        }

        if !defaults.delay_secs.is_finite() || defaults.delay_secs < 0.0 {
            return Err(ConfigError::ValidationError(
                "bridge.defaults.delay_secs must be a non-negative number".into(),
            ));
        }

        if self.responder.temperature < 0.0 || self.responder.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "responder.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        for (role, url, timeout, retry) in [
            ("subject", &self.subject.url, self.subject.timeout_secs, &self.subject.retry),
            (
                "responder",
                &self.responder.url,
                self.responder.timeout_secs,
                &self.responder.retry,
            ),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(ConfigError::ValidationError(format!(
                    "{role}.url must be an http(s) URL, got '{url}'"
                )));
            }
            if timeout == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{role}.timeout_secs must be > 0"
                )));
            }
            if retry.max_attempts == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "{role}.retry.max_attempts must be at least 1"
                )));
            }
        }

        Ok(())
    }

    /// Generate a default config TOML string (for `onboard` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            subject: SubjectConfig::default(),
            responder: ResponderConfig::default(),
            bridge: BridgeConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.gateway.port, 8032);
        assert_eq!(config.subject.timeout_secs, 30);
        assert_eq!(config.responder.timeout_secs, 60);
        assert_eq!(config.subject.retry.max_attempts, 1);
        assert_eq!(config.responder.retry.max_attempts, 3);
        assert_eq!(config.bridge.history_horizon, 5);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.gateway.port, config.gateway.port);
        assert_eq!(parsed.bridge.topics, config.bridge.topics);
        assert_eq!(parsed.subject.retry, config.subject.retry);
    }

    #[test]
    fn empty_topic_list_rejected() {
        let mut config = AppConfig::default();
        config.bridge.topics.clear();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("topics"));
    }

    #[test]
    fn blank_topic_rejected() {
        let mut config = AppConfig::default();
        config.bridge.topics.push("   ".into());
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_exchange_limit_rejected() {
        let mut config = AppConfig::default();
        config.bridge.defaults.exchange_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.responder.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn non_http_url_rejected() {
        let mut config = AppConfig::default();
        config.subject.url = "localhost:8000".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("subject.url"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        let config = result.unwrap();
        assert_eq!(config.gateway.port, 8032);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[subject]
url = "http://10.0.0.5:9000"

[responder.retry]
max_attempts = 5

[bridge]
topics = ["weather", "music"]
"#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.subject.url, "http://10.0.0.5:9000");
        assert_eq!(config.subject.chat_path, "/api/chat");
        assert_eq!(config.responder.retry.max_attempts, 5);
        assert_eq!(config.responder.retry.retry_statuses, vec![429, 500, 502, 503, 504]);
        assert_eq!(config.bridge.topics, vec!["weather", "music"]);
        assert_eq!(config.bridge.defaults.topic_switch_interval, 10);
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[gateway\nport = ").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("8032"));
        assert!(toml_str.contains("[bridge.defaults]"));
        assert!(toml_str.contains("training_logs"));
    }
}
