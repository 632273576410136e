pub mod client;
pub mod config_cmd;
pub mod control;
pub mod doctor;
pub mod onboard;
pub mod serve;

use parley_config::{AppConfig, ConfigError};
use std::path::{Path, PathBuf};

/// The config file in effect: `--config` if given, else the default path.
pub fn config_file(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the configuration with environment overrides applied.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, ConfigError> {
    AppConfig::load_with_env(&config_file(explicit))
}
