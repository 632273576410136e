//! `parley serve`: run the HTTP gateway hosting the bridge.

use std::path::Path;
use tracing::info;

use super::{config_file, load_config};

pub async fn run(
    config_path: Option<&Path>,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    info!(config = %config_file(config_path).display(), "Configuration loaded");

    println!("Parley gateway");
    println!("  Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("  Subject:    {}", config.subject.url);
    println!("  Responder:  {}", config.responder.url);
    println!("  Logs:       {}", config.bridge.log_dir.display());
    println!("  Press Ctrl+C to stop\n");

    Ok(parley_gateway::start(config).await?)
}
