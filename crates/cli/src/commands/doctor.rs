//! `parley doctor`: diagnose the setup.

use parley_agents::{HttpResponderClient, HttpSubjectClient};
use parley_core::RemoteAgent;
use std::path::Path;
use std::time::Duration;

use super::client::GatewayClient;
use super::{config_file, load_config};

pub async fn run(
    config_path: Option<&Path>,
    gateway: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("🩺 Parley Doctor: System Diagnostics");
    println!("====================================\n");

    let mut issues = 0;

    let path = config_file(config_path);
    if path.exists() {
        println!("  ✅ Config file found: {}", path.display());
    } else {
        println!("  ⚠️  No config file, using defaults (run `parley onboard`)");
    }

    let config = match load_config(config_path) {
        Ok(config) => {
            println!("  ✅ Config valid");
            config
        }
        Err(e) => {
            println!("  ❌ Config invalid: {e}");
            println!("\n  ⚠️  Fix the config before running further checks.");
            return Ok(());
        }
    };

    let probe_timeout = Duration::from_secs(config.bridge.probe_timeout_secs);
    let subject = HttpSubjectClient::from_config(&config.subject, probe_timeout)?;
    let responder = HttpResponderClient::from_config(
        &config.responder,
        config.bridge.history_horizon,
        probe_timeout,
    )?;

    let (subject_ok, responder_ok) = tokio::join!(subject.health_check(), responder.health_check());
    if subject_ok {
        println!("  ✅ Subject reachable at {}", subject.base_url());
    } else {
        println!("  ❌ Subject not reachable at {}", subject.base_url());
        issues += 1;
    }
    if responder_ok {
        println!("  ✅ Responder reachable at {}", responder.base_url());
    } else {
        println!("  ❌ Responder not reachable at {}", responder.base_url());
        issues += 1;
    }

    let client = GatewayClient::resolve(gateway, &config)?;
    match client.health().await {
        Ok(()) => println!("  ✅ Gateway running at {}", client.base_url()),
        Err(_) => {
            println!("  ⚠️  Gateway not running at {} (start it with `parley serve`)", client.base_url());
            issues += 1;
        }
    }

    match std::fs::create_dir_all(&config.bridge.log_dir) {
        Ok(()) => println!("  ✅ Log directory writable: {}", config.bridge.log_dir.display()),
        Err(e) => {
            println!("  ❌ Log directory unusable ({}): {e}", config.bridge.log_dir.display());
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  🎉 All checks passed!");
    } else {
        println!("  ⚠️  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
