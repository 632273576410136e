//! `parley config`: configuration management commands.

use std::path::Path;

use super::{config_file, load_config};

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();

            if config.gateway.host == "0.0.0.0" {
                warnings.push("Gateway listens on all interfaces and has no authentication");
            }

            if config.subject.url == config.responder.url {
                warnings.push("Subject and Responder point at the same URL");
            }

            if config.bridge.defaults.delay_secs == 0.0 {
                warnings.push("Default inter-exchange delay is zero");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Subject:    {}", config.subject.url);
            println!("   Responder:  {}", config.responder.url);
            println!(
                "   Gateway:    {}:{}",
                config.gateway.host, config.gateway.port
            );
            println!("   Topics:     {}", config.bridge.topics.len());
            println!("   Log dir:    {}", config.bridge.log_dir.display());
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", config_file(config_path).display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn invalid_file_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[bridge]\ntopics = []\n").unwrap();
        assert!(validate(Some(&path)).await.is_err());
    }

    #[tokio::test]
    async fn missing_file_validates_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert!(validate(Some(&dir.path().join("none.toml"))).await.is_ok());
    }
}
