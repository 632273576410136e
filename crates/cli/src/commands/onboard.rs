//! `parley onboard`: first-time setup.

use parley_config::AppConfig;
use std::path::Path;

use super::config_file;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = config_file(config_path);

    println!("Parley: First-Time Setup");
    println!("========================\n");

    if let Some(dir) = config_path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            println!("✅ Created config directory: {}", dir.display());
        } else {
            println!("  Config directory exists: {}", dir.display());
        }
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
        return Ok(());
    }

    std::fs::write(&config_path, AppConfig::default_toml())?;
    println!("✅ Created config.toml at: {}", config_path.display());
    println!("\n📝 Next steps:");
    println!("   1. Point [subject] and [responder] at your two agents");
    println!("   2. Run: parley doctor");
    println!("   3. Run: parley serve, then parley start --follow\n");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_default_config_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        run(Some(&path)).await.unwrap();
        let written = std::fs::read_to_string(&path).unwrap();
        let parsed: AppConfig = toml::from_str(&written).unwrap();
        assert!(parsed.validate().is_ok());

        std::fs::write(&path, "# edited").unwrap();
        run(Some(&path)).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# edited");
    }
}
