//! Parley CLI: the main entry point.
//!
//! Commands:
//! - `serve`    Run the HTTP gateway that hosts the bridge
//! - `start`    Start a bridge run (optionally follow its progress)
//! - `stop`     Stop the active run
//! - `status`   Show the bridge session status
//! - `log`      Show the most recent exchanges
//! - `doctor`   Check config, both agents and the gateway
//! - `onboard`  Write a default config file
//! - `config`   Show or validate configuration

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "parley",
    about = "Parley: relay a conversation between two remote AI agents",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    /// Config file to use instead of ~/.parley/config.toml
    #[arg(short, long, global = true, env = "PARLEY_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway base URL for client commands (defaults to the configured host and port)
    #[arg(long, global = true, env = "PARLEY_GATEWAY_URL")]
    gateway: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP gateway hosting the bridge
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start a bridge run
    Start {
        /// Stop after this many exchanges
        #[arg(short = 'n', long)]
        exchanges: Option<u64>,

        /// Seconds to wait between exchanges
        #[arg(short, long)]
        delay: Option<f64>,

        /// Exchanges before switching to the next topic
        #[arg(short, long)]
        topic_interval: Option<u64>,

        /// Poll the status until the run ends
        #[arg(short, long)]
        follow: bool,

        /// Seconds between polls with --follow
        #[arg(long, default_value_t = 5)]
        poll_secs: u64,
    },

    /// Stop the active run
    Stop,

    /// Show the bridge session status
    Status,

    /// Show the most recent exchanges
    Log {
        /// How many exchanges to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Check config, both agents and the gateway
    Doctor,

    /// Write a default config file
    Onboard,

    /// Show or validate configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
    /// Validate the configuration
    Validate,
    /// Print the config file path
    Path,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter));
    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    let config_path = cli.config.as_deref();
    let gateway = cli.gateway.as_deref();

    match cli.command {
        Commands::Serve { port } => commands::serve::run(config_path, port).await?,
        Commands::Start {
            exchanges,
            delay,
            topic_interval,
            follow,
            poll_secs,
        } => {
            let request = parley_bridge::StartRequest {
                exchange_limit: exchanges,
                inter_exchange_delay_seconds: delay,
                topic_switch_interval: topic_interval,
            };
            commands::control::start(config_path, gateway, request, follow, poll_secs).await?
        }
        Commands::Stop => commands::control::stop(config_path, gateway).await?,
        Commands::Status => commands::control::status(config_path, gateway).await?,
        Commands::Log { limit } => commands::control::log(config_path, gateway, limit).await?,
        Commands::Doctor => commands::doctor::run(config_path, gateway).await?,
        Commands::Onboard => commands::onboard::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
        },
    }

    Ok(())
}
