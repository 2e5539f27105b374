//! UNS Bridge - Main Entry Point
//!
//! Connects to the configured MQTT broker and serves the four UNS tools
//! (discover, read, search, publish) over stdio until shutdown.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use uns_bridge::broker::UnsClient;
use uns_bridge::config::BridgeConfig;
use uns_bridge::observability::init_default_logging;
use uns_bridge::server::run_stdio_server;
use uns_bridge::tools::UnsToolset;

/// MQTT Unified Namespace bridge for tool-calling clients
#[derive(Parser)]
#[command(name = "uns-bridge")]
#[command(about = "MQTT Unified Namespace bridge for tool-calling clients")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the broker and serve tools on stdio
    Run,
    /// Validate configuration
    Config {
        /// Show the resolved configuration
        #[arg(long)]
        show: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logging goes to stderr; stdout belongs to the tool protocol
    init_default_logging();

    info!("Starting UNS bridge v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run => run_bridge(config).await,
        Commands::Config { show } => handle_config_command(config, show),
    };

    if let Err(e) = result {
        error!("Command failed: {e}");
        process::exit(1);
    }

    info!("Bridge shutdown complete");
}

fn load_configuration(
    config_path: &Option<PathBuf>,
) -> Result<BridgeConfig, Box<dyn std::error::Error>> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            Ok(BridgeConfig::load_from_file(path)?)
        }
        None => {
            let default_paths = ["bridge.toml", "config/bridge.toml"];
            for path_str in default_paths {
                let path = PathBuf::from(path_str);
                if path.exists() {
                    info!("Loading configuration from: {}", path.display());
                    return Ok(BridgeConfig::load_from_file(&path)?);
                }
            }

            info!("No configuration file found, using environment variables");
            Ok(BridgeConfig::from_env())
        }
    }
}

async fn run_bridge(config: BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("MQTT broker: {}", config.mqtt.broker_url);

    let client = Arc::new(UnsClient::new(config.mqtt)?);
    info!("Client ID: {}", client.client_id());

    // A broker that is down at startup is not fatal; tools report connection
    // errors per call and the session recovers when the broker returns
    if let Err(e) = client.connect().await {
        warn!("Failed to connect to MQTT broker: {e}. Tools may fail until the broker is reachable.");
    }

    let toolset = UnsToolset::new(client.clone());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())?;
    let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())?;

    tokio::select! {
        result = run_stdio_server(&toolset, shutdown_rx) => {
            if let Err(e) = result {
                error!("Stdio server error: {e}");
            }
        }
        _ = sigint.recv() => {
            info!("Received SIGINT, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        }
        _ = sigterm.recv() => {
            info!("Received SIGTERM, shutting down gracefully...");
            let _ = shutdown_tx.send(true);
        }
    }

    client.disconnect().await?;
    Ok(())
}

fn handle_config_command(
    config: BridgeConfig,
    show: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(&config)?);
    }

    info!("Configuration validation complete");
    Ok(())
}
