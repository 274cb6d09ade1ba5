//! # Wallet Relay Node
//!
//! ```text
//! relay-node --config config.json
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use relay_node::{NodeConfig, RelayNode, DEFAULT_CONFIG_PATH};
use relay_telemetry::{init_tracing, TelemetryConfig};
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "relay-node", version, about = "WebSocket relay for the wallet dashboard")]
struct Args {
    /// JSON configuration file (missing file means defaults)
    #[arg(long, env = "RELAY_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&TelemetryConfig::from_env().with_service_name("relay-node"))
        .context("Failed to initialize logging")?;

    let config = NodeConfig::load(&args.config)
        .with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;
    config.validate()?;

    let node = RelayNode::start(config).await?;

    info!(url = %node.url(), "Relay is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl+C")?;

    node.shutdown().await
}
