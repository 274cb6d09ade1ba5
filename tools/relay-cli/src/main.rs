//! relay-cli: issue typed requests against a running relay.
//!
//! ```text
//! relay-cli pnl <address>
//! relay-cli add-wallets --from-coin BONK <wallet>...
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use relay_client::{ClientConfig, RelayClient, RequestOptions};
use relay_telemetry::{init_tracing, TelemetryConfig};
use relay_types::{AddWalletsProgress, AddressType, Outcome};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "relay-cli", version, about = "Command-line client for the wallet relay")]
struct Args {
    /// Relay WebSocket URL
    #[arg(long, env = "RELAY_URL", default_value = "ws://127.0.0.1:8080")]
    url: String,

    /// Seconds to wait for the connection
    #[arg(long, default_value = "10")]
    connect_timeout: u64,

    /// Seconds to wait for a response
    #[arg(long, default_value = "120")]
    timeout: u64,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Per-token PnL of a wallet
    Pnl { address: String },

    /// Wallet-wide PnL statistics
    Aggregated { address: String },

    /// Find the wallets trading a token
    Scrape {
        address: String,

        /// Chain of the token address (detected when omitted)
        #[arg(long, value_enum)]
        chain: Option<Chain>,
    },

    /// Add wallets to tracking
    AddWallets {
        /// Label prefix for the new wallets
        #[arg(long)]
        from_coin: String,

        #[arg(required = true)]
        wallets: Vec<String>,
    },

    /// Refresh and print the tracked-wallet list
    Tracked,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Chain {
    Ethereum,
    Solana,
}

impl From<Chain> for AddressType {
    fn from(chain: Chain) -> Self {
        match chain {
            Chain::Ethereum => AddressType::Ethereum,
            Chain::Solana => AddressType::Solana,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut telemetry = TelemetryConfig::from_env().with_service_name("relay-cli");
    if std::env::var("RELAY_LOG_LEVEL").is_err() && std::env::var("RUST_LOG").is_err() {
        telemetry.log_level = "warn".to_string();
    }
    init_tracing(&telemetry).context("Failed to initialize logging")?;

    let client = RelayClient::new(ClientConfig::new(args.url.clone()));
    client.connect();

    tokio::time::timeout(Duration::from_secs(args.connect_timeout), client.wait_connected())
        .await
        .map_err(|_| anyhow!("Could not connect to {} within {}s", args.url, args.connect_timeout))??;
    debug!(url = %args.url, "Connected");

    let options = RequestOptions::throwing().with_timeout(Duration::from_secs(args.timeout));
    let result = run(&client, args.command, options).await;

    client.shutdown().await;
    result
}

async fn run(client: &RelayClient, command: Command, options: RequestOptions) -> Result<()> {
    match command {
        Command::Pnl { address } => {
            let outcome = client.request_pnl(&address, options).await?;
            print_outcome(outcome)
        }

        Command::Aggregated { address } => {
            let outcome = client.request_aggregated_pnl(&address, options).await?;
            print_outcome(outcome)
        }

        Command::Scrape { address, chain } => {
            let address_type = match chain {
                Some(chain) => chain.into(),
                None => AddressType::detect(&address)
                    .with_context(|| format!("Cannot tell the chain of {address}; pass --chain"))?,
            };
            let outcome = client.request_scraping(&address, address_type, options).await?;
            print_outcome(outcome)
        }

        Command::AddWallets { from_coin, wallets } => {
            let total = wallets.len();
            let tally = client
                .add_wallets(
                    &wallets,
                    &from_coin,
                    |progress: &AddWalletsProgress| {
                        eprintln!(
                            "[{}/{}] added={} failed={}",
                            progress.processed(),
                            total,
                            progress.added.len(),
                            progress.errors.len()
                        );
                    },
                    options,
                )
                .await?
                .context("Relay returned no result")?;
            print_json(&tally)
        }

        Command::Tracked => {
            let wallets = client
                .refetch_tracked_wallets(options)
                .await?
                .context("Relay returned no result")?;
            print_json(&wallets)
        }
    }
}

fn print_outcome<T: Serialize>(outcome: Option<Outcome<T>>) -> Result<()> {
    let Some(outcome) = outcome else {
        bail!("Relay returned no result");
    };
    match outcome.into_result() {
        Ok(data) => print_json(&data),
        Err(error) => bail!("Request failed: {error}"),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
