#![forbid(unsafe_code)]
//! Ledger node: serves the HTTP API over a fresh in-memory ledger.

use clap::Parser;
use hashledger::api::run_api_server;
use hashledger::config::{load_config, DEFAULT_CONFIG_PATH};
use hashledger::node::Node;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "hashledger-node", about = "Proof-of-work ledger node")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Port to serve the API on (overrides network.api_port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Additional peer to register at startup (repeatable)
    #[arg(long = "peer")]
    peers: Vec<String>,

    /// Identity credited with mining rewards (defaults to a random id)
    #[arg(long)]
    miner_id: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;
    config.network.bootstrap_peers.extend(cli.peers);
    let port = cli.port.unwrap_or(config.network.api_port);

    let identifier = cli
        .miner_id
        .unwrap_or_else(|| hex::encode(rand::random::<[u8; 16]>()));

    let node = Arc::new(Node::from_config(&config, identifier)?);
    info!(
        node = %node.identifier(),
        difficulty = config.ledger.difficulty,
        block_size = config.ledger.block_size,
        peers = ?node.peers().await,
        "starting ledger node"
    );

    run_api_server(node, port).await
}
