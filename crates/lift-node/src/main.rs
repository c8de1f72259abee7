use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lift_node::node::load_config;
use lift_node::Node;

/// Elevator fleet request synchronization node.
#[derive(Parser, Debug)]
#[command(name = "liftd", version, about)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Peer id of this controller, overriding the config file.
    #[arg(short, long)]
    peer_id: Option<u8>,

    /// UDP listen address, overriding the config file.
    #[arg(short, long)]
    listen: Option<SocketAddr>,

    /// Log filter, overriding RUST_LOG.
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let mut config = load_config(cli.config)?;
    if let Some(id) = cli.peer_id {
        config.node.peer_id = id;
    }
    if let Some(addr) = cli.listen {
        config.network.listen_addr = addr.to_string();
    }
    config.validate()?;

    tracing::info!(
        peer = config.node.peer_id,
        listen = %config.network.listen_addr,
        "Starting liftd"
    );

    Node::new(config).run().await
}
