//! # Block Header Relay Node
//!
//! Entry point: parse flags, install logging, run until Ctrl+C.

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use node_runtime::{NodeConfig, RelayRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::parse();

    // RUST_LOG overrides the default level.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .try_init()
        .map_err(|e| anyhow::anyhow!("installing tracing subscriber: {e}"))?;

    let mut runtime = RelayRuntime::new(config)?;
    runtime.start().await?;

    info!("Relay node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    runtime.shutdown().await;
    Ok(())
}
