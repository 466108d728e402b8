//! Attesta node — entry point.
//!
//! Runs one side of the credential propagation pipeline (issuer or verifier)
//! with configuration from a TOML file or defaults.

// Public APIs for node internals — used by tests and external consumers.
#![allow(dead_code)]

mod api;
mod config;
mod issuance;
mod node;
mod storage;
mod verification;

use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{NodeConfig, Role};
use node::AttestaNode;

/// Attesta Node
#[derive(Parser, Debug)]
#[command(name = "attesta-node", version, about = "Attesta credential node")]
struct Args {
    /// Path to the configuration file (TOML).
    #[arg(short, long, default_value = "attesta.toml")]
    config: PathBuf,

    /// Override the node role.
    #[arg(long, value_enum)]
    role: Option<Role>,

    /// Override the API port.
    #[arg(long)]
    port: Option<u16>,

    /// Override the data directory.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,

    /// Generate a default config file and exit.
    #[arg(long)]
    init: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.init {
        let config = NodeConfig::default();
        config.save(&args.config)?;
        println!("wrote default config to {}", args.config.display());
        return Ok(());
    }

    // Load configuration and apply CLI overrides
    let mut config = NodeConfig::load(&args.config)?;
    if let Some(role) = args.role {
        config.service.role = role;
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if let Some(ref data_dir) = args.data_dir {
        config.storage.data_dir = data_dir.clone();
    }
    if let Some(ref level) = args.log_level {
        config.logging.level = level.clone();
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }

    tracing::info!("Attesta node v{}", env!("CARGO_PKG_VERSION"));

    let mut node = AttestaNode::new(config);
    node.start().await?;

    // Graceful shutdown on SIGINT
    tokio::signal::ctrl_c().await?;
    tracing::info!("received shutdown signal");

    node.shutdown().await;
    tracing::info!("Attesta node exited cleanly");
    Ok(())
}
