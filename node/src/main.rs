//! Boots an Amalgam node from an optional TOML configuration file.
//!
//! There is no peer-to-peer layer, so the binary's job is to prove the
//! configuration parses, logging comes up and the chain database opens
//! cleanly at genesis.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};

use amalgam_node::{Node, NodeConfig};
use amalgam_utils::init_logging;

#[derive(Parser)]
#[command(name = "amalgam-node", about = "Amalgam chain node")]
struct Cli {
    /// Path to a TOML configuration file. Omitted fields fall back to
    /// their defaults.
    #[arg(long, env = "AMALGAM_CONFIG")]
    config: Option<PathBuf>,

    /// Log level filter: "trace", "debug", "info", "warn", "error".
    /// Overrides the configuration file.
    #[arg(long, env = "AMALGAM_LOG_LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Print the default configuration as TOML and exit.
    PrintConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(Command::PrintConfig) = cli.command {
        print!("{}", NodeConfig::default().to_toml_string());
        return Ok(());
    }

    let mut config = match cli.config {
        Some(ref path) => NodeConfig::from_toml_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => NodeConfig::default(),
    };
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    init_logging(config.log_format()?, &config.log_level);

    let node = Node::open(config).context("opening the chain database")?;
    let (supply, abd_supply) = node.read_state(|s| {
        let g = s.global();
        (g.current_supply, g.current_abd_supply)
    });
    tracing::info!(
        head = node.head_block_num(),
        time = %node.head_block_time(),
        %supply,
        %abd_supply,
        "node ready"
    );
    Ok(())
}
