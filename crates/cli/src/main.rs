//! Provisioner CLI - Main Entry Point
//!
//! Orders, inspects and decommissions nodes through the provisioning
//! orchestrator, backed by a local simulated vendor.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod output;

use commands::{catalog, config, node, Session};

/// Provisioner CLI - bare-metal and virtual server orchestration
#[derive(Parser)]
#[command(name = "provisioner")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file
    #[arg(long, env = "PROVISIONER_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(flatten)]
    Node(node::NodeCommands),

    #[command(flatten)]
    Catalog(catalog::CatalogCommands),

    /// Inspect or create the configuration file
    #[command(subcommand)]
    Config(config::ConfigCommands),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli
        .config
        .unwrap_or_else(provisioner_common::default_config_path);

    match cli.command {
        Commands::Config(cmd) => config::execute(cmd, &config_path, cli.format)?,
        Commands::Node(cmd) => {
            let session = Session::open(&config_path)?;
            let result = node::execute(cmd, &session, cli.format).await;
            session.close()?;
            result?;
        }
        Commands::Catalog(cmd) => {
            let session = Session::open(&config_path)?;
            catalog::execute(cmd, &session, cli.format).await?;
        }
    }

    Ok(())
}
