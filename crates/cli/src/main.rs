//! Hearthmind CLI — the main entry point.
//!
//! Commands:
//! - `serve` — Run a domain server over line-delimited JSON on stdio
//! - `tools` — Print the tool definitions a domain server would expose

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "hearthmind",
    about = "Hearthmind — cross-domain assistant tool servers",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a domain server over stdio
    Serve {
        /// Path to the config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the configured domain
        #[arg(short, long)]
        domain: Option<String>,
    },

    /// Print the tool definitions for a domain
    Tools {
        /// Domain to list tools for
        #[arg(short, long)]
        domain: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout carries the wire protocol; logs go to stderr.
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Serve { config, domain } => commands::serve::run(config, domain).await?,
        Commands::Tools { domain } => commands::tools::run(domain).await?,
    }

    Ok(())
}
