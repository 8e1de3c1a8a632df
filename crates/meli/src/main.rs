//! meli - OAuth-aware Mercado Libre search proxy
//!
//! Main entry point for the meli CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{config, refresh, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// meli - OAuth-aware Mercado Libre search proxy
#[derive(Parser)]
#[command(name = "meli")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "MELI_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Directory containing a project-local meli.toml (default: cwd)
    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the search proxy server
    Serve(serve::ServeArgs),

    /// Exchange the configured refresh token for a new token pair
    Refresh(refresh::RefreshArgs),

    /// Show the effective configuration
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing - console (human-readable) + rotating JSON file
    let filter = if cli.verbose {
        "meli=debug,meli_oauth=debug,meli_config=debug,tower_http=debug,info"
    } else {
        "meli=info,meli_oauth=info,warn"
    };

    let log_dir = cli
        .config_dir
        .clone()
        .or_else(meli_config::user_config_dir)
        .map(|d| d.join("logs"))
        .unwrap_or_else(|| PathBuf::from("logs"));
    let file_appender = tracing_appender::rolling::daily(&log_dir, "meli.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
                ),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "meli=trace,meli_oauth=trace,meli_config=trace,info",
                )),
        )
        .init();

    let ctx = commands::Context {
        config_dir: cli.config_dir,
        project_dir: cli.project_dir,
        verbose: cli.verbose,
    };

    // Dispatch to command handlers
    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Refresh(args) => refresh::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    }
}
