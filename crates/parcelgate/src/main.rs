//! parcelgate - authenticating HTTP proxy for the Andreani carrier API.
//!
//! Main entry point for the parcelgate CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod wiring;

use commands::{login, serve};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// parcelgate - authenticating HTTP proxy for the Andreani carrier API
#[derive(Parser)]
#[command(name = "parcelgate")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file (overrides default discovery)
    #[arg(long, global = true, env = "PARCELGATE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the proxy server
    Serve(serve::ServeArgs),

    /// Log in once through the configured strategy and report the result
    Login(login::LoginArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is the normal case outside development.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let loaded = parcelgate_config::load_config(cli.config.as_deref())?;

    let filter = if cli.verbose {
        "parcelgate=debug,parcelgate_server=debug,parcelgate_auth=debug,parcelgate_carrier=debug,parcelgate_config=debug,tower_http=debug,info"
    } else {
        "parcelgate=info,parcelgate_server=info,parcelgate_auth=info,parcelgate_carrier=info,warn"
    };

    let file_layer = if loaded.config.logging.file {
        let log_dir = loaded
            .config
            .logging
            .directory
            .clone()
            .or_else(|| dirs::data_local_dir().map(|d| d.join("parcelgate").join("logs")))
            .unwrap_or_else(|| PathBuf::from("logs"));
        let file_appender = tracing_appender::rolling::daily(&log_dir, "parcelgate.log");
        Some(tracing_appender::non_blocking(file_appender))
    } else {
        None
    };
    let (file_writer, _guard) = match file_layer {
        Some((writer, guard)) => (Some(writer), Some(guard)),
        None => (None, None),
    };

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(file_writer.map(|writer| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(writer)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "parcelgate=trace,parcelgate_server=trace,parcelgate_auth=trace,parcelgate_carrier=trace,parcelgate_config=trace,info",
                ))
        }))
        .init();

    if let Some(source) = &loaded.source {
        tracing::info!(path = %source.display(), "Loaded config");
    }
    if !loaded.env_overrides.is_empty() {
        tracing::debug!(keys = ?loaded.env_overrides, "Applied environment overrides");
    }

    let ctx = commands::Context {
        config: loaded.config,
        verbose: cli.verbose,
    };

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Login(args) => login::run(args, &ctx).await,
    }
}
