//! multitick daemon - phase-aligned ticker broadcaster
//!
//! Starts one ticker, attaches the configured number of subscribers and prints every
//! tick they receive as a JSON line on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use multitick_daemon::cli::Args;
use multitick_daemon::config::DaemonConfig;
use multitick_daemon::runner;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .init();

    info!("⏱️ Starting multitick daemon v{}", env!("CARGO_PKG_VERSION"));

    let args = Args::parse();

    // Load configuration
    let mut config = DaemonConfig::load(args.config.as_deref())
        .context("Failed to load configuration")?;
    info!("📋 Configuration loaded from {}", config.config_path.display());

    args.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let mut stdout = tokio::io::stdout();
    let summary = runner::run(&config, args.count, shutdown, &mut stdout).await?;

    info!(
        "👋 multitick daemon stopped ({} ticks, {} dropped)",
        summary.ticks, summary.dropped
    );

    Ok(())
}
