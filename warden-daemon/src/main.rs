//! warden-daemon entry point.
//!
//! Parses the command line, loads configuration, initializes tracing and
//! hands control to the [`Orchestrator`].

use anyhow::Result;
use clap::Parser;

use warden_core::config::WardenConfig;
use warden_daemon::Orchestrator;
use warden_daemon::cli::{DaemonCli, config_summary};
use warden_daemon::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();

    let mut config = WardenConfig::load(&cli.config)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {}", cli.config.display(), e))?;
    cli.apply_overrides(&mut config);
    config
        .validate()
        .map_err(|e| anyhow::anyhow!("invalid configuration: {}", e))?;

    if cli.validate {
        println!("configuration OK: {}", cli.config.display());
        println!("{}", config_summary(&config));
        return Ok(());
    }

    init_tracing(&config.general)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "warden-daemon starting"
    );

    let mut orchestrator = Orchestrator::build_from_config(config).await?;
    let result = orchestrator.run().await;

    match &result {
        Ok(()) => tracing::info!("warden-daemon shut down"),
        Err(e) => tracing::error!(error = %e, "warden-daemon exiting with error"),
    }
    result
}
