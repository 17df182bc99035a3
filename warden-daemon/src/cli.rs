//! CLI argument definitions for warden-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use warden_core::config::WardenConfig;

/// Warden feed watcher daemon.
///
/// Subscribes to the configured feed, records every star system seen in the
/// target faction state for the first time, and logs each new detection.
#[derive(Parser, Debug)]
#[command(name = "warden-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to warden.toml configuration file.
    #[arg(short, long, default_value = "/etc/warden/warden.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_overrides(&self, config: &mut WardenConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}

/// One-line-per-setting summary printed by `--validate`.
pub fn config_summary(config: &WardenConfig) -> String {
    let registry_target = match config.registry.backend.as_str() {
        "postgres" => "postgres (url hidden)".to_owned(),
        _ => format!("sqlite ({})", config.registry.sqlite_path),
    };
    format!(
        "feed endpoint:   {}\n\
         schema:          {}\n\
         faction state:   {}\n\
         registry:        {}\n\
         log:             {} ({})\n\
         metrics:         {}",
        config.feed.endpoint,
        config.filter.schema_ref,
        config.filter.faction_state,
        registry_target,
        config.general.log_level,
        config.general.log_format,
        if config.metrics.enabled {
            format!("{}:{}{}", config.metrics.listen_addr, config.metrics.port, config.metrics.endpoint)
        } else {
            "disabled".to_owned()
        },
    )
}
