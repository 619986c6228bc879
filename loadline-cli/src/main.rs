mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Commands, ConfigCommands};
use loadline_config::{ConfigLoader, LoadlineConfig, LogLevel};
use loadline_core::Verdict;
use loadline_logging::init_logging_from_config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};

/// Exit status of a run whose thresholds failed or that aborted
const EXIT_THRESHOLDS_FAILED: u8 = 99;

/// Load configuration from file or use defaults
fn load_config(config_path: Option<&PathBuf>) -> Result<LoadlineConfig> {
    let loader = ConfigLoader::new();

    match config_path {
        Some(path) => {
            if path.exists() {
                loader
                    .from_file(path)
                    .context(format!("Failed to load configuration from {:?}", path))
            } else {
                warn!("Configuration file not found: {:?}. Using defaults.", path);
                loader
                    .from_env()
                    .context("Failed to load configuration from environment")
            }
        }
        None => {
            debug!("No configuration file specified. Loading from environment or defaults.");
            loader
                .from_env()
                .context("Failed to load configuration from environment")
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Load configuration first
    let mut config = load_config(cli.config.as_ref())?;

    if let Some(level) = &cli.log_level {
        config.logging.level = level
            .parse::<LogLevel>()
            .map_err(|e| anyhow::anyhow!(e))?;
    }
    init_logging_from_config(&config.logging)?;

    info!("Loadline CLI starting");

    match &cli.command {
        Commands::Run(args) => {
            let verdict = commands::run_command(config, args).await?;
            if verdict == Verdict::Pass {
                Ok(ExitCode::SUCCESS)
            } else {
                Ok(ExitCode::from(EXIT_THRESHOLDS_FAILED))
            }
        }
        Commands::Profiles => {
            commands::profiles_command(&config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Config { config_cmd } => {
            match config_cmd {
                ConfigCommands::Validate { config_file } => {
                    commands::handle_config_validate(config_file)?
                }
                ConfigCommands::Generate { output, force } => {
                    commands::handle_config_generate(output, *force)?
                }
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
