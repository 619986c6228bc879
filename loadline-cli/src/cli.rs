//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use loadline_core::ProfileKind;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a load profile against the target
    Run(RunArgs),

    /// List the available profiles with their schedules
    Profiles,

    /// Configuration management commands
    Config {
        #[command(subcommand)]
        config_cmd: ConfigCommands,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// Profile to run: smoke, load, stress, soak
    #[arg(value_name = "PROFILE", default_value = "smoke")]
    pub profile: ProfileKind,

    /// Serve canned storefront pages instead of calling the target
    #[arg(long)]
    pub offline: bool,

    /// Write the JSON run report to this file
    #[arg(long, value_name = "PATH")]
    pub summary_export: Option<PathBuf>,

    /// Run a fixed number of iterations instead of the arrival schedule
    #[arg(long, value_name = "COUNT")]
    pub iterations: Option<u64>,

    /// Run only this journey (browse, add_to_cart, checkout, currency)
    #[arg(long, value_name = "NAME")]
    pub journey: Option<String>,

    /// Override the target base URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Override the arrival rate (the peak rate for stress)
    #[arg(long, value_name = "PER_SECOND")]
    pub rate: Option<f64>,

    /// Override the run duration, e.g. 90s or 5m
    #[arg(long, value_name = "DURATION", value_parser = humantime::parse_duration)]
    pub duration: Option<Duration>,

    /// Seed for reproducible journey selection and data
    #[arg(long, value_name = "SEED")]
    pub seed: Option<u64>,

    /// Disable think time between steps
    #[arg(long)]
    pub no_think_time: bool,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Validate a configuration file
    Validate {
        /// Path to the configuration file
        #[arg(long, value_name = "PATH")]
        config_file: PathBuf,
    },

    /// Generate a sample configuration file with every default
    Generate {
        /// Output file path
        #[arg(long, value_name = "PATH")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}
