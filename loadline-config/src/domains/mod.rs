//! Domain-specific configuration modules

pub mod data;
pub mod logging;
pub mod profiles;
pub mod run;
pub mod target;
pub mod think_time;
pub mod utils;

use crate::error::ConfigResult;
use crate::validation::Validatable;
use serde::{Deserialize, Serialize};

/// Main loadline configuration combining all domains
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoadlineConfig {
    /// Application under test
    #[serde(default)]
    pub target: target::TargetConfig,

    /// Pauses between journey steps
    #[serde(default)]
    pub think_time: think_time::ThinkTimeConfig,

    /// Scenario profile parameters
    #[serde(default)]
    pub profiles: profiles::ProfilesConfig,

    /// Identifier harvesting and form fixtures
    #[serde(default)]
    pub data: data::DataConfig,

    /// Run-wide control settings
    #[serde(default)]
    pub run: run::RunConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: logging::LoggingConfig,
}

impl LoadlineConfig {
    /// Validate all domain configurations
    pub fn validate_all(&self) -> ConfigResult<()> {
        self.target.validate()?;
        self.think_time.validate()?;
        self.profiles.validate()?;
        self.data.validate()?;
        self.run.validate()?;
        self.logging.validate()?;
        Ok(())
    }

    /// Generate a sample configuration file
    pub fn generate_sample() -> String {
        let config = LoadlineConfig::default();
        serde_yaml::to_string(&config)
            .unwrap_or_else(|_| "# Failed to generate sample config".to_string())
    }
}
