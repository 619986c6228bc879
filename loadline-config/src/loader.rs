//! Configuration loading and environment variable handling

use crate::domains::utils::parse_duration;
use crate::domains::LoadlineConfig;
use crate::error::{ConfigError, ConfigResult};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

/// Configuration loader with environment variable support
pub struct ConfigLoader {
    /// Environment variable prefix
    prefix: String,
}

impl ConfigLoader {
    /// Create a new config loader with default prefix
    pub fn new() -> Self {
        Self {
            prefix: "LOADLINE".to_string(),
        }
    }

    /// Create a new config loader with custom prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Load configuration from a YAML file with environment overrides
    pub fn from_file(&self, path: impl AsRef<Path>) -> ConfigResult<LoadlineConfig> {
        let path = path.as_ref();
        debug!("Loading configuration from {}", path.display());

        let content = std::fs::read_to_string(path)?;
        let mut config: LoadlineConfig = serde_yaml::from_str(&content)?;

        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env(&self) -> ConfigResult<LoadlineConfig> {
        let mut config = LoadlineConfig::default();
        self.apply_env_overrides(&mut config)?;
        config.validate_all()?;
        Ok(config)
    }

    /// Load configuration with fallback chain
    pub fn load(&self, config_path: Option<impl AsRef<Path>>) -> ConfigResult<LoadlineConfig> {
        match config_path {
            Some(path) => self.from_file(path),
            None => self.from_env(),
        }
    }

    /// Apply environment variable overrides to configuration
    fn apply_env_overrides(&self, config: &mut LoadlineConfig) -> ConfigResult<()> {
        self.apply_target_overrides(config)?;
        self.apply_think_time_overrides(config)?;
        self.apply_profile_overrides(config)?;
        self.apply_run_overrides(config)?;
        self.apply_logging_overrides(config)?;
        Ok(())
    }

    fn apply_target_overrides(&self, config: &mut LoadlineConfig) -> ConfigResult<()> {
        if let Ok(base_url) = self.get_env_var("BASE_URL") {
            config.target.base_url = base_url.trim_end_matches('/').to_string();
        }

        if let Some(timeout) = self.duration_var("TIMEOUT_CONNECT")? {
            config.target.connect_timeout = timeout;
        }

        if let Some(timeout) = self.duration_var("TIMEOUT_READ")? {
            config.target.request_timeout = timeout;
        }

        Ok(())
    }

    fn apply_think_time_overrides(&self, config: &mut LoadlineConfig) -> ConfigResult<()> {
        // THINK_TIME=0 turns pauses off, any other value leaves them on
        if let Ok(flag) = self.get_env_var("THINK_TIME") {
            config.think_time.enabled = flag.trim() != "0";
        }

        if let Some(min) = self.duration_var("THINK_TIME_MIN")? {
            config.think_time.min = min;
        }

        if let Some(max) = self.duration_var("THINK_TIME_MAX")? {
            config.think_time.max = max;
        }

        Ok(())
    }

    fn apply_profile_overrides(&self, config: &mut LoadlineConfig) -> ConfigResult<()> {
        let profiles = &mut config.profiles;

        if let Some(rate) = self.parsed_var::<f64>("RATE")? {
            profiles.load.rate = rate;
        }
        if let Some(duration) = self.duration_var("DURATION")? {
            profiles.load.duration = duration;
        }
        if let Some(pre_allocated) = self.parsed_var::<usize>("PRE_ALLOC")? {
            profiles.load.pre_allocated = pre_allocated;
            profiles.soak.pre_allocated = pre_allocated;
        }
        if let Some(max) = self.parsed_var::<usize>("MAX_VUS")? {
            profiles.load.max_concurrency = max;
            profiles.soak.max_concurrency = max;
        }

        if let Some(rate) = self.parsed_var::<f64>("SMOKE_RATE")? {
            profiles.smoke.rate = rate;
        }
        if let Some(duration) = self.duration_var("SMOKE_DURATION")? {
            profiles.smoke.duration = duration;
        }

        if let Some(rate) = self.parsed_var::<f64>("STRESS_MAX_RATE")? {
            profiles.stress.peak_rate = rate;
        }

        if let Some(rate) = self.parsed_var::<f64>("SOAK_RATE")? {
            profiles.soak.rate = rate;
        }
        if let Some(duration) = self.duration_var("SOAK_DURATION")? {
            profiles.soak.duration = duration;
        }

        Ok(())
    }

    fn apply_run_overrides(&self, config: &mut LoadlineConfig) -> ConfigResult<()> {
        if let Some(seed) = self.parsed_var::<u64>("SEED")? {
            config.run.seed = Some(seed);
        }

        if let Ok(overflow) = self.get_env_var("OVERFLOW") {
            config.run.overflow = overflow.parse().map_err(ConfigError::EnvError)?;
        }

        if let Some(graceful_stop) = self.duration_var("GRACEFUL_STOP")? {
            config.run.graceful_stop = graceful_stop;
        }

        Ok(())
    }

    fn apply_logging_overrides(&self, config: &mut LoadlineConfig) -> ConfigResult<()> {
        if let Ok(log_level) = self.get_env_var("LOG_LEVEL") {
            config.logging.level = crate::domains::logging::LogLevel::from_str(&log_level)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_LEVEL: {}", log_level)))?;
        }

        if let Ok(format) = self.get_env_var("LOG_FORMAT") {
            config.logging.format = crate::domains::logging::LogFormat::from_str(&format)
                .map_err(|_| ConfigError::EnvError(format!("Invalid LOG_FORMAT: {}", format)))?;
        }

        Ok(())
    }

    /// Read and parse an optional prefixed variable
    fn parsed_var<T>(&self, name: &str) -> ConfigResult<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get_env_var(name) {
            Ok(raw) => raw
                .trim()
                .parse::<T>()
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Read an optional prefixed duration (seconds or human string)
    fn duration_var(&self, name: &str) -> ConfigResult<Option<Duration>> {
        match self.get_env_var(name) {
            Ok(raw) => parse_duration(&raw)
                .map(Some)
                .map_err(|e| ConfigError::EnvError(format!("Invalid {}: {}", name, e))),
            Err(_) => Ok(None),
        }
    }

    /// Get environment variable with prefix
    fn get_env_var(&self, name: &str) -> Result<String, std::env::VarError> {
        std::env::var(format!("{}_{}", self.prefix, name))
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
