//! Run control configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Settings shared by every profile for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    /// Seed for journey selection, think time and request data. Unset means
    /// a fresh seed per run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// How long in-flight iterations may keep running after the run ends
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_graceful_stop")]
    pub graceful_stop: Duration,

    /// How often abort-on-fail thresholds are checked during the run
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_threshold_interval")]
    pub threshold_interval: Duration,

    /// What to do with an iteration that is due while the pool is saturated
    #[serde(default)]
    pub overflow: OverflowPolicy,

    /// Run a harvesting request once before the schedule starts
    #[serde(default = "crate::domains::utils::default_true")]
    pub setup_preload: bool,
}

/// Saturated-pool behaviour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Skip the iteration and count it as dropped
    #[default]
    Drop,
    /// Start the iteration as soon as a worker frees up
    Delay,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            seed: None,
            graceful_stop: default_graceful_stop(),
            threshold_interval: default_threshold_interval(),
            overflow: OverflowPolicy::default(),
            setup_preload: true,
        }
    }
}

impl fmt::Display for OverflowPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OverflowPolicy::Drop => write!(f, "drop"),
            OverflowPolicy::Delay => write!(f, "delay"),
        }
    }
}

impl FromStr for OverflowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "drop" => Ok(OverflowPolicy::Drop),
            "delay" => Ok(OverflowPolicy::Delay),
            _ => Err(format!("Invalid overflow policy: {}", s)),
        }
    }
}

impl Validatable for RunConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_positive(
            self.threshold_interval.as_millis(),
            "threshold_interval",
            self.domain_name(),
        )
    }

    fn domain_name(&self) -> &'static str {
        "run"
    }
}

fn default_graceful_stop() -> Duration {
    Duration::from_secs(30)
}

fn default_threshold_interval() -> Duration {
    Duration::from_secs(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overflow_policy_parse() {
        assert_eq!("drop".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Drop);
        assert_eq!("DELAY".parse::<OverflowPolicy>().unwrap(), OverflowPolicy::Delay);
        assert!("queue".parse::<OverflowPolicy>().is_err());
    }

    #[test]
    fn test_run_config_validation() {
        let mut config = RunConfig::default();
        assert!(config.validate().is_ok());

        config.threshold_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
