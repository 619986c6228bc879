//! Think time configuration

use crate::error::ConfigResult;
use crate::validation::{validate_ordered, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Randomised pause between journey steps
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ThinkTimeConfig {
    /// Master switch; when false no pause is ever inserted
    #[serde(default = "crate::domains::utils::default_true")]
    pub enabled: bool,

    /// Shortest pause
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_min")]
    pub min: Duration,

    /// Longest pause
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_max")]
    pub max: Duration,
}

impl Default for ThinkTimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min: default_min(),
            max: default_max(),
        }
    }
}

impl Validatable for ThinkTimeConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_ordered(self.min, self.max, "min/max", self.domain_name())
    }

    fn domain_name(&self) -> &'static str {
        "think_time"
    }
}

fn default_min() -> Duration {
    Duration::from_millis(500)
}

fn default_max() -> Duration {
    Duration::from_secs(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_think_time_bounds() {
        let mut config = ThinkTimeConfig::default();
        assert!(config.validate().is_ok());

        config.min = Duration::from_secs(3);
        assert!(config.validate().is_err());
    }
}
