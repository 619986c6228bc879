//! Scenario profile parameters
//!
//! Each named profile gets its own section so the defaults can differ
//! (smoke is tiny, soak is long, stress ramps towards a peak).

use crate::error::{ConfigError, ConfigResult};
use crate::validation::{validate_non_empty, validate_ordered, validate_positive, Validatable};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Parameters for all four scenario profiles
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ProfilesConfig {
    #[serde(default)]
    pub smoke: SmokeProfileConfig,

    #[serde(default)]
    pub load: LoadProfileConfig,

    #[serde(default)]
    pub stress: StressProfileConfig,

    #[serde(default)]
    pub soak: SoakProfileConfig,
}

/// Low constant rate, short duration, every journey
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SmokeProfileConfig {
    /// Iterations started per second
    pub rate: f64,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub duration: Duration,

    /// Workers allocated up front
    pub pre_allocated: usize,

    /// Hard cap on concurrent iterations
    pub max_concurrency: usize,
}

/// Production-like constant arrival rate with the weighted journey mix
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadProfileConfig {
    pub rate: f64,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub duration: Duration,

    pub pre_allocated: usize,

    pub max_concurrency: usize,
}

/// Ramp towards (and past) a peak rate, then back down
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StressProfileConfig {
    /// Peak arrival rate; stage targets are fractions of this
    pub peak_rate: f64,

    pub pre_allocated: usize,

    pub max_concurrency: usize,

    /// Ramp stages, applied in order starting from a rate of zero
    pub stages: Vec<StageFraction>,
}

/// One ramp stage expressed relative to the stress peak
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageFraction {
    /// Target rate as a fraction of `peak_rate` reached at the end of the stage
    pub fraction: f64,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub duration: Duration,
}

/// Long-running low rate that also flags slow responses
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SoakProfileConfig {
    pub rate: f64,

    #[serde(with = "crate::domains::utils::serde_duration")]
    pub duration: Duration,

    pub pre_allocated: usize,

    pub max_concurrency: usize,

    /// Responses slower than this count towards the degradation rate
    #[serde(with = "crate::domains::utils::serde_duration")]
    pub slow_request_bound: Duration,
}

impl Default for SmokeProfileConfig {
    fn default() -> Self {
        Self {
            rate: 1.0,
            duration: Duration::from_secs(120),
            pre_allocated: 2,
            max_concurrency: 5,
        }
    }
}

impl Default for LoadProfileConfig {
    fn default() -> Self {
        Self {
            rate: 10.0,
            duration: Duration::from_secs(300),
            pre_allocated: 20,
            max_concurrency: 100,
        }
    }
}

impl Default for StressProfileConfig {
    fn default() -> Self {
        let minutes = |m: u64| Duration::from_secs(m * 60);
        Self {
            peak_rate: 100.0,
            pre_allocated: 50,
            max_concurrency: 200,
            stages: vec![
                StageFraction { fraction: 0.1, duration: minutes(2) },
                StageFraction { fraction: 0.3, duration: minutes(3) },
                StageFraction { fraction: 0.5, duration: minutes(3) },
                StageFraction { fraction: 0.7, duration: minutes(3) },
                StageFraction { fraction: 1.0, duration: minutes(5) },
                StageFraction { fraction: 1.1, duration: minutes(3) },
                StageFraction { fraction: 0.3, duration: minutes(2) },
                StageFraction { fraction: 0.0, duration: minutes(1) },
            ],
        }
    }
}

impl Default for SoakProfileConfig {
    fn default() -> Self {
        Self {
            rate: 5.0,
            duration: Duration::from_secs(30 * 60),
            pre_allocated: 20,
            max_concurrency: 100,
            slow_request_bound: Duration::from_secs(2),
        }
    }
}

/// Shared checks for the constant-rate profiles
fn validate_arrival(
    rate: f64,
    duration: Duration,
    pre_allocated: usize,
    max_concurrency: usize,
    domain: &str,
) -> ConfigResult<()> {
    if !rate.is_finite() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("rate must be finite, got {}", rate),
        });
    }
    validate_positive(rate, "rate", domain)?;
    validate_positive(duration.as_millis(), "duration", domain)?;
    validate_positive(max_concurrency, "max_concurrency", domain)?;
    validate_ordered(pre_allocated, max_concurrency, "pre_allocated/max_concurrency", domain)
}

impl Validatable for ProfilesConfig {
    fn validate(&self) -> ConfigResult<()> {
        self.smoke.validate()?;
        self.load.validate()?;
        self.stress.validate()?;
        self.soak.validate()?;
        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "profiles"
    }
}

impl Validatable for SmokeProfileConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_arrival(
            self.rate,
            self.duration,
            self.pre_allocated,
            self.max_concurrency,
            self.domain_name(),
        )
    }

    fn domain_name(&self) -> &'static str {
        "profiles.smoke"
    }
}

impl Validatable for LoadProfileConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_arrival(
            self.rate,
            self.duration,
            self.pre_allocated,
            self.max_concurrency,
            self.domain_name(),
        )
    }

    fn domain_name(&self) -> &'static str {
        "profiles.load"
    }
}

impl Validatable for SoakProfileConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_arrival(
            self.rate,
            self.duration,
            self.pre_allocated,
            self.max_concurrency,
            self.domain_name(),
        )?;
        validate_positive(
            self.slow_request_bound.as_millis(),
            "slow_request_bound",
            self.domain_name(),
        )
    }

    fn domain_name(&self) -> &'static str {
        "profiles.soak"
    }
}

impl Validatable for StressProfileConfig {
    fn validate(&self) -> ConfigResult<()> {
        if !self.peak_rate.is_finite() {
            return Err(self.validation_error("peak_rate must be finite"));
        }
        validate_positive(self.peak_rate, "peak_rate", self.domain_name())?;
        validate_positive(self.max_concurrency, "max_concurrency", self.domain_name())?;
        validate_ordered(
            self.pre_allocated,
            self.max_concurrency,
            "pre_allocated/max_concurrency",
            self.domain_name(),
        )?;
        validate_non_empty(&self.stages, "stages", self.domain_name())?;

        for (index, stage) in self.stages.iter().enumerate() {
            if !stage.fraction.is_finite() || stage.fraction < 0.0 {
                return Err(self.validation_error(format!(
                    "stage {} fraction must be a non-negative number, got {}",
                    index, stage.fraction
                )));
            }
            if stage.duration.is_zero() {
                return Err(self.validation_error(format!("stage {} has zero duration", index)));
            }
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "profiles.stress"
    }
}

impl StressProfileConfig {
    /// Total time spent across every ramp stage
    pub fn total_duration(&self) -> Duration {
        self.stages.iter().map(|s| s.duration).sum()
    }
}
