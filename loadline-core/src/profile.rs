//! Scenario profiles
//!
//! A [`ScenarioProfile`] binds a scheduler configuration, a journey catalog
//! and a threshold set into one runnable, immutable description of a run.
//! The four named profiles are built from [`LoadlineConfig`].

use loadline_config::{DataConfig, LoadlineConfig, RunConfig};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::journey::{JourneyCatalog, Step};
use crate::scheduler::{RateProfile, SchedulePlan, SchedulerConfig, Stage};
use crate::storefront;
use crate::template::DataPools;
use crate::think_time::ThinkTime;
use crate::threshold::ThresholdSpec;

/// The named profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileKind {
    Smoke,
    Load,
    Stress,
    Soak,
}

impl ProfileKind {
    pub fn all() -> [ProfileKind; 4] {
        [
            ProfileKind::Smoke,
            ProfileKind::Load,
            ProfileKind::Stress,
            ProfileKind::Soak,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileKind::Smoke => "smoke",
            ProfileKind::Load => "load",
            ProfileKind::Stress => "stress",
            ProfileKind::Soak => "soak",
        }
    }

    /// One-line description for listings
    pub fn description(&self) -> &'static str {
        match self {
            ProfileKind::Smoke => "low constant rate, short duration, all journeys equally weighted",
            ProfileKind::Load => "production-like constant rate with the 40/30/20/10 journey mix",
            ProfileKind::Stress => "ramp from zero through 110% of the peak rate and back, observe only",
            ProfileKind::Soak => "low constant rate for a long time, flags slow responses",
        }
    }
}

impl fmt::Display for ProfileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProfileKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "smoke" => Ok(ProfileKind::Smoke),
            "load" => Ok(ProfileKind::Load),
            "stress" => Ok(ProfileKind::Stress),
            "soak" => Ok(ProfileKind::Soak),
            _ => Err(EngineError::UnknownProfile(s.to_string())),
        }
    }
}

/// Everything a run needs, fixed before it starts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioProfile {
    pub name: String,
    pub scheduler: SchedulerConfig,
    pub thresholds: Vec<ThresholdSpec>,
    pub catalog: JourneyCatalog,
    pub think_time: ThinkTime,

    /// Pattern used to harvest identifiers from response bodies
    pub id_pattern: String,
    /// Identifiers used when nothing was harvested
    pub fallback_ids: Vec<String>,
    pub pools: DataPools,

    /// Responses slower than this feed the degradation rate
    #[serde(default, with = "humantime_serde")]
    pub slow_request: Option<Duration>,

    /// Step run once before the schedule to discover identifiers
    #[serde(default)]
    pub setup: Option<Step>,

    #[serde(default)]
    pub seed: Option<u64>,
    #[serde(with = "humantime_serde")]
    pub graceful_stop: Duration,
    #[serde(with = "humantime_serde")]
    pub threshold_interval: Duration,

    /// Logical host cookies are scoped to
    pub host: String,
    #[serde(default)]
    pub default_headers: Vec<(String, String)>,
}

impl ScenarioProfile {
    /// Create a profile with no thresholds, no think time and no setup
    pub fn new(name: impl Into<String>, scheduler: SchedulerConfig, catalog: JourneyCatalog) -> Self {
        let data = DataConfig::default();
        let run = RunConfig::default();
        Self {
            name: name.into(),
            scheduler,
            thresholds: Vec::new(),
            catalog,
            think_time: ThinkTime::disabled(),
            id_pattern: data.id_pattern,
            fallback_ids: data.fallback_ids,
            pools: DataPools::new(),
            slow_request: None,
            setup: None,
            seed: None,
            graceful_stop: run.graceful_stop,
            threshold_interval: run.threshold_interval,
            host: "default".to_string(),
            default_headers: Vec::new(),
        }
    }

    /// Build a named profile from configuration
    pub fn from_config(kind: ProfileKind, config: &LoadlineConfig) -> EngineResult<Self> {
        let profiles = &config.profiles;
        let (scheduler, slow_request) = match kind {
            ProfileKind::Smoke => {
                let p = &profiles.smoke;
                let rate = RateProfile::constant(p.rate, p.duration);
                (SchedulerConfig::arrival(rate, p.pre_allocated, p.max_concurrency), None)
            }
            ProfileKind::Load => {
                let p = &profiles.load;
                let rate = RateProfile::constant(p.rate, p.duration);
                (SchedulerConfig::arrival(rate, p.pre_allocated, p.max_concurrency), None)
            }
            ProfileKind::Stress => {
                let p = &profiles.stress;
                let stages = p
                    .stages
                    .iter()
                    .map(|stage| Stage::new(stage.fraction * p.peak_rate, stage.duration))
                    .collect();
                let rate = RateProfile::ramping(0.0, stages);
                (SchedulerConfig::arrival(rate, p.pre_allocated, p.max_concurrency), None)
            }
            ProfileKind::Soak => {
                let p = &profiles.soak;
                let rate = RateProfile::constant(p.rate, p.duration);
                (
                    SchedulerConfig::arrival(rate, p.pre_allocated, p.max_concurrency),
                    Some(p.slow_request_bound),
                )
            }
        };

        let catalog = match kind {
            ProfileKind::Smoke => storefront::smoke_catalog(),
            _ => storefront::catalog(),
        };

        let profile = Self {
            name: kind.to_string(),
            scheduler: scheduler.with_overflow(config.run.overflow),
            thresholds: storefront::thresholds(kind)?,
            catalog,
            think_time: ThinkTime::from_config(&config.think_time),
            id_pattern: config.data.id_pattern.clone(),
            fallback_ids: config.data.fallback_ids.clone(),
            pools: storefront::pools(&config.data),
            slow_request,
            setup: config.run.setup_preload.then(storefront::setup_step),
            seed: config.run.seed,
            graceful_stop: config.run.graceful_stop,
            threshold_interval: config.run.threshold_interval,
            host: config.target.host(),
            default_headers: config
                .target
                .headers
                .iter()
                .map(|(name, value)| (name.clone(), value.clone()))
                .collect(),
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Replace the arrival schedule by a fixed number of iterations shared by
    /// the profile's workers
    pub fn with_iterations(mut self, count: u64, max_duration: Duration) -> Self {
        self.scheduler.plan = SchedulePlan::Iterations {
            count,
            max_duration,
        };
        self
    }

    /// Keep only one journey
    pub fn restrict_to_journey(mut self, name: &str) -> EngineResult<Self> {
        self.catalog = self.catalog.restricted_to(name)?;
        Ok(self)
    }

    pub fn without_think_time(mut self) -> Self {
        self.think_time = ThinkTime::disabled();
        self
    }

    pub fn without_setup(mut self) -> Self {
        self.setup = None;
        self
    }

    pub fn with_thresholds(mut self, thresholds: Vec<ThresholdSpec>) -> Self {
        self.thresholds = thresholds;
        self
    }

    pub fn with_think_time(mut self, think_time: ThinkTime) -> Self {
        self.think_time = think_time;
        self
    }

    pub fn with_pools(mut self, pools: DataPools) -> Self {
        self.pools = pools;
        self
    }

    pub fn with_setup(mut self, step: Step) -> Self {
        self.setup = Some(step);
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_id_pattern(mut self, pattern: impl Into<String>, fallback_ids: Vec<String>) -> Self {
        self.id_pattern = pattern.into();
        self.fallback_ids = fallback_ids;
        self
    }

    pub fn with_slow_request(mut self, bound: Duration) -> Self {
        self.slow_request = Some(bound);
        self
    }

    pub fn with_threshold_interval(mut self, interval: Duration) -> Self {
        self.threshold_interval = interval;
        self
    }

    pub fn with_graceful_stop(mut self, grace: Duration) -> Self {
        self.graceful_stop = grace;
        self
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Check everything that could otherwise fail mid-run
    pub fn validate(&self) -> EngineResult<()> {
        self.scheduler.validate()?;
        self.catalog.validate(&self.pools)?;
        Regex::new(&self.id_pattern)?;
        if self.threshold_interval.is_zero() {
            return Err(EngineError::ConfigurationError(
                "threshold interval must be positive".to_string(),
            ));
        }
        if let Some(step) = &self.setup {
            step.request.validate(&self.pools)?;
        }
        Ok(())
    }
}
