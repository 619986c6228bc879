//! Domain-driven configuration management for loadline
//!
//! Configuration is split by functional domain (target, think time, profiles,
//! test data, run control, logging), each with its own defaults and
//! validation. Values can be loaded from YAML and overridden through
//! `LOADLINE_*` environment variables.

pub mod error;
pub mod loader;
pub mod validation;

// Domain-specific configuration modules
pub mod domains;

// Re-export main types
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

// Re-export domain configurations
pub use domains::{
    data::{Address, DataConfig, PaymentCard},
    logging::{LogFormat, LogLevel, LoggingConfig},
    profiles::{
        LoadProfileConfig, ProfilesConfig, SmokeProfileConfig, SoakProfileConfig,
        StageFraction, StressProfileConfig,
    },
    run::{OverflowPolicy, RunConfig},
    target::TargetConfig,
    think_time::ThinkTimeConfig,
    LoadlineConfig,
};

// Re-export utilities
pub use domains::utils::{parse_duration, serde_duration};
