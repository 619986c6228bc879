//! Engine error types

use thiserror::Error;

/// Engine result type
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors raised while building or starting a run.
///
/// Failures that happen while traffic is flowing (assertions, transport
/// errors, saturated pools, threshold breaches) are recorded as metrics
/// instead and never surface here.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid journey catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid threshold '{key}': {message}")]
    InvalidThreshold { key: String, message: String },

    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    #[error("Invalid identifier pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Request template error: {0}")]
    Template(String),

    #[error("Invalid HTTP method: {0}")]
    InvalidMethod(String),

    #[error("Unknown profile: {0}")]
    UnknownProfile(String),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

// Convert from config errors
impl From<loadline_config::ConfigError> for EngineError {
    fn from(err: loadline_config::ConfigError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}
