//! Configuration validation traits and utilities

use crate::error::{ConfigError, ConfigResult};

/// Trait for validatable configuration
pub trait Validatable {
    /// Validate the configuration
    fn validate(&self) -> ConfigResult<()>;

    /// Get the domain name for error reporting
    fn domain_name(&self) -> &'static str;

    /// Helper to create a domain-specific validation error
    fn validation_error(&self, message: impl Into<String>) -> ConfigError {
        ConfigError::DomainError {
            domain: self.domain_name().to_string(),
            message: message.into(),
        }
    }
}

/// Validate a required string field
pub fn validate_required_string(value: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    if value.trim().is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} cannot be empty", field_name),
        });
    }
    Ok(())
}

/// Validate a positive number
pub fn validate_positive<T>(value: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + Default + std::fmt::Display,
{
    if value <= T::default() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must be greater than 0, got {}", field_name, value),
        });
    }
    Ok(())
}

/// Validate that `low <= high`
pub fn validate_ordered<T>(low: T, high: T, field_name: &str, domain: &str) -> ConfigResult<()>
where
    T: PartialOrd + std::fmt::Debug,
{
    if low > high {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} lower bound {:?} exceeds upper bound {:?}",
                field_name, low, high
            ),
        });
    }
    Ok(())
}

/// Validate that a list has at least one entry
pub fn validate_non_empty<T>(values: &[T], field_name: &str, domain: &str) -> ConfigResult<()> {
    if values.is_empty() {
        return Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!("{} must contain at least one entry", field_name),
        });
    }
    Ok(())
}

/// Validate an http(s) URL
pub fn validate_url(url: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(url, field_name, domain)?;

    let parsed = url::Url::parse(url).map_err(|e| ConfigError::DomainError {
        domain: domain.to_string(),
        message: format!("{} has invalid URL format: {}", field_name, e),
    })?;

    match parsed.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::DomainError {
            domain: domain.to_string(),
            message: format!(
                "{} scheme '{}' not supported (only http/https)",
                field_name, scheme
            ),
        }),
    }
}

/// Validate that a pattern compiles as a regular expression
pub fn validate_regex(pattern: &str, field_name: &str, domain: &str) -> ConfigResult<()> {
    validate_required_string(pattern, field_name, domain)?;
    regex::Regex::new(pattern).map_err(|e| ConfigError::DomainError {
        domain: domain.to_string(),
        message: format!("{} is not a valid pattern: {}", field_name, e),
    })?;
    Ok(())
}
