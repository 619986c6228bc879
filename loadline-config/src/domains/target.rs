//! Target application configuration

use crate::error::ConfigResult;
use crate::validation::{validate_positive, validate_required_string, validate_url, Validatable};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Where the traffic goes and how requests are sent
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetConfig {
    /// Base URL of the application under test
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Connection establishment timeout
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_connect_timeout")]
    pub connect_timeout: Duration,

    /// Per-request timeout (response fully read)
    #[serde(with = "crate::domains::utils::serde_duration", default = "default_request_timeout")]
    pub request_timeout: Duration,

    /// User agent string
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Whether to verify TLS certificates
    #[serde(default = "crate::domains::utils::default_true")]
    pub verify_ssl: bool,

    /// Headers sent with every request
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            user_agent: default_user_agent(),
            verify_ssl: true,
            headers: default_headers(),
        }
    }
}

impl TargetConfig {
    /// Host portion of the base URL, used as the cookie scope
    pub fn host(&self) -> String {
        url::Url::parse(&self.base_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| "default".to_string())
    }
}

impl Validatable for TargetConfig {
    fn validate(&self) -> ConfigResult<()> {
        validate_url(&self.base_url, "base_url", self.domain_name())?;
        validate_positive(self.connect_timeout.as_millis(), "connect_timeout", self.domain_name())?;
        validate_positive(self.request_timeout.as_millis(), "request_timeout", self.domain_name())?;
        validate_required_string(&self.user_agent, "user_agent", self.domain_name())?;

        for name in self.headers.keys() {
            validate_required_string(name, "header name", self.domain_name())?;
        }

        Ok(())
    }

    fn domain_name(&self) -> &'static str {
        "target"
    }
}

// Default value functions
fn default_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_user_agent() -> String {
    format!("loadline/{}", env!("CARGO_PKG_VERSION"))
}

fn default_headers() -> BTreeMap<String, String> {
    BTreeMap::from([
        (
            "Accept".to_string(),
            "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8".to_string(),
        ),
        ("Accept-Language".to_string(), "en-US,en;q=0.5".to_string()),
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_defaults() {
        let config = TargetConfig::default();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.host(), "localhost");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_target_validation() {
        let mut config = TargetConfig::default();
        config.base_url = "localhost:8080/shop".to_string();
        assert!(config.validate().is_err());

        let mut config = TargetConfig::default();
        config.request_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
