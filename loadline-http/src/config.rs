//! HTTP executor configuration

use loadline_config::TargetConfig;
use std::time::Duration;

/// Redirects followed when a request does not set its own limit
pub const DEFAULT_MAX_REDIRECTS: usize = 10;

/// HTTP executor configuration
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Base URL request paths are resolved against
    pub base_url: String,

    /// Connection establishment timeout
    pub connect_timeout: Duration,

    /// Request timeout, unless the request carries its own
    pub timeout: Duration,

    /// Maximum number of redirects to follow by default
    pub max_redirects: usize,

    /// User agent string
    pub user_agent: String,

    /// Whether to verify TLS certificates
    pub verify_ssl: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        TargetConfig::default().into()
    }
}

impl From<TargetConfig> for HttpConfig {
    fn from(config: TargetConfig) -> Self {
        Self::from(&config)
    }
}

impl From<&TargetConfig> for HttpConfig {
    fn from(config: &TargetConfig) -> Self {
        Self {
            base_url: config.base_url.clone(),
            connect_timeout: config.connect_timeout,
            timeout: config.request_timeout,
            max_redirects: DEFAULT_MAX_REDIRECTS,
            user_agent: config.user_agent.clone(),
            verify_ssl: config.verify_ssl,
        }
    }
}

impl HttpConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_target_config() {
        let target = TargetConfig {
            base_url: "http://shop.test:9000".to_string(),
            request_timeout: Duration::from_secs(3),
            ..TargetConfig::default()
        };

        let config = HttpConfig::from(&target);
        assert_eq!(config.base_url, "http://shop.test:9000");
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.connect_timeout, target.connect_timeout);
        assert_eq!(config.max_redirects, DEFAULT_MAX_REDIRECTS);
    }
}
