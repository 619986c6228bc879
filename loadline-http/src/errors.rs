//! HTTP error types

use loadline_core::TransportError;

/// Error type for HTTP operations
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Invalid header name: {0}")]
    InvalidHeaderName(String),

    #[error("Invalid header value for {0}")]
    InvalidHeaderValue(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("No mock response for {0}")]
    NoMock(String),
}

pub type HttpResult<T> = Result<T, HttpError>;

impl From<HttpError> for TransportError {
    fn from(err: HttpError) -> Self {
        match &err {
            HttpError::NetworkError(inner) if inner.is_timeout() => {
                TransportError::Timeout(err.to_string())
            }
            HttpError::NetworkError(inner) if inner.is_connect() => {
                TransportError::Connection(err.to_string())
            }
            _ => TransportError::Other(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_network_errors_map_to_other() {
        let err = HttpError::InvalidHeaderName("bad header".to_string());
        let transport = TransportError::from(err);
        assert_eq!(transport.kind(), "other");
        assert!(transport.to_string().contains("bad header"));

        let parse = url::Url::parse("not a url").unwrap_err();
        assert_eq!(TransportError::from(HttpError::from(parse)).kind(), "other");
    }
}
