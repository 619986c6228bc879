//! Request/response types exchanged with the transport

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::error::EngineError;
use crate::metrics::Tags;

/// HTTP methods a request template may use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Head,
}

impl HttpMethod {
    /// Get the string representation of the HTTP method
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "HEAD" => Ok(HttpMethod::Head),
            _ => Err(EngineError::InvalidMethod(s.to_string())),
        }
    }
}

/// A fully resolved request, ready for the transport.
///
/// Cookies travel explicitly: the session renders its jar for `host` into
/// `cookies`, and whatever the target sets comes back in
/// [`Response::set_cookies`].
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub method: HttpMethod,
    /// Logical host the cookies are scoped to
    pub host: String,
    /// Path relative to the target base URL, already substituted
    pub path: String,
    /// Form body fields, in order
    pub form: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    /// Rendered `Cookie` header value
    pub cookies: Option<String>,
    /// Redirect limit; `Some(0)` disables following, `None` uses the client default
    pub max_redirects: Option<usize>,
    pub timeout: Option<Duration>,
    /// Metric tags of the step issuing the request
    pub tags: Tags,
}

impl RequestDescriptor {
    /// Create a bare request without body, headers or cookies
    pub fn new(method: HttpMethod, host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method,
            host: host.into(),
            path: path.into(),
            form: Vec::new(),
            headers: Vec::new(),
            cookies: None,
            max_redirects: None,
            timeout: None,
            tags: Tags::new(),
        }
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }

    /// Look up a form field by name
    pub fn form_value(&self, name: &str) -> Option<&str> {
        self.form
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Coarse status classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusClass {
    Informational,
    Success,
    Redirection,
    ClientError,
    ServerError,
    Unknown,
}

/// A response received from the target
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Response {
    pub status: u16,
    pub body: String,
    pub headers: Vec<(String, String)>,
    /// Raw `Set-Cookie` header values, in arrival order
    pub set_cookies: Vec<String>,
}

impl Response {
    /// Create a response with a status and a body
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: Vec::new(),
            set_cookies: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_set_cookie(mut self, cookie: impl Into<String>) -> Self {
        self.set_cookies.push(cookie.into());
        self
    }

    pub fn status_class(&self) -> StatusClass {
        match self.status {
            100..=199 => StatusClass::Informational,
            200..=299 => StatusClass::Success,
            300..=399 => StatusClass::Redirection,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Unknown,
        }
    }

    /// Whether the request counts as served (2xx or 3xx)
    pub fn is_success(&self) -> bool {
        matches!(
            self.status_class(),
            StatusClass::Success | StatusClass::Redirection
        )
    }

    /// Look up a header by case-insensitive name
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// The transport could not produce a usable response
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransportError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Transport error: {0}")]
    Other(String),
}

impl TransportError {
    /// Short label used as a metric tag
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Timeout(_) => "timeout",
            TransportError::Connection(_) => "connection",
            TransportError::Other(_) => "other",
        }
    }
}

/// Capability that sends one request and returns the target's response.
///
/// Implementations must be safe to call from many iterations at once.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Execute a request
    async fn execute(&self, request: RequestDescriptor) -> Result<Response, TransportError>;
}
