//! reqwest-backed request executor

use crate::config::HttpConfig;
use crate::errors::{HttpError, HttpResult};
use async_trait::async_trait;
use loadline_core::{
    CookieJar, HttpMethod, RequestDescriptor, RequestExecutor, Response, TransportError,
};
use reqwest::{
    header::{HeaderMap, HeaderName, HeaderValue, COOKIE, LOCATION, SET_COOKIE},
    redirect::Policy,
    Client, Method,
};
use std::str::FromStr;
use tracing::debug;
use url::Url;

/// Cookie scope used while following one redirect chain
const CHAIN_HOST: &str = "redirect-chain";

/// Sends requests to the target over HTTP.
///
/// The client never follows redirects itself: [`HttpExecutor::send`] walks
/// the chain so every hop's `Set-Cookie` reaches the caller and is replayed on
/// the next hop. Cookies are carried by the request descriptor, never by the
/// client.
#[derive(Debug)]
pub struct HttpExecutor {
    config: HttpConfig,
    base: String,
    client: Client,
}

impl HttpExecutor {
    /// Create an executor; fails on an unusable base URL or TLS setup
    pub fn new(config: HttpConfig) -> HttpResult<Self> {
        let parsed = Url::parse(&config.base_url)?;
        if parsed.cannot_be_a_base() {
            return Err(HttpError::ConfigError(format!(
                "base URL {} cannot carry request paths",
                config.base_url
            )));
        }

        debug!(
            base_url = %config.base_url,
            timeout_secs = config.timeout.as_secs_f64(),
            "Creating HttpExecutor"
        );
        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            base: config.base_url.trim_end_matches('/').to_string(),
            config,
            client,
        })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// Absolute URL of a request path
    pub fn url_for(&self, path: &str) -> HttpResult<Url> {
        let url = if path.starts_with('/') {
            format!("{}{}", self.base, path)
        } else {
            format!("{}/{}", self.base, path)
        };
        Ok(Url::parse(&url)?)
    }

    /// Send one request and read the whole response.
    ///
    /// Redirects are followed up to the request's limit. `301`, `302` and
    /// `303` turn the next hop into a bodiless GET; `307` and `308` repeat the
    /// method and form. The returned response carries the `Set-Cookie` values
    /// of every hop in arrival order. A redirect beyond the limit is returned
    /// as is.
    pub async fn send(&self, request: &RequestDescriptor) -> HttpResult<Response> {
        let max_redirects = request.max_redirects.unwrap_or(self.config.max_redirects);
        let headers = self.request_headers(request)?;

        let mut url = self.url_for(&request.path)?;
        let mut method = method_for(request.method);
        let mut send_form = !request.form.is_empty();
        let mut jar = request
            .cookies
            .as_deref()
            .map(|header| CookieJar::from_header(CHAIN_HOST, header))
            .unwrap_or_default();
        let mut set_cookies = Vec::new();
        let mut hops = 0;

        loop {
            let mut hop_headers = headers.clone();
            if let Some(cookies) = jar.header_for(CHAIN_HOST) {
                let value = HeaderValue::from_str(&cookies)
                    .map_err(|_| HttpError::InvalidHeaderValue(COOKIE.to_string()))?;
                hop_headers.insert(COOKIE, value);
            }

            let mut builder = self.client.request(method.clone(), url.clone()).headers(hop_headers);
            if send_form {
                builder = builder.form(&request.form);
            }
            if let Some(timeout) = request.timeout {
                builder = builder.timeout(timeout);
            }

            let response = builder.send().await?;
            let status = response.status();

            let mut response_headers = Vec::new();
            let mut hop_cookies = Vec::new();
            for (name, value) in response.headers() {
                let Ok(value) = value.to_str() else {
                    continue;
                };
                if name == SET_COOKIE {
                    hop_cookies.push(value.to_string());
                }
                response_headers.push((name.to_string(), value.to_string()));
            }
            jar.absorb(CHAIN_HOST, &hop_cookies);
            set_cookies.extend(hop_cookies);

            let location = response
                .headers()
                .get(LOCATION)
                .and_then(|value| value.to_str().ok())
                .map(str::to_string);
            let next = match location {
                Some(location) if status.is_redirection() && hops < max_redirects => {
                    Some(url.join(&location)?)
                }
                _ => None,
            };

            let Some(next) = next else {
                let body = response.text().await?;
                return Ok(Response {
                    status: status.as_u16(),
                    body,
                    headers: response_headers,
                    set_cookies,
                });
            };

            debug!(status = status.as_u16(), from = %url, to = %next, "Following redirect");
            if matches!(status.as_u16(), 301..=303) && method != Method::HEAD {
                method = Method::GET;
                send_form = false;
            }
            url = next;
            hops += 1;
        }
    }

    fn request_headers(&self, request: &RequestDescriptor) -> HttpResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let header_name =
                HeaderName::from_str(name).map_err(|_| HttpError::InvalidHeaderName(name.clone()))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| HttpError::InvalidHeaderValue(name.clone()))?;
            headers.insert(header_name, header_value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        match self.send(&request).await {
            Ok(response) => {
                debug!(
                    method = %request.method,
                    path = %request.path,
                    status = response.status,
                    bytes = response.body.len(),
                    "Response received"
                );
                Ok(response)
            }
            Err(err) => {
                debug!(method = %request.method, path = %request.path, error = %err, "Request failed");
                Err(err.into())
            }
        }
    }
}

fn method_for(method: HttpMethod) -> Method {
    match method {
        HttpMethod::Get => Method::GET,
        HttpMethod::Post => Method::POST,
        HttpMethod::Put => Method::PUT,
        HttpMethod::Delete => Method::DELETE,
        HttpMethod::Patch => Method::PATCH,
        HttpMethod::Head => Method::HEAD,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn executor(base_url: &str) -> HttpExecutor {
        HttpExecutor::new(HttpConfig::default().with_base_url(base_url)).unwrap()
    }

    #[test]
    fn test_paths_append_to_base_url() {
        let root = executor("http://shop.test:8080/");
        assert_eq!(
            root.url_for("/product/OLJCESPC7Z").unwrap().as_str(),
            "http://shop.test:8080/product/OLJCESPC7Z"
        );

        let prefixed = executor("http://shop.test/boutique");
        assert_eq!(prefixed.url_for("/cart").unwrap().as_str(), "http://shop.test/boutique/cart");
        assert_eq!(prefixed.url_for("cart").unwrap().as_str(), "http://shop.test/boutique/cart");
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let err = HttpExecutor::new(HttpConfig::default().with_base_url("not a url")).unwrap_err();
        assert!(matches!(err, HttpError::InvalidUrl(_)));

        let err = HttpExecutor::new(HttpConfig::default().with_base_url("mailto:shop@example.com"))
            .unwrap_err();
        assert!(matches!(err, HttpError::ConfigError(_)));
    }

    #[tokio::test]
    async fn test_invalid_header_fails_before_sending() {
        let executor = executor("http://localhost:8080");
        let mut request = RequestDescriptor::new(HttpMethod::Get, "localhost", "/");
        request.headers.push(("bad header".to_string(), "x".to_string()));

        let err = executor.send(&request).await.unwrap_err();
        assert!(matches!(err, HttpError::InvalidHeaderName(ref name) if name == "bad header"));

        let transport = executor.execute(request).await.unwrap_err();
        assert_eq!(transport.kind(), "other");
    }
}
