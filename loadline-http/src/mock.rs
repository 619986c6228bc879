//! Offline executor serving canned responses

use crate::errors::HttpError;
use async_trait::async_trait;
use loadline_config::DataConfig;
use loadline_core::{HttpMethod, RequestDescriptor, RequestExecutor, Response, TransportError};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

const SESSION_COOKIE: &str = "shop_session-id=offline-session; Path=/; HttpOnly";

/// Answers requests from a table of mocks without touching the network.
///
/// Mocks are keyed by method and path. A path mock matches exactly; a prefix
/// mock matches any path starting with the prefix, the longest prefix
/// winning. Query strings are ignored.
#[derive(Debug, Default)]
pub struct OfflineExecutor {
    mocks: HashMap<String, Response>,
    prefixes: Vec<(HttpMethod, String, Response)>,
    latency: Option<Duration>,
    served: AtomicU64,
}

impl OfflineExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mock for an exact path
    pub fn add_mock(&mut self, method: HttpMethod, path: &str, response: Response) {
        self.mocks.insert(mock_key(method, path), response);
        debug!("Added offline mock for {} {}", method, path);
    }

    /// Add a mock for every path under a prefix
    pub fn add_prefix_mock(&mut self, method: HttpMethod, prefix: &str, response: Response) {
        self.prefixes.push((method, prefix.to_string(), response));
        debug!("Added offline prefix mock for {} {}*", method, prefix);
    }

    /// Delay every response by a fixed latency
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of requests answered so far
    pub fn requests_served(&self) -> u64 {
        self.served.load(Ordering::Relaxed)
    }

    /// Canned storefront pages listing the default product ids
    pub fn storefront() -> Self {
        Self::storefront_with_ids(&DataConfig::default().fallback_ids)
    }

    /// Canned storefront pages; the home page links the given product ids
    pub fn storefront_with_ids(ids: &[String]) -> Self {
        let cards: String = ids
            .iter()
            .map(|id| {
                format!(
                    r#"<div class="hot-product-card"><a href="/product/{id}">Product {id}</a></div>"#
                )
            })
            .collect();
        let home = format!(
            r#"<html><body><select name="currency_code"><option>USD</option><option>EUR</option></select>{cards}</body></html>"#
        );
        let product = r#"<html><body><h2>Product</h2><p class="product-price">USD 19.99</p>
<form method="POST" action="/cart" id="addToCart"><input name="product_id"><input name="quantity"></form></body></html>"#;
        let cart = r#"<html><body><div class="cart-item">1 x Product</div><form action="/cart/checkout"></form></body></html>"#;
        let order = r#"<html><body><h3>Your order is complete!</h3><p>Order # OFFLINE-0001</p></body></html>"#;

        let mut executor = Self::new();
        executor.add_mock(HttpMethod::Get, "/_healthz", Response::new(200, "ok"));
        executor.add_mock(
            HttpMethod::Get,
            "/",
            Response::new(200, home.clone()).with_set_cookie(SESSION_COOKIE),
        );
        executor.add_prefix_mock(HttpMethod::Get, "/product/", Response::new(200, product));
        executor.add_mock(HttpMethod::Post, "/cart", Response::new(200, cart));
        executor.add_mock(HttpMethod::Get, "/cart", Response::new(200, cart));
        executor.add_mock(HttpMethod::Post, "/cart/checkout", Response::new(200, order));
        executor.add_mock(HttpMethod::Post, "/setCurrency", Response::new(200, home));
        executor
    }

    fn lookup(&self, method: HttpMethod, path: &str) -> Option<&Response> {
        let path = path.split('?').next().unwrap_or(path);
        if let Some(response) = self.mocks.get(&mock_key(method, path)) {
            return Some(response);
        }

        self.prefixes
            .iter()
            .filter(|(mock_method, prefix, _)| *mock_method == method && path.starts_with(prefix.as_str()))
            .max_by_key(|(_, prefix, _)| prefix.len())
            .map(|(_, _, response)| response)
    }
}

fn mock_key(method: HttpMethod, path: &str) -> String {
    format!("{}:{}", method.as_str(), path)
}

#[async_trait]
impl RequestExecutor for OfflineExecutor {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        match self.lookup(request.method, &request.path) {
            Some(response) => {
                self.served.fetch_add(1, Ordering::Relaxed);
                Ok(response.clone())
            }
            None => {
                debug!("No matching mock response found for {} {}", request.method, request.path);
                Err(HttpError::NoMock(mock_key(request.method, &request.path)).into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn get(path: &str) -> RequestDescriptor {
        RequestDescriptor::new(HttpMethod::Get, "offline", path)
    }

    #[tokio::test]
    async fn test_exact_and_prefix_matching() {
        let mut executor = OfflineExecutor::new();
        executor.add_mock(HttpMethod::Get, "/cart", Response::new(200, "cart"));
        executor.add_prefix_mock(HttpMethod::Get, "/product/", Response::new(200, "any product"));
        executor.add_prefix_mock(HttpMethod::Get, "/product/SPECIAL", Response::new(200, "special"));

        assert_eq!(executor.execute(get("/cart?x=1")).await.unwrap().body, "cart");
        assert_eq!(executor.execute(get("/product/ABC")).await.unwrap().body, "any product");
        assert_eq!(executor.execute(get("/product/SPECIAL1")).await.unwrap().body, "special");
        assert_eq!(executor.requests_served(), 3);

        let post = RequestDescriptor::new(HttpMethod::Post, "offline", "/cart");
        let err = executor.execute(post).await.unwrap_err();
        assert_eq!(err.kind(), "other");
        assert!(err.to_string().contains("POST:/cart"));
    }

    #[tokio::test]
    async fn test_storefront_home_links_products_and_sets_session() {
        let executor = OfflineExecutor::storefront_with_ids(&["OLJCESPC7Z".to_string()]);
        let home = executor.execute(get("/")).await.unwrap();

        assert!(home.body.contains(r#"href="/product/OLJCESPC7Z""#));
        assert!(home.body.contains(r#"class="hot-product-card""#));
        assert_eq!(home.set_cookies, vec![SESSION_COOKIE.to_string()]);

        let health = executor.execute(get("/_healthz")).await.unwrap();
        assert_eq!((health.status, health.body.as_str()), (200, "ok"));

        let checkout = RequestDescriptor::new(HttpMethod::Post, "offline", "/cart/checkout");
        assert!(executor.execute(checkout).await.unwrap().body.contains("Your order is"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_latency_delays_responses() {
        let executor = OfflineExecutor::storefront().with_latency(Duration::from_millis(250));
        let started = tokio::time::Instant::now();
        executor.execute(get("/")).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(250));
    }
}
