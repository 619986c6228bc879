//! End-to-end runs against stubbed executors

use async_trait::async_trait;
use loadline_config::LoadlineConfig;
use loadline_core::{
    storefront, Journey, JourneyCatalog, LoadRun, ProfileKind, RateProfile, RequestDescriptor,
    RequestExecutor, RequestTemplate, Response, ScenarioProfile, SchedulerConfig, Step, StopReason,
    ThresholdSpec, TransportError, Verdict,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A page carrying every marker the storefront checks look for
const PAGE: &str = r#"<div class="hot-product-card"><a href="/product/OLJCESPC7Z">Sunglasses</a></div>
<span class="price">USD 19.99</span><form id="addToCart"></form>
<div class="cart-item"></div><h3>Your order is complete!</h3>"#;

const PAGE_WITHOUT_IDS: &str = r#"<div class="hot-product-card"></div>
<span class="price">USD 19.99</span><form id="addToCart"></form>
<div class="cart-item"></div><h3>Your order is complete!</h3>"#;

/// Always serves [`PAGE`]
struct HealthyStore;

#[async_trait]
impl RequestExecutor for HealthyStore {
    async fn execute(&self, _request: RequestDescriptor) -> Result<Response, TransportError> {
        Ok(Response::new(200, PAGE))
    }
}

/// Fails every fifth checkout
#[derive(Default)]
struct FlakyCheckout {
    checkouts: AtomicUsize,
}

#[async_trait]
impl RequestExecutor for FlakyCheckout {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        if request.path == "/cart/checkout" {
            let n = self.checkouts.fetch_add(1, Ordering::SeqCst) + 1;
            if n % 5 == 0 {
                return Ok(Response::new(500, "order failed"));
            }
        }
        Ok(Response::new(200, PAGE))
    }
}

/// Records every request and answers with a fixed status
struct Recording {
    status: u16,
    seen: Mutex<Vec<RequestDescriptor>>,
}

impl Recording {
    fn new(status: u16) -> Arc<Self> {
        Arc::new(Self {
            status,
            seen: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl RequestExecutor for Recording {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        let first = {
            let mut seen = self.seen.lock();
            seen.push(request);
            seen.len() == 1
        };
        // Only the very first page lists a product
        let body = if first {
            r#"<a href="/product/PRELOAD001">x</a>"#.to_string() + PAGE_WITHOUT_IDS
        } else {
            PAGE_WITHOUT_IDS.to_string()
        };
        Ok(Response::new(self.status, body))
    }
}

/// The cart page is unreachable
struct BrokenCart;

#[async_trait]
impl RequestExecutor for BrokenCart {
    async fn execute(&self, request: RequestDescriptor) -> Result<Response, TransportError> {
        if request.path == "/cart" && request.form.is_empty() {
            return Err(TransportError::Connection("connection reset by peer".to_string()));
        }
        Ok(Response::new(200, PAGE))
    }
}

fn fixed_iterations(kind: ProfileKind, journey: &str, count: u64) -> ScenarioProfile {
    ScenarioProfile::from_config(kind, &LoadlineConfig::default())
        .unwrap()
        .restrict_to_journey(journey)
        .unwrap()
        .without_think_time()
        .without_setup()
        .with_iterations(count, Duration::from_secs(60))
}

fn ping_profile(rate: f64, duration: Duration) -> ScenarioProfile {
    let catalog = JourneyCatalog::new(vec![Journey::new(
        "ping",
        1.0,
        vec![Step::new("home", RequestTemplate::get("/"))],
    )]);
    ScenarioProfile::new(
        "ping",
        SchedulerConfig::arrival(RateProfile::constant(rate, duration), 5, 50),
        catalog,
    )
}

#[tokio::test]
async fn test_add_to_cart_iterations_all_pass() {
    let profile = fixed_iterations(ProfileKind::Load, "add_to_cart", 100);

    let report = LoadRun::new(profile, Arc::new(HealthyStore))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.counters.issued, 100);
    assert_eq!(report.counters.completed, 100);
    assert_eq!(report.counters.incomplete, 0);
    assert_eq!(report.rate("step_success"), Some(1.0));
    assert_eq!(report.count("http_reqs"), 400.0);
    assert_eq!(report.assertion_failures, 0);
    assert_eq!(report.stop_reason, Some(StopReason::IterationsExhausted));
    assert_eq!(report.verdict, Verdict::Pass);
}

#[tokio::test]
async fn test_every_fifth_checkout_fails() {
    let profile = fixed_iterations(ProfileKind::Smoke, "checkout", 50);

    let report = LoadRun::new(profile, Arc::new(FlakyCheckout::default()))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.counters.completed, 50);
    assert_eq!(report.rate(storefront::CHECKOUT_SUCCESS_RATE), Some(0.8));
    assert_eq!(report.count(storefront::CHECKOUT_ERRORS), 10.0);
    assert_eq!(report.assertion_failures, 10);
    assert_eq!(report.checks["checkout: status 2xx"].fails, 10);
    assert_eq!(report.checks["checkout: order complete"].fails, 0);

    // checkout_success_rate rate>0.90 cannot hold at 0.80
    assert_eq!(report.verdict, Verdict::Fail);
    assert!(report
        .failed_thresholds()
        .any(|outcome| outcome.key == storefront::CHECKOUT_SUCCESS_RATE));
}

#[tokio::test]
async fn test_transport_failures_leave_iterations_incomplete() {
    let profile = fixed_iterations(ProfileKind::Smoke, "add_to_cart", 20);

    let report = LoadRun::new(profile, Arc::new(BrokenCart))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.counters.incomplete, 20);
    assert_eq!(report.counters.completed, 0);
    assert_eq!(report.count("incomplete_iterations"), 20.0);
    assert_eq!(report.count("transport_errors"), 20.0);
    // healthcheck, home, product and add_to_cart succeed before the cart fails
    assert_eq!(report.rate("http_req_failed"), Some(0.2));
    assert_eq!(report.verdict, Verdict::Fail);
}

#[tokio::test]
async fn test_smoke_iterations_open_with_healthcheck() {
    let executor = Recording::new(200);
    let profile = fixed_iterations(ProfileKind::Smoke, "browse", 4);

    let report = LoadRun::new(profile, executor.clone())
        .unwrap()
        .execute()
        .await
        .unwrap();

    let seen = executor.seen.lock();
    let probes = seen.iter().filter(|request| request.path == "/_healthz").count();
    assert_eq!(probes, 4);
    assert_eq!(seen[0].path, "/_healthz");
    assert_eq!(report.count("http_reqs"), seen.len() as f64);
}

#[tokio::test]
async fn test_setup_identifiers_replace_the_static_list() {
    let executor = Recording::new(200);
    let profile = fixed_iterations(ProfileKind::Load, "browse", 5).with_setup(storefront::setup_step());

    let report = LoadRun::new(profile, executor.clone())
        .unwrap()
        .execute()
        .await
        .unwrap();

    let seen = executor.seen.lock();
    let products: Vec<&str> = seen
        .iter()
        .filter(|request| request.path.starts_with("/product/"))
        .map(|request| request.path.as_str())
        .collect();
    assert!(!products.is_empty());
    assert!(products.iter().all(|path| *path == "/product/PRELOAD001"));

    // The setup request is not part of the metrics
    assert_eq!(report.count("http_reqs"), (seen.len() - 1) as f64);
}

#[tokio::test]
async fn test_seeded_runs_are_reproducible() {
    let run = || async {
        let profile = fixed_iterations(ProfileKind::Load, "browse", 40).with_seed(42);
        LoadRun::new(profile, Arc::new(HealthyStore))
            .unwrap()
            .execute()
            .await
            .unwrap()
    };

    let first = run().await;
    let second = run().await;
    assert_eq!(first.count("http_reqs"), second.count("http_reqs"));
    assert_eq!(first.checks, second.checks);
}

#[tokio::test(start_paused = true)]
async fn test_abort_threshold_stops_issuing() {
    let profile = ping_profile(10.0, Duration::from_secs(60))
        .with_thresholds(vec![ThresholdSpec::parse("http_req_failed", "rate<0.01", true).unwrap()])
        .with_threshold_interval(Duration::from_secs(1));

    let report = LoadRun::new(profile, Recording::new(503))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.verdict, Verdict::Aborted);
    assert!(matches!(
        report.stop_reason,
        Some(StopReason::ThresholdBreached { ref threshold }) if threshold.starts_with("http_req_failed")
    ));
    // Breach detected at the first evaluation, one second in
    assert!(report.counters.issued <= 11, "issued {}", report.counters.issued);
    assert_eq!(report.counters.completed, report.counters.issued);
    assert!(report.duration_secs < 2.0);
}

#[tokio::test(start_paused = true)]
async fn test_interrupt_stops_like_expiry() {
    let run = LoadRun::new(ping_profile(10.0, Duration::from_secs(60)), Arc::new(HealthyStore)).unwrap();
    let control = run.control();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(550)).await;
        control.stop(StopReason::Interrupted);
    });

    let report = run.execute().await.unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::Interrupted));
    assert_eq!(report.counters.issued, 6);
    assert_eq!(report.counters.dropped, 0);
    assert_eq!(report.verdict, Verdict::Pass);
}

#[tokio::test(start_paused = true)]
async fn test_schedule_expiry_ends_the_run() {
    let report = LoadRun::new(ping_profile(20.0, Duration::from_secs(3)), Arc::new(HealthyStore))
        .unwrap()
        .execute()
        .await
        .unwrap();

    assert_eq!(report.stop_reason, Some(StopReason::DurationElapsed));
    assert_eq!(report.counters.issued, 60);
    assert_eq!(report.counters.completed, 60);
    assert!((report.duration_secs - 3.0).abs() < 0.1);
}
