//! The storefront journeys
//!
//! Four journeys against the boutique storefront (browse, add-to-cart,
//! checkout, currency change) with the checks, data pools and thresholds
//! the scenario profiles use.

use loadline_config::DataConfig;
use std::collections::BTreeMap;

use crate::check::{Check, CheckSet};
use crate::error::EngineResult;
use crate::journey::{Journey, JourneyCatalog, Step};
use crate::profile::ProfileKind;
use crate::template::{DataPools, RequestTemplate, Value};
use crate::threshold::ThresholdSpec;

pub const JOURNEY_BROWSE: &str = "browse";
pub const JOURNEY_ADD_TO_CART: &str = "add_to_cart";
pub const JOURNEY_CHECKOUT: &str = "checkout";
pub const JOURNEY_CURRENCY: &str = "currency";

pub const STEP_HEALTHCHECK: &str = "healthcheck";

pub const CART_ERRORS: &str = "cart_errors";
pub const CHECKOUT_ERRORS: &str = "checkout_errors";
pub const CHECKOUT_SUCCESS_RATE: &str = "checkout_success_rate";
pub const CHECKOUT_DURATION: &str = "checkout_duration";

pub const POOL_CURRENCIES: &str = "currencies";
pub const POOL_ADDRESSES: &str = "addresses";
pub const POOL_CARDS: &str = "cards";

const EMAIL_DOMAIN: &str = "example.com";

pub fn home_step() -> Step {
    Step::new("home", RequestTemplate::get("/").max_redirects(3))
        .harvest()
        .checks(CheckSet::new(vec![
            Check::status_is("home: status 200", 200),
            Check::body_contains("home: contains products", r#"class="hot-product-card""#),
            Check::body_contains_any("home: contains currency", ["USD", "EUR"]),
        ]))
}

pub fn product_step() -> Step {
    Step::new(
        "product",
        RequestTemplate::get("/product/{id}")
            .param("id", Value::PickId)
            .max_redirects(3),
    )
    .checks(CheckSet::new(vec![
        Check::status_is("product: status 200", 200),
        Check::body_contains("product: has add-to-cart", "addToCart"),
        Check::body_contains("product: has price", "price"),
    ]))
}

pub fn add_to_cart_step() -> Step {
    Step::new(
        "add_to_cart",
        RequestTemplate::post("/cart")
            .field("product_id", Value::CurrentId)
            .field("quantity", Value::IntBetween { min: 1, max: 3 })
            .max_redirects(5),
    )
    .checks(
        CheckSet::new(vec![Check::status_range("add_to_cart: status 2xx/3xx", 200, 400)])
            .with_failure_counter(CART_ERRORS),
    )
}

pub fn view_cart_step() -> Step {
    Step::new("view_cart", RequestTemplate::get("/cart").max_redirects(3)).checks(CheckSet::new(vec![
        Check::status_is("cart: status 200", 200),
        Check::body_contains_any(
            "cart: has items or empty",
            ["cart-item", "Your shopping cart is empty"],
        ),
    ]))
}

pub fn checkout_step() -> Step {
    let address = |field: &str| Value::record(POOL_ADDRESSES, field);
    let card = |field: &str| Value::record(POOL_CARDS, field);

    Step::new(
        "checkout",
        RequestTemplate::post("/cart/checkout")
            .field(
                "email",
                Value::Email {
                    domain: EMAIL_DOMAIN.to_string(),
                },
            )
            .field("street_address", address("street_address"))
            .field("zip_code", address("zip_code"))
            .field("city", address("city"))
            .field("state", address("state"))
            .field("country", address("country"))
            .field("credit_card_number", card("credit_card_number"))
            .field("credit_card_expiration_month", card("credit_card_expiration_month"))
            .field("credit_card_expiration_year", card("credit_card_expiration_year"))
            .field("credit_card_cvv", card("credit_card_cvv"))
            .max_redirects(5),
    )
    .checks(
        CheckSet::new(vec![
            Check::status_range("checkout: status 2xx", 200, 400),
            Check::body_contains_any("checkout: order complete", ["order", "Order #", "Your order is"]),
        ])
        .with_failure_counter(CHECKOUT_ERRORS)
        .with_outcome_rate(CHECKOUT_SUCCESS_RATE),
    )
    .timing_metric(CHECKOUT_DURATION)
}

pub fn set_currency_step() -> Step {
    Step::new(
        "set_currency",
        RequestTemplate::post("/setCurrency")
            .field("currency_code", Value::one_of(POOL_CURRENCIES))
            .max_redirects(3),
    )
    .checks(CheckSet::new(vec![Check::status_range(
        "currency: redirect or 200",
        200,
        400,
    )]))
}

/// `GET /_healthz`, issued first in every smoke iteration. It carries no
/// checks; a failing probe still shows in `http_req_failed`.
pub fn healthcheck_step() -> Step {
    Step::new(STEP_HEALTHCHECK, RequestTemplate::get("/_healthz"))
}

/// Fetches the home page once before the run to discover product ids
pub fn setup_step() -> Step {
    Step::new("setup", RequestTemplate::get("/").max_redirects(3)).harvest()
}

fn cart_steps() -> Vec<Step> {
    vec![home_step(), product_step(), add_to_cart_step(), view_cart_step()]
}

/// The four journeys with the production mix (40/30/20/10)
pub fn catalog() -> JourneyCatalog {
    let mut checkout = cart_steps();
    checkout.push(checkout_step());

    JourneyCatalog::new(vec![
        Journey::new(
            JOURNEY_BROWSE,
            40.0,
            vec![home_step(), product_step().repeat(1, 3)],
        ),
        Journey::new(JOURNEY_ADD_TO_CART, 30.0, cart_steps()),
        Journey::new(JOURNEY_CHECKOUT, 20.0, checkout),
        Journey::new(
            JOURNEY_CURRENCY,
            10.0,
            vec![home_step(), set_currency_step(), product_step()],
        ),
    ])
}

/// The smoke catalog: every journey weighted equally and opened by the
/// healthcheck, with no think time between the probe and the first page
pub fn smoke_catalog() -> JourneyCatalog {
    let journeys = catalog()
        .with_equal_weights()
        .journeys()
        .iter()
        .cloned()
        .map(|mut journey| {
            if let Some(first) = journey.steps.first_mut() {
                first.think_time_eligible = false;
            }
            journey.steps.insert(0, healthcheck_step());
            journey
        })
        .collect();
    JourneyCatalog::new(journeys)
}

/// Data pools referenced by the journeys
pub fn pools(data: &DataConfig) -> DataPools {
    let addresses = data
        .addresses
        .iter()
        .map(|address| {
            BTreeMap::from([
                ("street_address".to_string(), address.street_address.clone()),
                ("zip_code".to_string(), address.zip_code.clone()),
                ("city".to_string(), address.city.clone()),
                ("state".to_string(), address.state.clone()),
                ("country".to_string(), address.country.clone()),
            ])
        })
        .collect();

    let cards = data
        .cards
        .iter()
        .map(|card| {
            BTreeMap::from([
                ("credit_card_number".to_string(), card.number.clone()),
                ("credit_card_expiration_month".to_string(), card.expiration_month.clone()),
                ("credit_card_expiration_year".to_string(), card.expiration_year.clone()),
                ("credit_card_cvv".to_string(), card.cvv.clone()),
            ])
        })
        .collect();

    DataPools::new()
        .with_list(POOL_CURRENCIES, data.currencies.clone())
        .with_records(POOL_ADDRESSES, addresses)
        .with_records(POOL_CARDS, cards)
}

type ThresholdTable = BTreeMap<&'static str, Vec<(&'static str, bool)>>;

fn common_thresholds() -> ThresholdTable {
    BTreeMap::from([
        ("http_req_failed", vec![("rate<0.01", false)]),
        ("http_req_duration", vec![("p(95)<2000", false), ("p(99)<5000", false)]),
        ("http_req_duration{step:home}", vec![("p(95)<1500", false)]),
        ("http_req_duration{step:product}", vec![("p(95)<1500", false)]),
        ("http_req_duration{step:add_to_cart}", vec![("p(95)<2000", false)]),
        ("http_req_duration{step:view_cart}", vec![("p(95)<1500", false)]),
        ("http_req_duration{step:checkout}", vec![("p(95)<4000", false)]),
        (CHECKOUT_SUCCESS_RATE, vec![("rate>0.95", false)]),
        (CHECKOUT_DURATION, vec![("p(95)<6000", false)]),
    ])
}

/// Thresholds of a profile. A profile entry replaces the common entry with
/// the same key.
pub fn thresholds(kind: ProfileKind) -> EngineResult<Vec<ThresholdSpec>> {
    let mut table = common_thresholds();
    let overrides: ThresholdTable = match kind {
        ProfileKind::Smoke => BTreeMap::from([
            ("http_req_failed", vec![("rate<0.01", false)]),
            (CHECKOUT_SUCCESS_RATE, vec![("rate>0.90", false)]),
        ]),
        ProfileKind::Load => BTreeMap::from([
            ("http_req_failed", vec![("rate<0.01", true)]),
            (CHECKOUT_SUCCESS_RATE, vec![("rate>0.95", false)]),
            (CHECKOUT_DURATION, vec![("p(95)<6000", false)]),
        ]),
        ProfileKind::Stress => BTreeMap::from([
            ("http_req_failed", vec![("rate<0.05", false)]),
            ("http_req_duration", vec![("p(99)<10000", false)]),
            (CHECKOUT_SUCCESS_RATE, vec![("rate>0.80", false)]),
        ]),
        ProfileKind::Soak => BTreeMap::from([
            ("http_req_failed", vec![("rate<0.01", false)]),
            (CHECKOUT_SUCCESS_RATE, vec![("rate>0.95", false)]),
            (CHECKOUT_DURATION, vec![("p(95)<6000", false)]),
            ("degradation_rate", vec![("rate<0.05", false)]),
            ("http_req_duration", vec![("p(95)<3000", false), ("p(99)<8000", false)]),
        ]),
    };
    table.extend(overrides);

    let mut specs = Vec::new();
    for (key, expressions) in table {
        for (expression, abort_on_fail) in expressions {
            specs.push(ThresholdSpec::parse(key, expression, abort_on_fail)?);
        }
    }
    Ok(specs)
}
