//! Request templates
//!
//! Templates describe a request as plain data: a path with `{param}`
//! placeholders plus form fields whose values are resolved per request from
//! the session, the run's data pools and the iteration's random source.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::request::{HttpMethod, RequestDescriptor};
use crate::session::Session;

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// A dynamic value inside a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Value {
    /// Fixed text
    Literal { value: String },
    /// Random discovered identifier; becomes the session's current id
    PickId,
    /// The identifier chosen by the last `pick_id` (picks one if none yet)
    CurrentId,
    /// Uniform integer in `[min, max]`
    IntBetween { min: i64, max: i64 },
    /// Random entry of a named list pool
    OneOf { pool: String },
    /// Field of a row drawn from a named record pool.
    /// All fields of one pool in one request come from the same row.
    Record { pool: String, field: String },
    /// `user_<1000-9999>@<domain>`
    Email { domain: String },
}

impl Value {
    pub fn literal(value: impl Into<String>) -> Self {
        Value::Literal {
            value: value.into(),
        }
    }

    pub fn one_of(pool: impl Into<String>) -> Self {
        Value::OneOf { pool: pool.into() }
    }

    pub fn record(pool: impl Into<String>, field: impl Into<String>) -> Self {
        Value::Record {
            pool: pool.into(),
            field: field.into(),
        }
    }
}

/// Named data sources referenced by templates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataPools {
    #[serde(default)]
    pub lists: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub records: HashMap<String, Vec<BTreeMap<String, String>>>,
}

impl DataPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_list(mut self, name: impl Into<String>, values: Vec<String>) -> Self {
        self.lists.insert(name.into(), values);
        self
    }

    pub fn with_records(
        mut self,
        name: impl Into<String>,
        rows: Vec<BTreeMap<String, String>>,
    ) -> Self {
        self.records.insert(name.into(), rows);
        self
    }
}

/// A form field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormField {
    pub name: String,
    pub value: Value,
}

/// Everything needed to resolve a template besides the session
pub struct BuildContext<'a, R: Rng + ?Sized> {
    pub host: &'a str,
    pub pools: &'a DataPools,
    /// Identifiers used when the session has not discovered any
    pub fallback_ids: &'a [String],
    pub rng: &'a mut R,
}

/// Serializable description of one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestTemplate {
    #[serde(default)]
    pub method: HttpMethod,

    /// Path relative to the base URL, e.g. `/product/{id}`
    pub path: String,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub path_params: BTreeMap<String, Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form: Vec<FormField>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// `Some(0)` keeps redirects unfollowed so their status can be checked
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_redirects: Option<usize>,

    #[serde(default, with = "humantime_serde", skip_serializing_if = "Option::is_none")]
    pub timeout: Option<Duration>,
}

impl RequestTemplate {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            path_params: BTreeMap::new(),
            form: Vec::new(),
            headers: BTreeMap::new(),
            max_redirects: None,
            timeout: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, path)
    }

    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        self.path_params.insert(name.into(), value);
        self
    }

    pub fn field(mut self, name: impl Into<String>, value: Value) -> Self {
        self.form.push(FormField {
            name: name.into(),
            value,
        });
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn max_redirects(mut self, limit: usize) -> Self {
        self.max_redirects = Some(limit);
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Check that every placeholder has a parameter and every pool reference
    /// resolves, so a run never discovers a broken template mid-flight.
    pub fn validate(&self, pools: &DataPools) -> EngineResult<()> {
        for name in placeholders(&self.path)? {
            if !self.path_params.contains_key(name) {
                return Err(EngineError::Template(format!(
                    "path '{}' has no value for placeholder '{{{}}}'",
                    self.path, name
                )));
            }
        }

        let values = self
            .path_params
            .values()
            .chain(self.form.iter().map(|field| &field.value));
        for value in values {
            validate_value(value, pools)?;
        }
        Ok(())
    }

    /// Resolve the template into a request for `session`
    pub fn build<R: Rng + ?Sized>(
        &self,
        session: &mut Session,
        ctx: &mut BuildContext<'_, R>,
    ) -> EngineResult<RequestDescriptor> {
        let mut rows: HashMap<String, usize> = HashMap::new();

        let mut path = String::with_capacity(self.path.len());
        let mut rest = self.path.as_str();
        while let Some(open) = rest.find('{') {
            let close = rest[open..].find('}').map(|offset| open + offset).ok_or_else(|| {
                EngineError::Template(format!("unclosed placeholder in '{}'", self.path))
            })?;
            let name = &rest[open + 1..close];
            let value = self.path_params.get(name).ok_or_else(|| {
                EngineError::Template(format!("no value for placeholder '{{{}}}'", name))
            })?;
            path.push_str(&rest[..open]);
            path.push_str(&resolve(value, session, ctx, &mut rows)?);
            rest = &rest[close + 1..];
        }
        path.push_str(rest);

        let mut form = Vec::with_capacity(self.form.len());
        for field in &self.form {
            form.push((
                field.name.clone(),
                resolve(&field.value, session, ctx, &mut rows)?,
            ));
        }

        let mut headers: Vec<(String, String)> = self
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect();
        if !form.is_empty()
            && !headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case("content-type"))
        {
            headers.push(("Content-Type".to_string(), FORM_CONTENT_TYPE.to_string()));
        }

        let mut request = RequestDescriptor::new(self.method, ctx.host, path);
        request.form = form;
        request.headers = headers;
        request.cookies = session.cookies().header_for(ctx.host);
        request.max_redirects = self.max_redirects;
        request.timeout = self.timeout;
        Ok(request)
    }
}

fn placeholders(path: &str) -> EngineResult<Vec<&str>> {
    let mut names = Vec::new();
    let mut rest = path;
    while let Some(open) = rest.find('{') {
        let close = rest[open..]
            .find('}')
            .map(|offset| open + offset)
            .ok_or_else(|| EngineError::Template(format!("unclosed placeholder in '{}'", path)))?;
        names.push(&rest[open + 1..close]);
        rest = &rest[close + 1..];
    }
    Ok(names)
}

fn validate_value(value: &Value, pools: &DataPools) -> EngineResult<()> {
    match value {
        Value::IntBetween { min, max } if min > max => Err(EngineError::Template(format!(
            "int_between range {}..={} is empty",
            min, max
        ))),
        Value::OneOf { pool } => match pools.lists.get(pool) {
            Some(values) if !values.is_empty() => Ok(()),
            _ => Err(EngineError::Template(format!("list pool '{}' is missing or empty", pool))),
        },
        Value::Record { pool, field } => match pools.records.get(pool) {
            Some(rows) if !rows.is_empty() => {
                if rows.iter().all(|row| row.contains_key(field)) {
                    Ok(())
                } else {
                    Err(EngineError::Template(format!(
                        "record pool '{}' has rows without field '{}'",
                        pool, field
                    )))
                }
            }
            _ => Err(EngineError::Template(format!(
                "record pool '{}' is missing or empty",
                pool
            ))),
        },
        _ => Ok(()),
    }
}

fn pick_id<R: Rng + ?Sized>(
    session: &mut Session,
    ctx: &mut BuildContext<'_, R>,
) -> EngineResult<String> {
    let ids = if session.discovered_ids().is_empty() {
        ctx.fallback_ids
    } else {
        session.discovered_ids()
    };
    if ids.is_empty() {
        return Err(EngineError::Template(
            "no identifiers discovered and no fallback list".to_string(),
        ));
    }
    let id = ids[ctx.rng.random_range(0..ids.len())].clone();
    session.set_current_id(id.clone());
    Ok(id)
}

fn resolve<R: Rng + ?Sized>(
    value: &Value,
    session: &mut Session,
    ctx: &mut BuildContext<'_, R>,
    rows: &mut HashMap<String, usize>,
) -> EngineResult<String> {
    match value {
        Value::Literal { value } => Ok(value.clone()),
        Value::PickId => pick_id(session, ctx),
        Value::CurrentId => match session.current_id() {
            Some(id) => Ok(id.to_string()),
            None => pick_id(session, ctx),
        },
        Value::IntBetween { min, max } => {
            if min > max {
                return Err(EngineError::Template(format!(
                    "int_between range {}..={} is empty",
                    min, max
                )));
            }
            Ok(ctx.rng.random_range(*min..=*max).to_string())
        }
        Value::OneOf { pool } => {
            let values = ctx
                .pools
                .lists
                .get(pool)
                .filter(|values| !values.is_empty())
                .ok_or_else(|| EngineError::Template(format!("list pool '{}' is empty", pool)))?;
            Ok(values[ctx.rng.random_range(0..values.len())].clone())
        }
        Value::Record { pool, field } => {
            let records = ctx
                .pools
                .records
                .get(pool)
                .filter(|rows| !rows.is_empty())
                .ok_or_else(|| EngineError::Template(format!("record pool '{}' is empty", pool)))?;
            let index = match rows.get(pool) {
                Some(index) => *index,
                None => {
                    let index = ctx.rng.random_range(0..records.len());
                    rows.insert(pool.clone(), index);
                    index
                }
            };
            records[index].get(field).cloned().ok_or_else(|| {
                EngineError::Template(format!("record pool '{}' has no field '{}'", pool, field))
            })
        }
        Value::Email { domain } => Ok(format!(
            "user_{}@{}",
            ctx.rng.random_range(1000..=9999),
            domain
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn pools() -> DataPools {
        let row = |street: &str, city: &str| {
            BTreeMap::from([
                ("street_address".to_string(), street.to_string()),
                ("city".to_string(), city.to_string()),
            ])
        };
        DataPools::new()
            .with_list("currencies", vec!["EUR".to_string(), "JPY".to_string()])
            .with_records(
                "addresses",
                vec![row("221B Baker Street", "London"), row("350 Fifth Avenue", "New York")],
            )
    }

    #[test]
    fn test_path_substitution_uses_fallback_ids() {
        let pools = pools();
        let fallback = vec!["OLJCESPC7Z".to_string()];
        let mut rng = StdRng::seed_from_u64(1);
        let mut ctx = BuildContext { host: "shop", pools: &pools, fallback_ids: &fallback, rng: &mut rng };
        let mut session = Session::new();

        let template = RequestTemplate::get("/product/{id}").param("id", Value::PickId);
        let request = template.build(&mut session, &mut ctx).unwrap();

        assert_eq!(request.path, "/product/OLJCESPC7Z");
        assert_eq!(session.current_id(), Some("OLJCESPC7Z"));
    }

    #[test]
    fn test_current_id_reuses_last_pick() {
        let pools = pools();
        let mut rng = StdRng::seed_from_u64(7);
        let mut ctx = BuildContext { host: "shop", pools: &pools, fallback_ids: &[], rng: &mut rng };
        let mut session = Session::new();
        session.extend_ids(["A", "B", "C", "D"]);

        let product = RequestTemplate::get("/product/{id}").param("id", Value::PickId);
        let add = RequestTemplate::post("/cart")
            .field("product_id", Value::CurrentId)
            .field("quantity", Value::IntBetween { min: 1, max: 3 });

        let viewed = product.build(&mut session, &mut ctx).unwrap();
        let added = add.build(&mut session, &mut ctx).unwrap();

        let id = added.form_value("product_id").unwrap();
        assert_eq!(viewed.path, format!("/product/{}", id));
        let quantity: i64 = added.form_value("quantity").unwrap().parse().unwrap();
        assert!((1..=3).contains(&quantity));
        assert_eq!(added.header("content-type"), Some(FORM_CONTENT_TYPE));
    }

    #[test]
    fn test_record_fields_come_from_one_row() {
        let pools = pools();
        let template = RequestTemplate::post("/cart/checkout")
            .field("street_address", Value::record("addresses", "street_address"))
            .field("city", Value::record("addresses", "city"))
            .field("email", Value::Email { domain: "example.com".into() });

        for seed in 0..20 {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut ctx = BuildContext { host: "shop", pools: &pools, fallback_ids: &[], rng: &mut rng };
            let request = template.build(&mut Session::new(), &mut ctx).unwrap();

            let pair = (request.form_value("street_address").unwrap(), request.form_value("city").unwrap());
            assert!(
                pair == ("221B Baker Street", "London") || pair == ("350 Fifth Avenue", "New York"),
                "mixed rows: {:?}",
                pair
            );
            let email = request.form_value("email").unwrap();
            assert!(email.starts_with("user_") && email.ends_with("@example.com"));
        }
    }

    #[test]
    fn test_cookies_are_attached() {
        let pools = DataPools::new();
        let mut rng = StdRng::seed_from_u64(3);
        let mut ctx = BuildContext { host: "shop", pools: &pools, fallback_ids: &[], rng: &mut rng };
        let mut session = Session::new();
        session.cookies_mut().absorb("shop", &["sid=42".to_string()]);

        let request = RequestTemplate::get("/cart").build(&mut session, &mut ctx).unwrap();
        assert_eq!(request.cookies.as_deref(), Some("sid=42"));
        assert!(request.form.is_empty());
        assert!(request.headers.is_empty());
    }

    #[test]
    fn test_validation() {
        let pools = pools();
        assert!(RequestTemplate::get("/product/{id}").validate(&pools).is_err());
        assert!(RequestTemplate::post("/setCurrency")
            .field("currency_code", Value::one_of("currencies"))
            .validate(&pools)
            .is_ok());
        assert!(RequestTemplate::post("/setCurrency")
            .field("currency_code", Value::one_of("languages"))
            .validate(&pools)
            .is_err());
        assert!(RequestTemplate::post("/cart/checkout")
            .field("zip", Value::record("addresses", "zip_code"))
            .validate(&pools)
            .is_err());
    }

    #[test]
    fn test_template_is_plain_data() {
        let template = RequestTemplate::post("/cart")
            .field("product_id", Value::CurrentId)
            .timeout(Duration::from_secs(5));
        let yaml = serde_yaml::to_string(&template).unwrap();
        let parsed: RequestTemplate = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, template);
    }
}
