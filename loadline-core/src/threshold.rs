//! Threshold expressions over aggregated metrics
//!
//! A threshold is a key naming a metric (optionally narrowed by tags, as in
//! `http_req_duration{step:home}`) plus an expression comparing one
//! aggregate statistic with a bound, e.g. `p(95)<1500` or `rate<0.01`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{EngineError, EngineResult};
use crate::metrics::{Aggregate, MetricsRegistry, Tags};

/// Aggregate statistic a threshold compares
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Statistic {
    Count,
    Rate,
    Avg,
    Min,
    Max,
    Med,
    Percentile(f64),
}

impl fmt::Display for Statistic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statistic::Count => write!(f, "count"),
            Statistic::Rate => write!(f, "rate"),
            Statistic::Avg => write!(f, "avg"),
            Statistic::Min => write!(f, "min"),
            Statistic::Max => write!(f, "max"),
            Statistic::Med => write!(f, "med"),
            Statistic::Percentile(p) => write!(f, "p({})", p),
        }
    }
}

impl FromStr for Statistic {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "count" => Ok(Statistic::Count),
            "rate" => Ok(Statistic::Rate),
            "avg" => Ok(Statistic::Avg),
            "min" => Ok(Statistic::Min),
            "max" => Ok(Statistic::Max),
            "med" => Ok(Statistic::Med),
            _ => {
                let inner = s
                    .strip_prefix("p(")
                    .and_then(|rest| rest.strip_suffix(')'))
                    .ok_or_else(|| format!("unknown statistic '{}'", s))?;
                let percentile: f64 = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid percentile '{}'", inner))?;
                if !(percentile > 0.0 && percentile <= 100.0) {
                    return Err(format!("percentile {} must be in (0, 100]", percentile));
                }
                Ok(Statistic::Percentile(percentile))
            }
        }
    }
}

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
}

impl Comparison {
    // Two-character operators first so `<=` is not read as `<`
    const ALL: [(&'static str, Comparison); 6] = [
        ("<=", Comparison::Le),
        (">=", Comparison::Ge),
        ("==", Comparison::Eq),
        ("!=", Comparison::Ne),
        ("<", Comparison::Lt),
        (">", Comparison::Gt),
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
        }
    }

    pub fn holds(&self, observed: f64, bound: f64) -> bool {
        match self {
            Comparison::Lt => observed < bound,
            Comparison::Le => observed <= bound,
            Comparison::Gt => observed > bound,
            Comparison::Ge => observed >= bound,
            Comparison::Eq => observed == bound,
            Comparison::Ne => observed != bound,
        }
    }
}

/// `<stat> <op> <bound>`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub statistic: Statistic,
    pub comparison: Comparison,
    pub bound: f64,
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.statistic, self.comparison.as_str(), self.bound)
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let expression = s.trim();
        let start = expression
            .find(['<', '>', '=', '!'])
            .ok_or_else(|| format!("no comparison operator in '{}'", expression))?;

        let rest = &expression[start..];
        let (symbol, comparison) = Comparison::ALL
            .iter()
            .find(|(symbol, _)| rest.starts_with(symbol))
            .copied()
            .ok_or_else(|| format!("invalid operator in '{}'", expression))?;

        let statistic: Statistic = expression[..start].trim().parse()?;
        let bound_text = rest[symbol.len()..].trim();
        let bound: f64 = bound_text
            .parse()
            .map_err(|_| format!("invalid bound '{}'", bound_text))?;
        if !bound.is_finite() {
            return Err(format!("bound '{}' is not finite", bound_text));
        }

        Ok(Condition {
            statistic,
            comparison,
            bound,
        })
    }
}

/// A pass/fail condition over one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdSpec {
    /// Key as written, e.g. `http_req_duration{step:home}`
    pub key: String,
    pub metric: String,
    pub tags: Tags,
    /// Expression as written, e.g. `p(95)<1500`
    pub expression: String,
    pub condition: Condition,
    /// Stop the run as soon as the condition is violated
    pub abort_on_fail: bool,
}

impl ThresholdSpec {
    /// Parse a key and an expression
    pub fn parse(key: &str, expression: &str, abort_on_fail: bool) -> EngineResult<Self> {
        let invalid = |message: String| EngineError::InvalidThreshold {
            key: key.to_string(),
            message,
        };

        let (metric, tags) = parse_key(key).map_err(invalid)?;
        let condition: Condition = expression.parse().map_err(invalid)?;

        Ok(Self {
            key: key.to_string(),
            metric,
            tags,
            expression: expression.trim().to_string(),
            condition,
            abort_on_fail,
        })
    }

    /// Evaluate against the current aggregates.
    ///
    /// `elapsed` turns counter totals into per-second rates. A metric with no
    /// samples passes; a statistic the metric type does not offer fails.
    pub fn evaluate(&self, registry: &MetricsRegistry, elapsed: Duration) -> ThresholdOutcome {
        let mut outcome = ThresholdOutcome {
            key: self.key.clone(),
            expression: self.expression.clone(),
            passed: true,
            observed: None,
            abort_on_fail: self.abort_on_fail,
            note: None,
        };

        let Some(aggregate) = registry.aggregate(&self.metric, &self.tags) else {
            outcome.note = Some("no samples".to_string());
            return outcome;
        };

        match observe(&aggregate, self.condition.statistic, elapsed) {
            Ok(Some(observed)) => {
                outcome.observed = Some(observed);
                outcome.passed = self.condition.comparison.holds(observed, self.condition.bound);
            }
            Ok(None) => outcome.note = Some("no samples".to_string()),
            Err(note) => {
                outcome.passed = false;
                outcome.note = Some(note);
            }
        }
        outcome
    }
}

/// Result of evaluating one threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThresholdOutcome {
    pub key: String,
    pub expression: String,
    pub passed: bool,
    /// The statistic's value, absent when there was nothing to measure
    pub observed: Option<f64>,
    pub abort_on_fail: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Evaluate every threshold
pub fn evaluate_all(
    thresholds: &[ThresholdSpec],
    registry: &MetricsRegistry,
    elapsed: Duration,
) -> Vec<ThresholdOutcome> {
    thresholds
        .iter()
        .map(|threshold| threshold.evaluate(registry, elapsed))
        .collect()
}

fn parse_key(key: &str) -> Result<(String, Tags), String> {
    let key = key.trim();
    let (metric, filter) = match key.split_once('{') {
        Some((metric, rest)) => {
            let inner = rest
                .strip_suffix('}')
                .ok_or_else(|| "tag filter is missing its closing '}'".to_string())?;
            (metric.trim(), Some(inner))
        }
        None => (key, None),
    };

    if metric.is_empty() {
        return Err("metric name cannot be empty".to_string());
    }

    let mut tags = Tags::new();
    if let Some(filter) = filter {
        for pair in filter.split(',').map(str::trim).filter(|pair| !pair.is_empty()) {
            let (name, value) = pair
                .split_once(':')
                .ok_or_else(|| format!("tag filter '{}' is not name:value", pair))?;
            tags.insert(name.trim().to_string(), value.trim().to_string());
        }
    }
    Ok((metric.to_string(), tags))
}

fn observe(aggregate: &Aggregate, statistic: Statistic, elapsed: Duration) -> Result<Option<f64>, String> {
    let inapplicable = || Err(format!("{} is not available for {} metrics", statistic, aggregate.kind()));

    match aggregate {
        Aggregate::Counter(counter) => match statistic {
            Statistic::Count => Ok(Some(counter.sum)),
            Statistic::Rate => {
                let secs = elapsed.as_secs_f64();
                Ok(Some(if secs > 0.0 { counter.sum / secs } else { counter.sum }))
            }
            _ => inapplicable(),
        },
        Aggregate::Rate(rate) => match statistic {
            Statistic::Rate => Ok(rate.rate()),
            _ => inapplicable(),
        },
        Aggregate::Trend(trend) => match statistic {
            Statistic::Count => Ok(Some(trend.count() as f64)),
            Statistic::Avg => Ok(trend.avg()),
            Statistic::Min => Ok(trend.min()),
            Statistic::Max => Ok(trend.max()),
            Statistic::Med => Ok(trend.median()),
            Statistic::Percentile(p) => Ok(trend.percentile(p)),
            Statistic::Rate => inapplicable(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::tags;

    #[test]
    fn test_parse_keys_and_expressions() {
        let spec = ThresholdSpec::parse("http_req_duration{step:home}", "p(95)<1500", false).unwrap();
        assert_eq!(spec.metric, "http_req_duration");
        assert_eq!(spec.tags, tags([("step", "home")]));
        assert_eq!(spec.condition.statistic, Statistic::Percentile(95.0));
        assert_eq!(spec.condition.comparison, Comparison::Lt);
        assert_eq!(spec.condition.bound, 1500.0);

        let spec = ThresholdSpec::parse("checkout_success_rate", " rate >= 0.95 ", true).unwrap();
        assert_eq!(spec.condition.comparison, Comparison::Ge);
        assert!(spec.abort_on_fail);

        let spec = ThresholdSpec::parse("checks{check:status is 200, step:home}", "rate!=0", false).unwrap();
        assert_eq!(spec.tags.get("check").map(String::as_str), Some("status is 200"));
        assert_eq!(spec.condition.to_string(), "rate!=0");
    }

    #[test]
    fn test_parse_errors() {
        assert!(ThresholdSpec::parse("", "rate<1", false).is_err());
        assert!(ThresholdSpec::parse("x{step:home", "rate<1", false).is_err());
        assert!(ThresholdSpec::parse("x{step}", "rate<1", false).is_err());
        assert!(ThresholdSpec::parse("x", "p95<1", false).is_err());
        assert!(ThresholdSpec::parse("x", "p(0)<1", false).is_err());
        assert!(ThresholdSpec::parse("x", "rate 0.1", false).is_err());
        assert!(ThresholdSpec::parse("x", "rate<abc", false).is_err());
        assert!(ThresholdSpec::parse("x", "mean<1", false).is_err());
    }

    #[test]
    fn test_trend_thresholds_respect_tag_filter() {
        let registry = MetricsRegistry::new();
        for ms in [100.0, 200.0, 300.0] {
            registry.add_trend("http_req_duration", ms, &tags([("step", "home")]));
        }
        registry.add_trend("http_req_duration", 9000.0, &tags([("step", "checkout")]));

        let home = ThresholdSpec::parse("http_req_duration{step:home}", "max<1000", false).unwrap();
        let all = ThresholdSpec::parse("http_req_duration", "max<1000", false).unwrap();

        let outcome = home.evaluate(&registry, Duration::from_secs(1));
        assert!(outcome.passed);
        assert_eq!(outcome.observed, Some(300.0));
        assert!(!all.evaluate(&registry, Duration::from_secs(1)).passed);

        let avg = ThresholdSpec::parse("http_req_duration{step:home}", "avg==200", false).unwrap();
        assert!(avg.evaluate(&registry, Duration::from_secs(1)).passed);
    }

    #[test]
    fn test_rate_and_counter_thresholds() {
        let registry = MetricsRegistry::new();
        for failed in [false, false, false, true] {
            registry.add_rate("http_req_failed", failed, &Tags::new());
        }
        registry.add_counter("http_reqs", 40.0, &Tags::new());

        let failed = ThresholdSpec::parse("http_req_failed", "rate<0.01", true).unwrap();
        let outcome = failed.evaluate(&registry, Duration::from_secs(10));
        assert!(!outcome.passed);
        assert_eq!(outcome.observed, Some(0.25));
        assert!(outcome.abort_on_fail);

        let throughput = ThresholdSpec::parse("http_reqs", "rate>=4", false).unwrap();
        assert_eq!(throughput.evaluate(&registry, Duration::from_secs(10)).observed, Some(4.0));
        let total = ThresholdSpec::parse("http_reqs", "count==40", false).unwrap();
        assert!(total.evaluate(&registry, Duration::from_secs(10)).passed);
    }

    #[test]
    fn test_missing_data_passes_and_inapplicable_stat_fails() {
        let registry = MetricsRegistry::new();
        registry.add_rate("checks", true, &Tags::new());

        let missing = ThresholdSpec::parse("checkout_success_rate", "rate>0.95", false).unwrap();
        let outcome = missing.evaluate(&registry, Duration::from_secs(1));
        assert!(outcome.passed);
        assert_eq!(outcome.observed, None);

        let wrong = ThresholdSpec::parse("checks", "p(95)<1", false).unwrap();
        let outcome = wrong.evaluate(&registry, Duration::from_secs(1));
        assert!(!outcome.passed);
        assert!(outcome.note.unwrap().contains("not available"));

        let outcomes = evaluate_all(&[missing, wrong], &registry, Duration::from_secs(1));
        assert_eq!(outcomes.iter().filter(|o| o.passed).count(), 1);
    }
}
