//! Response assertions
//!
//! A [`CheckSet`] is a named list of predicates. Every predicate is evaluated
//! for every response (no short-circuit) so each failing assertion is counted
//! on its own.

use serde::{Deserialize, Serialize};

use crate::metrics::{names, MetricsRegistry, Tags};
use crate::request::Response;

/// A boolean test over a response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Predicate {
    /// Exact status code
    StatusIs { status: u16 },
    /// Status in `[min, max)`
    StatusRange { min: u16, max: u16 },
    /// Body contains the text
    BodyContains { text: String },
    /// Body contains at least one of the texts
    BodyContainsAny { texts: Vec<String> },
}

impl Predicate {
    pub fn evaluate(&self, response: &Response) -> bool {
        match self {
            Predicate::StatusIs { status } => response.status == *status,
            Predicate::StatusRange { min, max } => (*min..*max).contains(&response.status),
            Predicate::BodyContains { text } => response.body.contains(text.as_str()),
            Predicate::BodyContainsAny { texts } => {
                texts.iter().any(|text| response.body.contains(text.as_str()))
            }
        }
    }
}

/// A labelled predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Check {
    pub name: String,
    pub predicate: Predicate,
}

impl Check {
    pub fn new(name: impl Into<String>, predicate: Predicate) -> Self {
        Self {
            name: name.into(),
            predicate,
        }
    }

    pub fn status_is(name: impl Into<String>, status: u16) -> Self {
        Self::new(name, Predicate::StatusIs { status })
    }

    pub fn status_range(name: impl Into<String>, min: u16, max: u16) -> Self {
        Self::new(name, Predicate::StatusRange { min, max })
    }

    pub fn body_contains(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(name, Predicate::BodyContains { text: text.into() })
    }

    pub fn body_contains_any<I, S>(name: impl Into<String>, texts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(
            name,
            Predicate::BodyContainsAny {
                texts: texts.into_iter().map(Into::into).collect(),
            },
        )
    }
}

/// The checks of one step plus the outcome metrics they feed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckSet {
    #[serde(default)]
    pub checks: Vec<Check>,

    /// Counter incremented once whenever the set as a whole fails
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_counter: Option<String>,

    /// Rate recording whether the set as a whole passed (transaction outcome)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome_rate: Option<String>,
}

impl CheckSet {
    pub fn new(checks: Vec<Check>) -> Self {
        Self {
            checks,
            failure_counter: None,
            outcome_rate: None,
        }
    }

    pub fn with_failure_counter(mut self, name: impl Into<String>) -> Self {
        self.failure_counter = Some(name.into());
        self
    }

    pub fn with_outcome_rate(mut self, name: impl Into<String>) -> Self {
        self.outcome_rate = Some(name.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }

    /// Record a failed transaction for a step that produced no response
    pub fn record_unreachable(&self, registry: &MetricsRegistry, tags: &Tags) {
        self.record_outcome(false, registry, tags);
    }

    fn record_outcome(&self, passed: bool, registry: &MetricsRegistry, tags: &Tags) {
        if let Some(rate) = &self.outcome_rate {
            registry.add_rate(rate, passed, tags);
        }
        if !passed {
            if let Some(counter) = &self.failure_counter {
                registry.add_counter(counter, 1.0, tags);
            }
        }
    }
}

/// Outcome of one predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub passed: bool,
}

/// Outcome of a whole check set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CheckOutcome {
    pub results: Vec<CheckResult>,
    /// True only when every predicate passed
    pub passed: bool,
}

impl CheckOutcome {
    pub fn failed(&self) -> usize {
        self.results.iter().filter(|result| !result.passed).count()
    }
}

/// Evaluate `set` against `response` for the step called `name`.
///
/// Each predicate emits a `checks` rate sample tagged with the check name;
/// the set's failure counter and outcome rate are updated from the overall
/// result.
pub fn check(
    response: &Response,
    name: &str,
    set: &CheckSet,
    registry: &MetricsRegistry,
    tags: &Tags,
) -> CheckOutcome {
    let results: Vec<CheckResult> = set
        .checks
        .iter()
        .map(|check| CheckResult {
            name: check.name.clone(),
            passed: check.predicate.evaluate(response),
        })
        .collect();

    for result in &results {
        let mut check_tags = tags.clone();
        check_tags.insert(names::TAG_CHECK.to_string(), result.name.clone());
        registry.add_rate(names::CHECKS, result.passed, &check_tags);
    }

    let passed = results.iter().all(|result| result.passed);
    if !passed {
        tracing::debug!(
            step = name,
            failed = results.iter().filter(|r| !r.passed).count(),
            "Checks failed"
        );
    }
    set.record_outcome(passed, registry, tags);

    CheckOutcome { results, passed }
}
