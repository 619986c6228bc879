//! Journeys and the journey catalog
//!
//! A journey is an ordered list of steps; a step is a request template, the
//! checks run against its response and a few flags. Everything here is plain
//! data, so a catalog can be inspected, serialized and tested without I/O.

use serde::{Deserialize, Serialize};

use crate::check::CheckSet;
use crate::error::{EngineError, EngineResult};
use crate::metrics::Tags;
use crate::template::{DataPools, RequestTemplate};

fn default_true() -> bool {
    true
}

/// Repeat a step a random number of times in `[min, max]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repeat {
    pub min: u32,
    pub max: u32,
}

/// One logical request plus its assertions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// Label used as the `step` metric tag
    pub label: String,

    pub request: RequestTemplate,

    #[serde(default)]
    pub checks: CheckSet,

    /// Extra tags for every metric this step emits
    #[serde(default, skip_serializing_if = "Tags::is_empty")]
    pub tags: Tags,

    /// Whether think time may be inserted before this step
    #[serde(default = "default_true")]
    pub think_time_eligible: bool,

    /// Scan the response body for identifiers
    #[serde(default)]
    pub harvest_ids: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat: Option<Repeat>,

    /// Extra trend that receives this step's latency
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing_metric: Option<String>,
}

impl Step {
    pub fn new(label: impl Into<String>, request: RequestTemplate) -> Self {
        Self {
            label: label.into(),
            request,
            checks: CheckSet::default(),
            tags: Tags::new(),
            think_time_eligible: true,
            harvest_ids: false,
            repeat: None,
            timing_metric: None,
        }
    }

    pub fn checks(mut self, checks: CheckSet) -> Self {
        self.checks = checks;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn harvest(mut self) -> Self {
        self.harvest_ids = true;
        self
    }

    pub fn without_think_time(mut self) -> Self {
        self.think_time_eligible = false;
        self
    }

    pub fn repeat(mut self, min: u32, max: u32) -> Self {
        self.repeat = Some(Repeat { min, max });
        self
    }

    pub fn timing_metric(mut self, name: impl Into<String>) -> Self {
        self.timing_metric = Some(name.into());
        self
    }

    fn validate(&self, pools: &DataPools) -> EngineResult<()> {
        if self.label.trim().is_empty() {
            return Err(EngineError::InvalidCatalog("step label cannot be empty".to_string()));
        }
        if let Some(repeat) = self.repeat {
            if repeat.min > repeat.max {
                return Err(EngineError::InvalidCatalog(format!(
                    "step '{}' repeat range {}..={} is empty",
                    self.label, repeat.min, repeat.max
                )));
            }
        }
        self.request.validate(pools)
    }
}

/// A named user scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub name: String,
    /// Relative selection weight, must be `>= 0`
    pub weight: f64,
    pub steps: Vec<Step>,
}

impl Journey {
    pub fn new(name: impl Into<String>, weight: f64, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            weight,
            steps,
        }
    }
}

/// The journeys of one profile
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JourneyCatalog {
    journeys: Vec<Journey>,
}

impl JourneyCatalog {
    pub fn new(journeys: Vec<Journey>) -> Self {
        Self { journeys }
    }

    pub fn journeys(&self) -> &[Journey] {
        &self.journeys
    }

    pub fn get(&self, name: &str) -> Option<&Journey> {
        self.journeys.iter().find(|journey| journey.name == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.journeys.iter().map(|journey| journey.name.as_str()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.journeys.is_empty()
    }

    /// A catalog holding only `name`
    pub fn restricted_to(&self, name: &str) -> EngineResult<Self> {
        let journey = self.get(name).cloned().ok_or_else(|| {
            EngineError::InvalidCatalog(format!(
                "unknown journey '{}' (available: {})",
                name,
                self.names().join(", ")
            ))
        })?;
        Ok(Self::new(vec![Journey { weight: 1.0, ..journey }]))
    }

    /// Give every journey the same weight
    pub fn with_equal_weights(mut self) -> Self {
        for journey in &mut self.journeys {
            journey.weight = 1.0;
        }
        self
    }

    /// Check weights, step lists and every template against `pools`
    pub fn validate(&self, pools: &DataPools) -> EngineResult<()> {
        if self.journeys.is_empty() {
            return Err(EngineError::InvalidCatalog("catalog has no journeys".to_string()));
        }

        let mut total = 0.0;
        for journey in &self.journeys {
            if !journey.weight.is_finite() || journey.weight < 0.0 {
                return Err(EngineError::InvalidCatalog(format!(
                    "journey '{}' has invalid weight {}",
                    journey.name, journey.weight
                )));
            }
            if journey.steps.is_empty() {
                return Err(EngineError::InvalidCatalog(format!(
                    "journey '{}' has no steps",
                    journey.name
                )));
            }
            for step in &journey.steps {
                step.validate(pools)?;
            }
            total += journey.weight;
        }

        if total <= 0.0 {
            return Err(EngineError::InvalidCatalog(
                "journey weights must sum to a positive total".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::check::Check;

    fn catalog() -> JourneyCatalog {
        JourneyCatalog::new(vec![
            Journey::new(
                "browse",
                3.0,
                vec![Step::new("home", RequestTemplate::get("/")).harvest()],
            ),
            Journey::new(
                "cart",
                1.0,
                vec![
                    Step::new("home", RequestTemplate::get("/")),
                    Step::new("view_cart", RequestTemplate::get("/cart"))
                        .checks(CheckSet::new(vec![Check::status_is("status is 200", 200)])),
                ],
            ),
        ])
    }

    #[test]
    fn test_catalog_validation() {
        assert!(catalog().validate(&DataPools::new()).is_ok());

        let mut zero = catalog();
        zero.journeys.iter_mut().for_each(|j| j.weight = 0.0);
        assert!(zero.validate(&DataPools::new()).is_err());

        let mut negative = catalog();
        negative.journeys[0].weight = -1.0;
        assert!(negative.validate(&DataPools::new()).is_err());

        assert!(JourneyCatalog::default().validate(&DataPools::new()).is_err());
    }

    #[test]
    fn test_restricted_catalog() {
        let only = catalog().restricted_to("cart").unwrap();
        assert_eq!(only.names(), vec!["cart"]);
        assert_eq!(only.journeys()[0].weight, 1.0);
        assert!(catalog().restricted_to("checkout").is_err());
    }

    #[test]
    fn test_catalog_round_trips_through_yaml() {
        let yaml = serde_yaml::to_string(&catalog()).unwrap();
        let parsed: JourneyCatalog = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, catalog());
        assert!(parsed.get("browse").unwrap().steps[0].harvest_ids);
    }
}
