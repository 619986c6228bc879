//! Run-wide metric collection
//!
//! Every iteration reports into one shared [`MetricsRegistry`]. Samples are
//! keyed by metric name plus their full tag set; queries merge every series
//! whose tags contain the requested filter.

pub mod aggregate;
pub mod names;

pub use aggregate::{Aggregate, CounterAggregate, MetricKind, RateAggregate, TrendAggregate};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::debug;

/// Metric tags, kept sorted so equal tag sets compare equal
pub type Tags = BTreeMap<String, String>;

/// Build a tag set from string pairs
pub fn tags<K, V, I>(pairs: I) -> Tags
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// One observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub name: String,
    pub kind: MetricKind,
    pub value: f64,
    #[serde(default)]
    pub tags: Tags,
}

impl MetricSample {
    pub fn counter(name: impl Into<String>, value: f64, tags: Tags) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Counter,
            value,
            tags,
        }
    }

    pub fn rate(name: impl Into<String>, passed: bool, tags: Tags) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Rate,
            value: if passed { 1.0 } else { 0.0 },
            tags,
        }
    }

    pub fn trend(name: impl Into<String>, value: f64, tags: Tags) -> Self {
        Self {
            name: name.into(),
            kind: MetricKind::Trend,
            value,
            tags,
        }
    }
}

type SeriesKey = (String, Tags);

/// Thread-safe metric registry shared by every iteration of a run
#[derive(Debug, Clone, Default)]
pub struct MetricsRegistry {
    series: Arc<RwLock<HashMap<SeriesKey, Aggregate>>>,
}

impl MetricsRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a sample into its series.
    ///
    /// A sample whose kind disagrees with the series already registered under
    /// the same name and tags is discarded.
    pub fn record(&self, sample: MetricSample) {
        let mut series = self.series.write();
        let aggregate = series
            .entry((sample.name, sample.tags))
            .or_insert_with(|| Aggregate::empty(sample.kind));

        if aggregate.kind() == sample.kind {
            aggregate.observe(sample.value);
        } else {
            debug!(
                "Discarding {} sample for a {} series",
                sample.kind,
                aggregate.kind()
            );
        }
    }

    pub fn add_counter(&self, name: &str, value: f64, tags: &Tags) {
        self.record(MetricSample::counter(name, value, tags.clone()));
    }

    pub fn add_rate(&self, name: &str, passed: bool, tags: &Tags) {
        self.record(MetricSample::rate(name, passed, tags.clone()));
    }

    pub fn add_trend(&self, name: &str, value: f64, tags: &Tags) {
        self.record(MetricSample::trend(name, value, tags.clone()));
    }

    /// Merge every series of `name` whose tags contain all of `filter`.
    /// Returns `None` when nothing matches.
    pub fn aggregate(&self, name: &str, filter: &Tags) -> Option<Aggregate> {
        let series = self.series.read();
        let mut merged: Option<Aggregate> = None;

        for ((series_name, series_tags), aggregate) in series.iter() {
            if series_name != name || !contains_tags(series_tags, filter) {
                continue;
            }
            match merged.as_mut() {
                Some(total) => {
                    total.merge(aggregate);
                }
                None => merged = Some(aggregate.clone()),
            }
        }

        merged
    }

    /// Every series of `name` with its tags
    pub fn series(&self, name: &str) -> Vec<(Tags, Aggregate)> {
        self.series
            .read()
            .iter()
            .filter(|((series_name, _), _)| series_name == name)
            .map(|((_, tags), aggregate)| (tags.clone(), aggregate.clone()))
            .collect()
    }

    /// Merge `name`'s series grouped by the value of tag `key`
    pub fn grouped_by(&self, name: &str, key: &str) -> BTreeMap<String, Aggregate> {
        let mut groups: BTreeMap<String, Aggregate> = BTreeMap::new();
        for (tags, aggregate) in self.series(name) {
            let Some(value) = tags.get(key) else { continue };
            match groups.get_mut(value) {
                Some(group) => {
                    group.merge(&aggregate);
                }
                None => {
                    groups.insert(value.clone(), aggregate);
                }
            }
        }
        groups
    }

    /// Names of every metric that has at least one series
    pub fn metric_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .series
            .read()
            .keys()
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names.dedup();
        names
    }

    /// Counter sum over every series of `name`, zero when absent
    pub fn counter_total(&self, name: &str) -> f64 {
        match self.aggregate(name, &Tags::new()) {
            Some(Aggregate::Counter(counter)) => counter.sum,
            _ => 0.0,
        }
    }

    /// Rate aggregate over every series of `name`
    pub fn rate_total(&self, name: &str) -> Option<RateAggregate> {
        match self.aggregate(name, &Tags::new()) {
            Some(Aggregate::Rate(rate)) => Some(rate),
            _ => None,
        }
    }
}

fn contains_tags(tags: &Tags, filter: &Tags) -> bool {
    filter
        .iter()
        .all(|(key, value)| tags.get(key).is_some_and(|v| v == value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_filtered_queries() {
        let registry = MetricsRegistry::new();
        registry.add_trend("http_req_duration", 100.0, &tags([("step", "home")]));
        registry.add_trend("http_req_duration", 300.0, &tags([("step", "cart")]));
        registry.add_trend(
            "http_req_duration",
            200.0,
            &tags([("step", "home"), ("journey", "browse")]),
        );

        let Some(Aggregate::Trend(all)) = registry.aggregate("http_req_duration", &Tags::new())
        else {
            panic!("expected trend")
        };
        assert_eq!(all.count(), 3);

        let Some(Aggregate::Trend(home)) =
            registry.aggregate("http_req_duration", &tags([("step", "home")]))
        else {
            panic!("expected trend")
        };
        assert_eq!(home.count(), 2);
        assert_eq!(home.avg(), Some(150.0));

        assert!(registry
            .aggregate("http_req_duration", &tags([("step", "checkout")]))
            .is_none());
    }

    #[test]
    fn test_grouped_by_tag() {
        let registry = MetricsRegistry::new();
        registry.add_rate("checks", true, &tags([("check", "status is 200"), ("step", "a")]));
        registry.add_rate("checks", false, &tags([("check", "status is 200"), ("step", "b")]));
        registry.add_rate("checks", true, &tags([("check", "has price")]));

        let groups = registry.grouped_by("checks", "check");
        assert_eq!(groups.len(), 2);
        let Aggregate::Rate(status) = &groups["status is 200"] else {
            panic!("expected rate")
        };
        assert_eq!((status.trues, status.total), (1, 2));
    }

    #[test]
    fn test_kind_conflicts_are_discarded() {
        let registry = MetricsRegistry::new();
        registry.add_counter("iterations", 1.0, &Tags::new());
        registry.add_rate("iterations", true, &Tags::new());
        assert_eq!(registry.counter_total("iterations"), 1.0);
    }

    #[tokio::test]
    async fn test_concurrent_recording() {
        let registry = MetricsRegistry::new();
        let mut handles = Vec::new();
        for worker in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for _ in 0..250 {
                    registry.add_counter("http_reqs", 1.0, &tags([("worker", worker.to_string())]));
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.counter_total("http_reqs"), 2000.0);
        assert_eq!(registry.metric_names(), vec!["http_reqs".to_string()]);
    }
}
