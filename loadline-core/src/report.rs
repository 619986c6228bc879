//! Run report
//!
//! The structured summary of a finished run: per-metric aggregates, check
//! totals, threshold outcomes, run counters and the overall verdict. It is
//! plain serializable data; writing it anywhere is up to the caller.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::time::Duration;
use uuid::Uuid;

use crate::control::StopReason;
use crate::metrics::{names, Aggregate, MetricsRegistry, Tags};
use crate::state::{RunCounters, RunState};
use crate::threshold::{ThresholdOutcome, ThresholdSpec};

/// Overall result of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Every threshold held
    Pass,
    /// At least one threshold failed
    Fail,
    /// An abort-on-fail threshold stopped the run
    Aborted,
}

impl Verdict {
    pub fn is_pass(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Verdict::Pass => write!(f, "PASS"),
            Verdict::Fail => write!(f, "FAIL"),
            Verdict::Aborted => write!(f, "ABORTED"),
        }
    }
}

/// Aggregate of one metric as reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MetricSummary {
    Counter {
        count: f64,
        /// Per second of run time
        rate: f64,
    },
    Rate {
        rate: f64,
        passes: u64,
        fails: u64,
    },
    Trend {
        count: u64,
        avg: f64,
        min: f64,
        med: f64,
        p90: f64,
        p95: f64,
        p99: f64,
        max: f64,
    },
}

impl MetricSummary {
    pub fn from_aggregate(aggregate: &Aggregate, elapsed: Duration) -> Self {
        match aggregate {
            Aggregate::Counter(counter) => {
                let secs = elapsed.as_secs_f64();
                MetricSummary::Counter {
                    count: counter.sum,
                    rate: if secs > 0.0 { counter.sum / secs } else { 0.0 },
                }
            }
            Aggregate::Rate(rate) => MetricSummary::Rate {
                rate: rate.rate().unwrap_or(0.0),
                passes: rate.trues,
                fails: rate.falses(),
            },
            Aggregate::Trend(trend) => MetricSummary::Trend {
                count: trend.count(),
                avg: trend.avg().unwrap_or(0.0),
                min: trend.min().unwrap_or(0.0),
                med: trend.median().unwrap_or(0.0),
                p90: trend.percentile(90.0).unwrap_or(0.0),
                p95: trend.percentile(95.0).unwrap_or(0.0),
                p99: trend.percentile(99.0).unwrap_or(0.0),
                max: trend.max().unwrap_or(0.0),
            },
        }
    }
}

/// Pass/fail totals of one named check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub passes: u64,
    pub fails: u64,
}

/// Everything a run produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub profile: String,
    pub verdict: Verdict,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub counters: RunCounters,
    pub stop_reason: Option<StopReason>,
    /// Keyed by metric name; tagged sub-metrics used by thresholds are
    /// listed under their threshold key
    pub metrics: BTreeMap<String, MetricSummary>,
    pub checks: BTreeMap<String, CheckSummary>,
    /// Failed check predicates across the run
    pub assertion_failures: u64,
    pub thresholds: Vec<ThresholdOutcome>,
}

impl RunReport {
    /// Assemble the report of a finished run
    pub fn build(
        run_id: Uuid,
        profile: impl Into<String>,
        state: &RunState,
        stop_reason: Option<StopReason>,
        thresholds: &[ThresholdSpec],
        outcomes: Vec<ThresholdOutcome>,
    ) -> Self {
        let elapsed = state.elapsed();
        let registry = state.metrics();

        let metrics = summarize(registry, thresholds, elapsed);
        let checks: BTreeMap<String, CheckSummary> = registry
            .grouped_by(names::CHECKS, names::TAG_CHECK)
            .into_iter()
            .filter_map(|(name, aggregate)| match aggregate {
                Aggregate::Rate(rate) => Some((
                    name,
                    CheckSummary {
                        passes: rate.trues,
                        fails: rate.falses(),
                    },
                )),
                _ => None,
            })
            .collect();
        let assertion_failures = checks.values().map(|check| check.fails).sum();

        let verdict = if state.is_aborted() {
            Verdict::Aborted
        } else if outcomes.iter().any(|outcome| !outcome.passed) {
            Verdict::Fail
        } else {
            Verdict::Pass
        };

        Self {
            run_id,
            profile: profile.into(),
            verdict,
            started_at: state.started_at(),
            finished_at: Utc::now(),
            duration_secs: elapsed.as_secs_f64(),
            counters: state.counters(),
            stop_reason,
            metrics,
            checks,
            assertion_failures,
            thresholds: outcomes,
        }
    }

    /// Rate value of a rate metric, if it has samples
    pub fn rate(&self, metric: &str) -> Option<f64> {
        match self.metrics.get(metric) {
            Some(MetricSummary::Rate { rate, .. }) => Some(*rate),
            _ => None,
        }
    }

    /// Sum of a counter metric, zero when absent
    pub fn count(&self, metric: &str) -> f64 {
        match self.metrics.get(metric) {
            Some(MetricSummary::Counter { count, .. }) => *count,
            _ => 0.0,
        }
    }

    pub fn failed_thresholds(&self) -> impl Iterator<Item = &ThresholdOutcome> {
        self.thresholds.iter().filter(|outcome| !outcome.passed)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Human-readable summary
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let line = |out: &mut String, label: &str, value: String| {
            let _ = writeln!(out, "  {:<24}{}", label, value);
        };

        let _ = writeln!(out, "loadline run {} (profile {})", self.run_id, self.profile);
        line(&mut out, "verdict", self.verdict.to_string());
        line(&mut out, "duration", format!("{:.1}s", self.duration_secs));
        if let Some(reason) = &self.stop_reason {
            line(&mut out, "stop reason", reason.to_string());
        }

        let c = &self.counters;
        line(
            &mut out,
            "iterations",
            format!(
                "issued {}, completed {}, incomplete {}, truncated {}, interrupted {}",
                c.issued, c.completed, c.incomplete, c.truncated, c.interrupted
            ),
        );
        line(
            &mut out,
            "scheduling",
            format!(
                "dropped {}, delayed {}, peak pool {}, peak active {}",
                c.dropped, c.delayed, c.peak_pool_size, c.peak_active
            ),
        );

        if let Some(MetricSummary::Counter { count, rate }) = self.metrics.get(names::HTTP_REQS) {
            line(&mut out, names::HTTP_REQS, format!("{} ({:.2}/s)", count, rate));
        }
        if let Some(rate) = self.rate(names::HTTP_REQ_FAILED) {
            line(&mut out, names::HTTP_REQ_FAILED, format!("{:.2}%", rate * 100.0));
        }
        if let Some(MetricSummary::Trend { avg, p95, p99, max, .. }) =
            self.metrics.get(names::HTTP_REQ_DURATION)
        {
            line(
                &mut out,
                names::HTTP_REQ_DURATION,
                format!("avg={:.1}ms p(95)={:.1}ms p(99)={:.1}ms max={:.1}ms", avg, p95, p99, max),
            );
        }
        if let Some(MetricSummary::Rate { rate, passes, fails }) = self.metrics.get(names::CHECKS) {
            line(
                &mut out,
                names::CHECKS,
                format!("{:.2}% ({} passed, {} failed)", rate * 100.0, passes, fails),
            );
        }
        for metric in ["checkout_success_rate", names::DEGRADATION_RATE] {
            if let Some(rate) = self.rate(metric) {
                line(&mut out, metric, format!("{:.2}%", rate * 100.0));
            }
        }

        if !self.checks.is_empty() {
            let _ = writeln!(out, "checks:");
            for (name, check) in &self.checks {
                let mark = if check.fails == 0 { "ok" } else { "FAILED" };
                let _ = writeln!(
                    out,
                    "  [{}] {} ({} passed, {} failed)",
                    mark, name, check.passes, check.fails
                );
            }
        }

        if !self.thresholds.is_empty() {
            let _ = writeln!(out, "thresholds:");
            for outcome in &self.thresholds {
                let mark = if outcome.passed { "ok" } else { "FAILED" };
                let observed = match (outcome.observed, &outcome.note) {
                    (Some(value), _) => format!("observed {:.4}", value),
                    (None, Some(note)) => note.clone(),
                    (None, None) => "no value".to_string(),
                };
                let abort = if outcome.abort_on_fail { " [abort]" } else { "" };
                let _ = writeln!(
                    out,
                    "  [{}] {} {}{} ({})",
                    mark, outcome.key, outcome.expression, abort, observed
                );
            }
        }

        out
    }
}

fn summarize(
    registry: &MetricsRegistry,
    thresholds: &[ThresholdSpec],
    elapsed: Duration,
) -> BTreeMap<String, MetricSummary> {
    let mut metrics = BTreeMap::new();
    for name in registry.metric_names() {
        if let Some(aggregate) = registry.aggregate(&name, &Tags::new()) {
            metrics.insert(name, MetricSummary::from_aggregate(&aggregate, elapsed));
        }
    }
    for threshold in thresholds.iter().filter(|t| !t.tags.is_empty()) {
        if let Some(aggregate) = registry.aggregate(&threshold.metric, &threshold.tags) {
            metrics.insert(
                threshold.key.clone(),
                MetricSummary::from_aggregate(&aggregate, elapsed),
            );
        }
    }
    metrics
}
