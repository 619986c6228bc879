//! Counter, rate and trend aggregates

use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};

/// Trend values are stored in the histogram at this resolution (1 unit = 1/1000)
const TREND_SCALE: f64 = 1000.0;

/// Significant figures kept by trend histograms
const TREND_SIGFIG: u8 = 3;

/// Metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    /// Sum of values
    Counter,
    /// Fraction of non-zero observations
    Rate,
    /// Distribution of values
    Trend,
}

impl std::fmt::Display for MetricKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MetricKind::Counter => write!(f, "counter"),
            MetricKind::Rate => write!(f, "rate"),
            MetricKind::Trend => write!(f, "trend"),
        }
    }
}

/// Aggregated state of one metric series.
///
/// Merging is commutative and associative, so the order in which
/// concurrent iterations report has no effect on the final value.
#[derive(Debug, Clone)]
pub enum Aggregate {
    Counter(CounterAggregate),
    Rate(RateAggregate),
    Trend(TrendAggregate),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CounterAggregate {
    pub sum: f64,
    pub samples: u64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateAggregate {
    pub trues: u64,
    pub total: u64,
}

/// Trend aggregate backed by an HDR histogram, with exact sum/min/max
#[derive(Debug, Clone, Default)]
pub struct TrendAggregate {
    histogram: Option<Histogram<u64>>,
    count: u64,
    sum: f64,
    min: f64,
    max: f64,
}

impl Aggregate {
    /// Create an empty aggregate of the given kind
    pub fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Aggregate::Counter(CounterAggregate::default()),
            MetricKind::Rate => Aggregate::Rate(RateAggregate::default()),
            MetricKind::Trend => Aggregate::Trend(TrendAggregate::default()),
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            Aggregate::Counter(_) => MetricKind::Counter,
            Aggregate::Rate(_) => MetricKind::Rate,
            Aggregate::Trend(_) => MetricKind::Trend,
        }
    }

    /// Fold one observation in
    pub fn observe(&mut self, value: f64) {
        match self {
            Aggregate::Counter(counter) => {
                counter.sum += value;
                counter.samples += 1;
            }
            Aggregate::Rate(rate) => {
                rate.total += 1;
                if value != 0.0 {
                    rate.trues += 1;
                }
            }
            Aggregate::Trend(trend) => trend.observe(value),
        }
    }

    /// Merge another aggregate of the same kind into this one.
    /// Returns false (and changes nothing) on a kind mismatch.
    pub fn merge(&mut self, other: &Aggregate) -> bool {
        match (self, other) {
            (Aggregate::Counter(a), Aggregate::Counter(b)) => {
                a.sum += b.sum;
                a.samples += b.samples;
                true
            }
            (Aggregate::Rate(a), Aggregate::Rate(b)) => {
                a.trues += b.trues;
                a.total += b.total;
                true
            }
            (Aggregate::Trend(a), Aggregate::Trend(b)) => {
                a.merge(b);
                true
            }
            _ => false,
        }
    }

    /// Number of observations folded in
    pub fn samples(&self) -> u64 {
        match self {
            Aggregate::Counter(counter) => counter.samples,
            Aggregate::Rate(rate) => rate.total,
            Aggregate::Trend(trend) => trend.count,
        }
    }
}

impl RateAggregate {
    pub fn falses(&self) -> u64 {
        self.total - self.trues
    }

    /// Fraction of true observations; `None` without samples
    pub fn rate(&self) -> Option<f64> {
        if self.total == 0 {
            None
        } else {
            Some(self.trues as f64 / self.total as f64)
        }
    }
}

impl TrendAggregate {
    fn observe(&mut self, value: f64) {
        if !value.is_finite() {
            return;
        }
        if self.count == 0 {
            self.min = value;
            self.max = value;
        } else {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
        }
        self.count += 1;
        self.sum += value;

        if self.histogram.is_none() {
            self.histogram = Histogram::new(TREND_SIGFIG).ok();
        }
        if let Some(histogram) = self.histogram.as_mut() {
            let scaled = (value.max(0.0) * TREND_SCALE).round() as u64;
            let _ = histogram.record(scaled);
        }
    }

    fn merge(&mut self, other: &TrendAggregate) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count += other.count;
        self.sum += other.sum;

        match (self.histogram.as_mut(), other.histogram.as_ref()) {
            (Some(mine), Some(theirs)) => {
                let _ = mine.add(theirs);
            }
            (None, Some(theirs)) => self.histogram = Some(theirs.clone()),
            _ => {}
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn avg(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn min(&self) -> Option<f64> {
        (self.count > 0).then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        (self.count > 0).then_some(self.max)
    }

    /// Value at `percentile` (0-100), accurate to three significant figures
    pub fn percentile(&self, percentile: f64) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        let histogram = self.histogram.as_ref()?;
        let value = histogram.value_at_percentile(percentile.clamp(0.0, 100.0)) as f64 / TREND_SCALE;
        // The histogram reports bucket edges; keep them inside the exact range
        Some(value.clamp(self.min, self.max))
    }

    pub fn median(&self) -> Option<f64> {
        self.percentile(50.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trend_of(values: &[f64]) -> TrendAggregate {
        let mut aggregate = Aggregate::empty(MetricKind::Trend);
        for value in values {
            aggregate.observe(*value);
        }
        match aggregate {
            Aggregate::Trend(trend) => trend,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_rate_fraction() {
        let mut aggregate = Aggregate::empty(MetricKind::Rate);
        for value in [1.0, 0.0, 1.0, 1.0] {
            aggregate.observe(value);
        }
        let Aggregate::Rate(rate) = aggregate else { panic!("expected rate") };
        assert_eq!(rate.rate(), Some(0.75));
        assert_eq!(rate.falses(), 1);
    }

    #[test]
    fn test_trend_statistics() {
        let values: Vec<f64> = (1..=100).map(f64::from).collect();
        let trend = trend_of(&values);

        assert_eq!(trend.count(), 100);
        assert_eq!(trend.avg(), Some(50.5));
        assert_eq!(trend.min(), Some(1.0));
        assert_eq!(trend.max(), Some(100.0));

        let p95 = trend.percentile(95.0).unwrap();
        assert!((p95 - 95.0).abs() < 0.1, "p95 was {}", p95);
        let median = trend.median().unwrap();
        assert!((median - 50.0).abs() < 0.1, "median was {}", median);
    }

    #[test]
    fn test_merge_is_order_independent() {
        let mut left = Aggregate::Trend(trend_of(&[1.0, 2.0, 3.0]));
        let right = Aggregate::Trend(trend_of(&[10.0, 20.0]));
        let mut reversed = right.clone();

        assert!(left.merge(&right));
        assert!(reversed.merge(&Aggregate::Trend(trend_of(&[1.0, 2.0, 3.0]))));

        let (Aggregate::Trend(a), Aggregate::Trend(b)) = (&left, &reversed) else {
            panic!("expected trends")
        };
        assert_eq!(a.count(), b.count());
        assert_eq!(a.avg(), b.avg());
        assert_eq!(a.max(), Some(20.0));
        assert_eq!(a.percentile(99.0), b.percentile(99.0));
    }

    #[test]
    fn test_kind_mismatch_does_not_merge() {
        let mut counter = Aggregate::empty(MetricKind::Counter);
        counter.observe(2.0);
        assert!(!counter.merge(&Aggregate::empty(MetricKind::Rate)));
        assert_eq!(counter.samples(), 1);
    }

    #[test]
    fn test_empty_trend_has_no_statistics() {
        let trend = TrendAggregate::default();
        assert_eq!(trend.avg(), None);
        assert_eq!(trend.percentile(95.0), None);
    }
}
