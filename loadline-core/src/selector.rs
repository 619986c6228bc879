//! Weighted journey selection

use rand::Rng;

use crate::error::{EngineError, EngineResult};
use crate::journey::{Journey, JourneyCatalog};

/// Picks a journey index with probability `weight / total`.
///
/// Cumulative weights are precomputed once; each selection draws a single
/// uniform value and binary-searches it.
#[derive(Debug, Clone)]
pub struct WeightedSelector {
    cumulative: Vec<f64>,
    total: f64,
    last_positive: usize,
}

impl WeightedSelector {
    /// Create a selector for a catalog
    pub fn new(catalog: &JourneyCatalog) -> EngineResult<Self> {
        let weights: Vec<f64> = catalog.journeys().iter().map(|j| j.weight).collect();
        Self::from_weights(&weights)
    }

    /// Create a selector from raw weights
    pub fn from_weights(weights: &[f64]) -> EngineResult<Self> {
        if weights.is_empty() {
            return Err(EngineError::InvalidCatalog("no weights to select from".to_string()));
        }

        let mut cumulative = Vec::with_capacity(weights.len());
        let mut total = 0.0;
        let mut last_positive = 0;
        for (index, weight) in weights.iter().enumerate() {
            if !weight.is_finite() || *weight < 0.0 {
                return Err(EngineError::InvalidCatalog(format!(
                    "weight {} at position {} is not a non-negative number",
                    weight, index
                )));
            }
            if *weight > 0.0 {
                last_positive = index;
            }
            total += weight;
            cumulative.push(total);
        }

        if total <= 0.0 {
            return Err(EngineError::InvalidCatalog(
                "weights must sum to a positive total".to_string(),
            ));
        }

        Ok(Self {
            cumulative,
            total,
            last_positive,
        })
    }

    /// Draw one index
    pub fn select_index<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let point = rng.random::<f64>() * self.total;
        let index = self.cumulative.partition_point(|&edge| edge <= point);
        // Rounding can push the draw onto the final edge
        index.min(self.last_positive)
    }

    /// Draw one journey from `catalog` (the catalog this selector was built for)
    pub fn select<'a, R: Rng + ?Sized>(&self, catalog: &'a JourneyCatalog, rng: &mut R) -> &'a Journey {
        &catalog.journeys()[self.select_index(rng)]
    }

    /// Selection probability of each index
    pub fn probabilities(&self) -> Vec<f64> {
        let mut previous = 0.0;
        self.cumulative
            .iter()
            .map(|edge| {
                let p = (edge - previous) / self.total;
                previous = *edge;
                p
            })
            .collect()
    }
}

/// Select a journey from `catalog` in one call
pub fn select_journey<'a, R: Rng + ?Sized>(
    catalog: &'a JourneyCatalog,
    rng: &mut R,
) -> EngineResult<&'a Journey> {
    Ok(WeightedSelector::new(catalog)?.select(catalog, rng))
}
