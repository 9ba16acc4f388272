use log::debug;
use machine_learning::ModelState;
use rayon::prelude::*;

use crate::{
    AggregationErr, Aggregator, Contribution, Result, accumulator::ParamAccumulator,
};

/// How much each contribution counts towards the mean.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Weighting {
    /// Every contribution counts the same regardless of shard size or staleness.
    #[default]
    Uniform,
    /// A contribution with staleness `s` is weighted `(1 + s)^-exponent` before normalising.
    StalenessDiscounted { exponent: f64 },
}

/// Federated averaging: the parameter-wise weighted mean of the cohort's states.
///
/// Each parameter tensor is reduced in its own rayon task, contributions are always folded
/// in the given order so the output doesn't depend on thread scheduling.
#[derive(Debug, Clone, Copy, Default)]
pub struct FedAvg {
    weighting: Weighting,
}

impl FedAvg {
    /// Creates a new unweighted `FedAvg`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new `FedAvg` that discounts stale contributions.
    ///
    /// # Arguments
    /// * `exponent` - How fast the weight decays with staleness, `0` behaves like `new`.
    ///
    /// # Returns
    /// A new `FedAvg` or `InvalidWeights` if `exponent` is negative or not finite.
    pub fn staleness_discounted(exponent: f64) -> Result<Self> {
        if !(exponent >= 0.) || !exponent.is_finite() {
            return Err(AggregationErr::InvalidWeights);
        }

        Ok(Self {
            weighting: Weighting::StalenessDiscounted { exponent },
        })
    }

    pub fn weighting(&self) -> Weighting {
        self.weighting
    }

    /// Computes the normalised weight of every contribution.
    fn weights(&self, contributions: &[Contribution<'_>]) -> Result<Vec<f32>> {
        let raw: Vec<f64> = match self.weighting {
            Weighting::Uniform => vec![1.; contributions.len()],
            Weighting::StalenessDiscounted { exponent } => contributions
                .iter()
                .map(|c| (1. + c.staleness as f64).powf(-exponent))
                .collect(),
        };

        let total: f64 = raw.iter().sum();
        if !(total > 0.) || !total.is_finite() {
            return Err(AggregationErr::InvalidWeights);
        }

        Ok(raw.into_iter().map(|w| (w / total) as f32).collect())
    }
}

impl Aggregator for FedAvg {
    fn aggregate(&self, contributions: &[Contribution<'_>]) -> Result<ModelState> {
        let first = contributions.first().ok_or(AggregationErr::Empty)?.state;

        // Missing keys and bad shapes are caught while accumulating, extra keys aren't.
        for contribution in contributions {
            if let Some(key) = contribution.state.keys().find(|k| first.get(k).is_none()) {
                return Err(AggregationErr::ShapeMismatch {
                    key: key.to_string(),
                });
            }
        }

        let weights = self.weights(contributions)?;
        let mut accumulators: Vec<_> = first
            .iter()
            .map(|(key, tensor)| ParamAccumulator::new(key, tensor))
            .collect();

        accumulators.par_iter_mut().try_for_each(|acc| {
            contributions
                .iter()
                .zip(&weights)
                .try_for_each(|(contribution, &weight)| acc.accumulate(contribution.state, weight))
        })?;

        debug!(contributions = contributions.len(), tensors = accumulators.len(); "aggregated cohort");

        Ok(accumulators.into_iter().map(ParamAccumulator::finish).collect())
    }
}
