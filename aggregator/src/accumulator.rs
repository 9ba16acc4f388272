use machine_learning::ModelState;
use ndarray::ArrayD;

use crate::{AggregationErr, Result};

/// A running weighted sum for a single named parameter tensor.
#[derive(Debug)]
pub(crate) struct ParamAccumulator {
    key: String,
    sum: ArrayD<f32>,
}

impl ParamAccumulator {
    /// Creates a new zeroed `ParamAccumulator` with the shape of `like`.
    pub fn new(key: &str, like: &ArrayD<f32>) -> Self {
        Self {
            key: key.to_string(),
            sum: ArrayD::zeros(like.raw_dim()),
        }
    }

    /// Adds `weight * state[key]` into the sum.
    ///
    /// # Arguments
    /// * `state` - The contribution to take this accumulator's tensor from.
    /// * `weight` - The normalised weight of the contribution.
    ///
    /// # Returns
    /// A `ShapeMismatch` error if `state` lacks the key or its tensor has another shape.
    pub fn accumulate(&mut self, state: &ModelState, weight: f32) -> Result<()> {
        let tensor = state
            .get(&self.key)
            .filter(|t| t.shape() == self.sum.shape())
            .ok_or_else(|| AggregationErr::ShapeMismatch {
                key: self.key.clone(),
            })?;

        self.sum.scaled_add(weight, tensor);
        Ok(())
    }

    pub fn finish(self) -> (String, ArrayD<f32>) {
        (self.key, self.sum)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::IxDyn;

    use super::*;

    #[test]
    fn test_accumulates_weighted_sum() {
        let mut state = ModelState::new();
        state.insert("w", ArrayD::from_elem(IxDyn(&[3]), 2.));

        let mut acc = ParamAccumulator::new("w", state.get("w").unwrap());
        acc.accumulate(&state, 0.25).unwrap();
        acc.accumulate(&state, 0.5).unwrap();

        let (key, sum) = acc.finish();
        assert_eq!(key, "w");
        assert_eq!(sum, ArrayD::from_elem(IxDyn(&[3]), 1.5));
    }

    #[test]
    fn test_rejects_other_shapes() {
        let mut state = ModelState::new();
        state.insert("w", ArrayD::zeros(IxDyn(&[3])));
        let mut acc = ParamAccumulator::new("w", state.get("w").unwrap());

        let mut other = ModelState::new();
        other.insert("w", ArrayD::zeros(IxDyn(&[2, 2])));

        assert_eq!(
            acc.accumulate(&other, 1.).unwrap_err(),
            AggregationErr::ShapeMismatch { key: "w".into() }
        );
    }
}
