use super::{Clipping, NoiseMechanism};
use crate::{MlErr, Result};

/// Splits a total privacy budget evenly over the rounds a client is expected to take part in.
///
/// A client participates in `participation * rounds` rounds on expectation, so each of its
/// contributions may spend `total / (participation * rounds)`.
///
/// # Arguments
/// * `total` - The total epsilon for the whole run.
/// * `participation` - The fraction of clients selected each round, in `(0, 1]`.
/// * `rounds` - The total amount of rounds.
///
/// # Returns
/// The per round epsilon, a `BudgetExhausted` error if `total` isn't positive or an
/// `InvalidConfig` error for an out of range participation or zero rounds.
pub fn per_round_epsilon(total: f64, participation: f64, rounds: usize) -> Result<f64> {
    if !(total > 0.) || !total.is_finite() {
        return Err(MlErr::BudgetExhausted { epsilon: total });
    }

    if !(participation > 0. && participation <= 1.) {
        return Err(MlErr::InvalidConfig(format!(
            "participation must be in (0, 1], got {participation}"
        )));
    }

    if rounds == 0 {
        return Err(MlErr::InvalidConfig("rounds must be positive".into()));
    }

    Ok(total / (participation * rounds as f64))
}

/// The differential privacy parameters every local training call must honor.
///
/// Computed once at startup and handed unchanged to each client.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrivacyBudget {
    epsilon: f64,
    delta: f64,
    clip: f32,
    mechanism: NoiseMechanism,
}

impl PrivacyBudget {
    /// Creates a new `PrivacyBudget` from already split per round values.
    ///
    /// # Arguments
    /// * `epsilon` - The per round epsilon.
    /// * `delta` - The per round delta.
    /// * `clip` - The gradient clipping bound.
    /// * `mechanism` - The noise mechanism.
    ///
    /// # Returns
    /// A new `PrivacyBudget` instance.
    pub fn new(epsilon: f64, delta: f64, clip: f32, mechanism: NoiseMechanism) -> Self {
        Self {
            epsilon,
            delta,
            clip,
            mechanism,
        }
    }

    /// Creates a new `PrivacyBudget` by pre-allocating `total_epsilon` across the run.
    ///
    /// # Arguments
    /// * `total_epsilon` - The epsilon for the whole run.
    /// * `participation` - The fraction of clients selected each round.
    /// * `rounds` - The total amount of rounds.
    /// * `delta` - The per round delta.
    /// * `clip` - The gradient clipping bound.
    /// * `mechanism` - The noise mechanism.
    ///
    /// # Returns
    /// A validated `PrivacyBudget` or the first configuration error found.
    pub fn allocate(
        total_epsilon: f64,
        participation: f64,
        rounds: usize,
        delta: f64,
        clip: f32,
        mechanism: NoiseMechanism,
    ) -> Result<Self> {
        let epsilon = per_round_epsilon(total_epsilon, participation, rounds)?;
        let budget = Self::new(epsilon, delta, clip, mechanism);
        budget.validate()?;
        Ok(budget)
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn clip(&self) -> f32 {
        self.clip
    }

    pub fn mechanism(&self) -> NoiseMechanism {
        self.mechanism
    }

    /// Checks the budget can actually be spent.
    ///
    /// # Returns
    /// `BudgetExhausted` if epsilon isn't positive, `InvalidConfig` if the clipping bound or
    /// delta can't parametrize the active mechanism.
    pub fn validate(&self) -> Result<()> {
        if !(self.epsilon > 0.) || !self.epsilon.is_finite() {
            return Err(MlErr::BudgetExhausted {
                epsilon: self.epsilon,
            });
        }

        if self.mechanism.is_active() && !(self.clip > 0.) {
            return Err(MlErr::InvalidConfig(format!(
                "clipping bound must be positive, got {}",
                self.clip
            )));
        }

        if self.mechanism == NoiseMechanism::Gaussian && !(self.delta > 0. && self.delta < 1.) {
            return Err(MlErr::InvalidConfig(format!(
                "gaussian mechanism needs delta in (0, 1), got {}",
                self.delta
            )));
        }

        Ok(())
    }

    /// The gradient clipping the mechanism requires, if any.
    pub fn clipping(&self) -> Option<Clipping> {
        self.mechanism
            .clip_norm()
            .map(|norm| Clipping::new(norm, self.clip))
    }

    /// The sensitivity of a model trained with clipped gradients over a shard of `shard_len`
    /// samples, `2 * lr * clip / shard_len`.
    pub fn sensitivity(&self, learning_rate: f32, shard_len: usize) -> f64 {
        2. * learning_rate as f64 * self.clip as f64 / shard_len.max(1) as f64
    }

    /// The scale of the noise to add for a shard of `shard_len` samples.
    pub fn noise_scale(&self, learning_rate: f32, shard_len: usize) -> f64 {
        let sensitivity = self.sensitivity(learning_rate, shard_len);
        self.mechanism
            .noise_scale(sensitivity, self.epsilon, self.delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_round_epsilon_scales_with_participation_and_rounds() {
        let eps = per_round_epsilon(1.0, 0.1, 1000).unwrap();
        assert!((eps - 0.01).abs() < 1e-12);

        let eps = per_round_epsilon(20.0, 0.5, 10).unwrap();
        assert!((eps - 4.0).abs() < 1e-12);
    }

    #[test]
    fn allocation_spends_exactly_the_total() {
        let budget =
            PrivacyBudget::allocate(8.0, 0.25, 40, 1e-5, 1.0, NoiseMechanism::Gaussian).unwrap();
        let spent = budget.epsilon() * 0.25 * 40.;
        assert!((spent - 8.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_epsilon_is_exhausted() {
        assert_eq!(
            per_round_epsilon(0.0, 0.1, 10).unwrap_err(),
            MlErr::BudgetExhausted { epsilon: 0.0 }
        );

        let budget = PrivacyBudget::new(-1.0, 1e-5, 1.0, NoiseMechanism::Laplace);
        assert!(matches!(
            budget.validate(),
            Err(MlErr::BudgetExhausted { .. })
        ));
    }

    #[test]
    fn invalid_participation_is_a_config_error() {
        assert!(matches!(
            per_round_epsilon(1.0, 0.0, 10),
            Err(MlErr::InvalidConfig(_))
        ));
        assert!(matches!(
            per_round_epsilon(1.0, 1.5, 10),
            Err(MlErr::InvalidConfig(_))
        ));
    }

    #[test]
    fn gaussian_needs_a_proper_delta() {
        let budget = PrivacyBudget::new(1.0, 0.0, 1.0, NoiseMechanism::Gaussian);
        assert!(matches!(budget.validate(), Err(MlErr::InvalidConfig(_))));

        let budget = PrivacyBudget::new(1.0, 0.0, 1.0, NoiseMechanism::Laplace);
        assert!(budget.validate().is_ok());
    }

    #[test]
    fn sensitivity_shrinks_with_shard_size() {
        let budget = PrivacyBudget::new(1.0, 1e-5, 2.0, NoiseMechanism::Laplace);

        assert!((budget.sensitivity(0.1, 10) - 0.04).abs() < 1e-9);
        assert!((budget.noise_scale(0.1, 10) - 0.04).abs() < 1e-9);
        assert!(budget.sensitivity(0.1, 100) < budget.sensitivity(0.1, 10));
    }

    #[test]
    fn clipping_follows_the_mechanism() {
        let none = PrivacyBudget::new(1.0, 1e-5, 1.0, NoiseMechanism::NoDp);
        assert!(none.clipping().is_none());

        let laplace = PrivacyBudget::new(1.0, 1e-5, 1.0, NoiseMechanism::Laplace);
        assert_eq!(laplace.clipping().unwrap().norm(), super::super::ClipNorm::L1);
    }
}
