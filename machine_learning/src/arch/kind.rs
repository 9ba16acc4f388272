use rand::Rng;

use super::{Sequential, activations::ActFn, layers::Dense};
use crate::{MlErr, Result};

/// The closed set of architectures a simulation can train.
#[derive(Debug, Clone, Copy)]
pub enum ModelKind {
    /// Multinomial logistic regression, a single dense layer over the raw features.
    Logistic,
    /// A perceptron with one hidden layer.
    Mlp { hidden: usize, act_fn: ActFn },
}

impl ModelKind {
    /// Builds and randomly initializes the architecture for the given problem size.
    ///
    /// # Arguments
    /// * `features` - The amount of input features.
    /// * `classes` - The amount of output classes, one logit each.
    /// * `rng` - The random number generator used for the initial parameters.
    ///
    /// # Returns
    /// A new `Sequential` or an `InvalidConfig` error for degenerate sizes.
    pub fn build<R: Rng + ?Sized>(
        &self,
        features: usize,
        classes: usize,
        rng: &mut R,
    ) -> Result<Sequential> {
        if features == 0 || classes < 2 {
            return Err(MlErr::InvalidConfig(format!(
                "a model needs at least one feature and two classes, got {features} and {classes}"
            )));
        }

        let mut model = match *self {
            ModelKind::Logistic => Sequential::new([Dense::new((features, classes), None)]),
            ModelKind::Mlp { hidden, act_fn } => {
                if hidden == 0 {
                    return Err(MlErr::InvalidConfig("hidden layer can't be empty".into()));
                }

                Sequential::new([
                    Dense::new((features, hidden), Some(act_fn)),
                    Dense::new((hidden, classes), None),
                ])
            }
        };

        model.init(rng)?;
        Ok(model)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::Logistic => "logistic",
            ModelKind::Mlp { .. } => "mlp",
        }
    }
}
