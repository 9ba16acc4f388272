use ndarray::{Array, Dimension};
use rand::Rng;
use rand_distr::{Distribution, Exp, Normal};

use crate::{MlErr, Result};

/// The norm used to bound a gradient tensor before it's applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipNorm {
    L1,
    L2,
}

/// Bounds the norm of gradient tensors, scaling down only those above `bound`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Clipping {
    norm: ClipNorm,
    bound: f32,
}

impl Clipping {
    /// Creates a new `Clipping`.
    ///
    /// # Arguments
    /// * `norm` - The norm to measure the gradients with.
    /// * `bound` - The maximum norm a gradient tensor may have after clipping.
    ///
    /// # Returns
    /// A new `Clipping` instance.
    pub fn new(norm: ClipNorm, bound: f32) -> Self {
        Self { norm, bound }
    }

    pub fn norm(&self) -> ClipNorm {
        self.norm
    }

    pub fn bound(&self) -> f32 {
        self.bound
    }

    /// Applies `g <- g / max(1, |g| / bound)` to the whole tensor.
    ///
    /// # Arguments
    /// * `grad` - The gradient tensor to clip in place.
    pub fn apply<D: Dimension>(&self, grad: &mut Array<f32, D>) {
        let norm = match self.norm {
            ClipNorm::L1 => grad.iter().map(|g| g.abs()).sum::<f32>(),
            ClipNorm::L2 => grad.iter().map(|g| g * g).sum::<f32>().sqrt(),
        };

        let factor = norm / self.bound;
        if factor > 1. {
            grad.mapv_inplace(|g| g / factor);
        }
    }
}

/// The mechanism used to make a client's update differentially private.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoiseMechanism {
    NoDp,
    Gaussian,
    Laplace,
}
use NoiseMechanism::*;

impl NoiseMechanism {
    /// Whether this mechanism clips gradients and perturbs the parameters at all.
    pub fn is_active(self) -> bool {
        !matches!(self, NoDp)
    }

    /// The norm this mechanism's sensitivity analysis is stated in.
    pub fn clip_norm(self) -> Option<ClipNorm> {
        match self {
            NoDp => None,
            Gaussian => Some(ClipNorm::L2),
            Laplace => Some(ClipNorm::L1),
        }
    }

    /// Computes the scale of the noise distribution: the standard deviation for the gaussian
    /// mechanism and the diversity `b` for the laplace one.
    ///
    /// # Arguments
    /// * `sensitivity` - The sensitivity of the released parameters.
    /// * `epsilon` - The per round epsilon.
    /// * `delta` - The per round delta, only used by the gaussian mechanism.
    ///
    /// # Returns
    /// The noise scale, `0` when the mechanism is inactive.
    pub fn noise_scale(self, sensitivity: f64, epsilon: f64, delta: f64) -> f64 {
        match self {
            NoDp => 0.,
            Laplace => sensitivity / epsilon,
            Gaussian => sensitivity * (2. * (1.25 / delta).ln()).sqrt() / epsilon,
        }
    }

    /// Adds independent noise of the given scale to every element of `params`.
    ///
    /// # Arguments
    /// * `params` - The parameter tensor to perturb in place.
    /// * `scale` - The scale returned by `noise_scale`.
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    /// An `InvalidConfig` error if `scale` can't parametrize the distribution.
    pub fn perturb<D, R>(self, params: &mut Array<f32, D>, scale: f64, rng: &mut R) -> Result<()>
    where
        D: Dimension,
        R: Rng + ?Sized,
    {
        if !self.is_active() || scale == 0. {
            return Ok(());
        }

        match self {
            Gaussian => {
                let normal = Normal::new(0., scale)
                    .map_err(|e| MlErr::InvalidConfig(format!("gaussian noise: {e}")))?;
                params.mapv_inplace(|w| w + normal.sample(rng) as f32);
            }
            Laplace => {
                // The difference of two iid exponentials is laplace distributed.
                let exp = Exp::new(1. / scale)
                    .map_err(|e| MlErr::InvalidConfig(format!("laplace noise: {e}")))?;
                params.mapv_inplace(|w| w + (exp.sample(rng) - exp.sample(rng)) as f32);
            }
            NoDp => {}
        }

        Ok(())
    }
}
