use ndarray::Array2;
use rand::{Rng, seq::SliceRandom};
use rand_distr::{Distribution, Normal};

use super::Dataset;
use crate::{MlErr, Result};

/// Shape of a synthetic gaussian blobs classification problem.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobSpec {
    pub samples: usize,
    pub features: usize,
    pub classes: usize,
    /// Standard deviation of every sample around its class centre.
    pub spread: f32,
}

/// Generates one gaussian blob per class.
///
/// Class centres are drawn from a standard normal in every dimension and samples are
/// assigned to classes round robin, so classes are balanced.
///
/// # Arguments
/// * `spec` - The shape of the problem.
/// * `rng` - The source of randomness.
///
/// # Returns
/// A new `Dataset` or an `InvalidConfig` error for an empty problem or a bad spread.
pub fn blobs<R: Rng + ?Sized>(spec: &BlobSpec, rng: &mut R) -> Result<Dataset> {
    let BlobSpec {
        samples,
        features,
        classes,
        spread,
    } = *spec;

    if samples == 0 || features == 0 || classes == 0 {
        return Err(MlErr::InvalidConfig(format!(
            "synthetic dataset needs samples, features and classes, got {samples}, {features} and {classes}"
        )));
    }

    let unit = Normal::new(0f32, 1.).map_err(|e| MlErr::InvalidConfig(e.to_string()))?;
    let noise = Normal::new(0f32, spread)
        .map_err(|e| MlErr::InvalidConfig(format!("invalid spread {spread}: {e}")))?;

    let centres = Array2::from_shape_fn((classes, features), |_| unit.sample(rng));
    let labels: Vec<usize> = (0..samples).map(|i| i % classes).collect();
    let data = Array2::from_shape_fn((samples, features), |(i, j)| {
        centres[[labels[i], j]] + noise.sample(rng)
    });

    Dataset::new(data, labels, classes)
}

/// Randomly holds out a `test_fraction` of `dataset`.
///
/// # Returns
/// The `(train, test)` pair, or an `InvalidConfig` error if either side would be empty.
pub fn train_test_split<R: Rng + ?Sized>(
    dataset: &Dataset,
    test_fraction: f64,
    rng: &mut R,
) -> Result<(Dataset, Dataset)> {
    let ntest = (dataset.len() as f64 * test_fraction).round() as usize;

    if !(test_fraction > 0. && test_fraction < 1.) || ntest == 0 || ntest >= dataset.len() {
        return Err(MlErr::InvalidConfig(format!(
            "test fraction {test_fraction} leaves an empty side out of {} samples",
            dataset.len()
        )));
    }

    let mut idxs: Vec<usize> = (0..dataset.len()).collect();
    idxs.shuffle(rng);
    let (test, train) = idxs.split_at(ntest);

    Ok((dataset.subset(train), dataset.subset(test)))
}
