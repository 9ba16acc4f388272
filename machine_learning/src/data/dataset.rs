use std::num::NonZeroUsize;

use ndarray::{Array2, ArrayView2, Axis};

use crate::{MlErr, Result};

/// An in-memory labeled classification dataset.
///
/// Samples are the rows of `features`, each with a class label in `[0, classes)`.
#[derive(Debug, Clone)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Vec<usize>,
    classes: usize,
}

impl Dataset {
    /// Creates a new dataset from owned buffers.
    ///
    /// # Arguments
    /// * `features` - One sample per row.
    /// * `labels` - The class of each sample.
    /// * `classes` - The amount of classes.
    ///
    /// # Returns
    /// A new `Dataset` or an error if the buffers disagree or a label is out of range.
    pub fn new(features: Array2<f32>, labels: Vec<usize>, classes: usize) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "dataset labels",
                got: labels.len(),
                expected: features.nrows(),
            });
        }

        if let Some(&label) = labels.iter().find(|&&l| l >= classes) {
            return Err(MlErr::InvalidConfig(format!(
                "label {label} is out of range for {classes} classes"
            )));
        }

        Ok(Self {
            features,
            labels,
            classes,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    #[inline]
    pub fn nfeatures(&self) -> usize {
        self.features.ncols()
    }

    #[inline]
    pub fn classes(&self) -> usize {
        self.classes
    }

    pub fn features(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    /// Gathers the samples at `idxs` into a batch.
    ///
    /// # Returns
    /// The features and the one-hot encoded labels, one row per index.
    pub fn batch(&self, idxs: &[usize]) -> (Array2<f32>, Array2<f32>) {
        let x = self.features.select(Axis(0), idxs);
        let mut y = Array2::zeros((idxs.len(), self.classes));

        for (row, &idx) in idxs.iter().enumerate() {
            y[[row, self.labels[idx]]] = 1.;
        }

        (x, y)
    }

    /// Splits `idxs` in consecutive batches of at most `batch_size` samples.
    pub fn batches<'a>(
        &'a self,
        idxs: &'a [usize],
        batch_size: NonZeroUsize,
    ) -> impl Iterator<Item = (Array2<f32>, Array2<f32>)> + 'a {
        idxs.chunks(batch_size.get())
            .map(move |chunk| self.batch(chunk))
    }

    /// Keeps only the samples at `idxs`, in that order.
    pub fn subset(&self, idxs: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), idxs),
            labels: idxs.iter().map(|&i| self.labels[i]).collect(),
            classes: self.classes,
        }
    }
}
