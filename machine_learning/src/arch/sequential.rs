use ndarray::{Array2, ArrayView2, Ix1, Ix2};
use rand::Rng;

use super::{Model, layers::Dense, loss::LossFn};
use crate::{
    MlErr, Result, optimization::Optimizer, privacy::Clipping, state::ModelState,
};

/// A sequential model: information flows forward when computing an output and backward when
/// computing the *deltas* of its layers.
#[derive(Debug, Clone)]
pub struct Sequential {
    layers: Vec<Dense>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Dense>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn layers(&self) -> &[Dense] {
        &self.layers
    }

    /// Randomly initializes every layer.
    pub fn init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        self.layers.iter_mut().try_for_each(|layer| layer.init(rng))
    }

    /// Makes a forward pass through the network, caching the metadata for `backprop`.
    ///
    /// # Arguments
    /// * `x` - The input data, one sample per row.
    ///
    /// # Returns
    /// The prediction for the given input or a `SizeMismatch` error if `x` has the wrong width.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(x)?;

        let mut layers = self.layers.iter_mut();
        let Some(first) = layers.next() else {
            return Ok(x.to_owned());
        };

        let mut y = first.forward(x);
        for layer in layers {
            y = layer.forward(y.view());
        }

        Ok(y)
    }

    fn check_input(&self, x: ArrayView2<f32>) -> Result<()> {
        let Some(first) = self.layers.first() else {
            return Ok(());
        };

        let expected = first.dim().0;
        if x.ncols() != expected {
            return Err(MlErr::SizeMismatch {
                what: "input features",
                got: x.ncols(),
                expected,
            });
        }

        Ok(())
    }

    fn weight_key(i: usize) -> String {
        format!("layers.{i}.weight")
    }

    fn bias_key(i: usize) -> String {
        format!("layers.{i}.bias")
    }
}

impl Model for Sequential {
    fn size(&self) -> usize {
        self.layers.iter().map(|layer| layer.size()).sum()
    }

    fn state(&self) -> ModelState {
        let mut state = ModelState::new();

        for (i, layer) in self.layers.iter().enumerate() {
            state.insert(Self::weight_key(i), layer.weights().to_owned().into_dyn());
            state.insert(Self::bias_key(i), layer.biases().to_owned().into_dyn());
        }

        state
    }

    fn load_state(&mut self, state: &ModelState) -> Result<()> {
        let expected = 2 * self.layers.len();
        if state.len() != expected {
            return Err(MlErr::SizeMismatch {
                what: "state tensors",
                got: state.len(),
                expected,
            });
        }

        for (i, layer) in self.layers.iter_mut().enumerate() {
            let (inputs, outputs) = layer.dim();
            let w_key = Self::weight_key(i);
            let b_key = Self::bias_key(i);

            let w = state
                .get(&w_key)
                .ok_or_else(|| MlErr::MissingParam { key: w_key.clone() })?;
            let b = state
                .get(&b_key)
                .ok_or_else(|| MlErr::MissingParam { key: b_key.clone() })?;

            let w = w
                .view()
                .into_dimensionality::<Ix2>()
                .map_err(|_| MlErr::ShapeMismatch {
                    key: w_key.clone(),
                    got: w.shape().to_vec(),
                    expected: vec![inputs, outputs],
                })?;
            let b = b
                .view()
                .into_dimensionality::<Ix1>()
                .map_err(|_| MlErr::ShapeMismatch {
                    key: b_key.clone(),
                    got: b.shape().to_vec(),
                    expected: vec![outputs],
                })?;

            if w.dim() != (inputs, outputs) {
                return Err(MlErr::ShapeMismatch {
                    key: w_key,
                    got: w.shape().to_vec(),
                    expected: vec![inputs, outputs],
                });
            }

            if b.len() != outputs {
                return Err(MlErr::ShapeMismatch {
                    key: b_key,
                    got: b.shape().to_vec(),
                    expected: vec![outputs],
                });
            }

            layer.load(w, b)?;
        }

        Ok(())
    }

    fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>> {
        self.check_input(x)?;

        let mut y = x.to_owned();
        for layer in &self.layers {
            y = layer.predict(y.view());
        }

        Ok(y)
    }

    // NOTE: the returned loss is the average of the per batch losses computed while the
    // parameters were still moving, not a fresh pass over the data.
    fn backprop<L, O, I>(
        &mut self,
        optimizer: &mut O,
        loss_fn: &L,
        clipping: Option<&Clipping>,
        batches: I,
    ) -> Result<f32>
    where
        L: LossFn,
        O: Optimizer,
        I: Iterator<Item = (Array2<f32>, Array2<f32>)>,
    {
        let mut total_loss = 0.0;
        let mut num_batches = 0;

        for (x, y) in batches {
            let y_pred = self.forward(x.view())?;

            if y_pred.dim() != y.dim() {
                return Err(MlErr::SizeMismatch {
                    what: "targets",
                    got: y.ncols(),
                    expected: y_pred.ncols(),
                });
            }

            total_loss += loss_fn.loss(y_pred.view(), y.view());
            num_batches += 1;

            let mut d = loss_fn.loss_prime(y_pred.view(), y.view());
            for layer in self.layers.iter_mut().rev() {
                d = layer.backward(d);
            }

            for layer in &mut self.layers {
                if let Some(clipping) = clipping {
                    layer.clip(clipping);
                }

                layer.step(optimizer);
            }
        }

        if num_batches == 0 {
            return Err(MlErr::SizeMismatch {
                what: "batches",
                got: 0,
                expected: 1,
            });
        }

        Ok(total_loss / num_batches as f32)
    }
}
