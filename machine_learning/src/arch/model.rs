use ndarray::{Array2, ArrayView2};

use crate::{
    Result, arch::loss::LossFn, optimization::Optimizer, privacy::Clipping, state::ModelState,
};

/// A trainable model whose parameters can be exported and imported as a `ModelState`.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Takes a snapshot of the model's current parameters.
    fn state(&self) -> ModelState;

    /// Replaces every parameter of the model with the ones in `state`.
    ///
    /// # Returns
    /// An error if `state` doesn't have exactly the model's keys and shapes.
    fn load_state(&mut self, state: &ModelState) -> Result<()>;

    /// Computes the model's output for a batch without modifying it.
    fn predict(&self, x: ArrayView2<f32>) -> Result<Array2<f32>>;

    /// Runs one pass over `batches`, updating the parameters after each batch.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer that dictates how to update the weights on each gradient calculation.
    /// * `loss_fn` - The loss function.
    /// * `clipping` - Bounds each gradient tensor before it's applied, if present.
    /// * `batches` - The batches of data as `(x, y)` pairs.
    ///
    /// # Returns
    /// The mean loss over the batches.
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
        I: Iterator<Item = (Array2<f32>, Array2<f32>)>;
}
