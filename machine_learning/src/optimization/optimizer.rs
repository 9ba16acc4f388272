use ndarray::{Array, Dimension};

/// An optimization algorithm that moves a parameter tensor given its gradient.
pub trait Optimizer {
    /// Updates `params` in place according to the algorithm's learning rule.
    ///
    /// # Arguments
    /// * `params` - The parameters that are going to be modified.
    /// * `grad` - The gradient of the loss with respect to `params`, same shape.
    fn update_params<D: Dimension>(&mut self, params: &mut Array<f32, D>, grad: &Array<f32, D>);
}
