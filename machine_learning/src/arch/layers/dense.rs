use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{
    MlErr, Result,
    arch::activations::ActFn,
    optimization::Optimizer,
    privacy::Clipping,
};

/// A fully connected layer computing `act_fn(x · w + b)`.
///
/// The weights have shape `(inputs, outputs)` so a batch with one sample per row
/// can be multiplied from the left.
#[derive(Debug, Clone)]
pub struct Dense {
    w: Array2<f32>,
    b: Array1<f32>,
    act_fn: Option<ActFn>,

    // Forward metadata
    x: Array2<f32>,
    z: Array2<f32>,

    // Backward metadata
    dw: Array2<f32>,
    db: Array1<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer with every parameter set to zero.
    ///
    /// # Arguments
    /// * `dim` - The amount of inputs and outputs of the layer.
    /// * `act_fn` - An optional activation function.
    ///
    /// # Returns
    /// A new `Dense` instance.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            w: Array2::zeros(dim),
            b: Array1::zeros(dim.1),
            act_fn,
            x: Array2::zeros((0, dim.0)),
            z: Array2::zeros((0, dim.1)),
            dw: Array2::zeros(dim),
            db: Array1::zeros(dim.1),
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.w.dim()
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.w.len() + self.b.len()
    }

    pub fn weights(&self) -> ArrayView2<'_, f32> {
        self.w.view()
    }

    pub fn biases(&self) -> ArrayView1<'_, f32> {
        self.b.view()
    }

    /// Draws the weights with Xavier uniform initialization and zeroes the biases.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    ///
    /// # Returns
    /// An `InvalidConfig` error if the layer has no inputs nor outputs.
    pub fn init<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        let (fan_in, fan_out) = self.dim();
        let range = (6. / (fan_in + fan_out) as f32).sqrt();
        let uniform = Uniform::new(-range, range)
            .map_err(|e| MlErr::InvalidConfig(format!("dense init: {e}")))?;

        self.w.mapv_inplace(|_| uniform.sample(rng));
        self.b.fill(0.);
        Ok(())
    }

    /// Overwrites this layer's parameters.
    ///
    /// # Returns
    /// A `SizeMismatch` error if any of the shapes doesn't match the layer's.
    pub fn load(&mut self, w: ArrayView2<f32>, b: ArrayView1<f32>) -> Result<()> {
        if w.dim() != self.w.dim() {
            return Err(MlErr::SizeMismatch {
                what: "dense weights",
                got: w.len(),
                expected: self.w.len(),
            });
        }

        if b.len() != self.b.len() {
            return Err(MlErr::SizeMismatch {
                what: "dense biases",
                got: b.len(),
                expected: self.b.len(),
            });
        }

        self.w.assign(&w);
        self.b.assign(&b);
        Ok(())
    }

    /// Computes the layer's output without keeping any metadata for a backward pass.
    pub fn predict(&self, x: ArrayView2<f32>) -> Array2<f32> {
        let mut z = x.dot(&self.w) + &self.b;

        if let Some(act_fn) = &self.act_fn {
            z.mapv_inplace(|z| act_fn.f(z));
        }

        z
    }

    /// Computes the layer's output, caching what `backward` needs.
    pub fn forward(&mut self, x: ArrayView2<f32>) -> Array2<f32> {
        self.x = x.to_owned();
        self.z = x.dot(&self.w) + &self.b;

        match &self.act_fn {
            Some(act_fn) => self.z.mapv(|z| act_fn.f(z)),
            None => self.z.clone(),
        }
    }

    /// Computes this layer's gradients given the delta of its output and returns the
    /// delta of its input.
    pub fn backward(&mut self, mut d: Array2<f32>) -> Array2<f32> {
        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        }

        self.dw = self.x.t().dot(&d);
        self.db = d.sum_axis(Axis(0));
        d.dot(&self.w.t())
    }

    /// Bounds the norm of each gradient tensor of this layer.
    pub fn clip(&mut self, clipping: &Clipping) {
        clipping.apply(&mut self.dw);
        clipping.apply(&mut self.db);
    }

    /// Applies the last computed gradients through `optimizer`.
    pub fn step<O: Optimizer>(&mut self, optimizer: &mut O) {
        optimizer.update_params(&mut self.w, &self.dw);
        optimizer.update_params(&mut self.b, &self.db);
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::optimization::GradientDescent;

    fn identity_layer() -> Dense {
        let mut layer = Dense::new((2, 2), None);
        layer
            .load(array![[1., 0.], [0., 1.]].view(), array![0.5, -0.5].view())
            .unwrap();
        layer
    }

    #[test]
    fn forward_adds_bias_per_row() {
        let mut layer = identity_layer();
        let y = layer.forward(array![[1., 2.], [3., 4.]].view());

        assert_eq!(y, array![[1.5, 1.5], [3.5, 3.5]]);
        assert_eq!(layer.predict(array![[1., 2.]].view()), array![[1.5, 1.5]]);
    }

    #[test]
    fn backward_computes_gradients() {
        let mut layer = identity_layer();
        layer.forward(array![[1., 2.]].view());

        let d_in = layer.backward(array![[1., 1.]]);
        assert_eq!(d_in, array![[1., 1.]]);
        assert_eq!(layer.dw, array![[1., 1.], [2., 2.]]);
        assert_eq!(layer.db, array![1., 1.]);

        layer.step(&mut GradientDescent::new(1.));
        assert_eq!(layer.weights(), array![[0., -1.], [-2., -1.]]);
        assert_eq!(layer.biases(), array![-0.5, -1.5]);
    }

    #[test]
    fn loading_wrong_shapes_fails() {
        let mut layer = Dense::new((2, 3), None);
        let err = layer
            .load(Array2::zeros((3, 2)).view(), Array1::zeros(3).view())
            .unwrap_err();

        assert!(matches!(err, MlErr::SizeMismatch { what: "dense weights", .. }));
    }

    #[test]
    fn init_is_bounded_and_seeded() {
        let mut a = Dense::new((4, 3), Some(ActFn::relu()));
        let mut b = a.clone();

        a.init(&mut StdRng::seed_from_u64(1)).unwrap();
        b.init(&mut StdRng::seed_from_u64(1)).unwrap();

        let range = (6f32 / 7.).sqrt();
        assert_eq!(a.weights(), b.weights());
        assert!(a.weights().iter().all(|w| w.abs() <= range));
        assert_eq!(a.size(), 15);
    }
}
