use ndarray::{Array2, ArrayView2, Axis};

use super::LossFn;

const LOG_FLOOR: f32 = 1e-7;

/// Softmax followed by categorical cross entropy, applied over raw logits.
///
/// Targets are expected to be one-hot rows.
#[derive(Default, Clone, Copy, Debug)]
pub struct CrossEntropy;

impl CrossEntropy {
    pub fn new() -> Self {
        Self
    }

    /// Row-wise softmax, shifted by each row's maximum for numerical stability.
    pub fn softmax(logits: ArrayView2<f32>) -> Array2<f32> {
        let mut probs = logits.to_owned();

        for mut row in probs.axis_iter_mut(Axis(0)) {
            let max = row.fold(f32::NEG_INFINITY, |m, &x| m.max(x));
            row.mapv_inplace(|x| (x - max).exp());
            let sum = row.sum();
            row.mapv_inplace(|x| x / sum);
        }

        probs
    }
}

impl LossFn for CrossEntropy {
    fn loss(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> f32 {
        let nrows = y_pred.nrows().max(1) as f32;
        let probs = Self::softmax(y_pred);

        let total: f32 = probs
            .iter()
            .zip(y.iter())
            .map(|(&p, &t)| -t * p.max(LOG_FLOOR).ln())
            .sum();

        total / nrows
    }

    fn loss_prime(&self, y_pred: ArrayView2<f32>, y: ArrayView2<f32>) -> Array2<f32> {
        let nrows = y_pred.nrows().max(1) as f32;
        (Self::softmax(y_pred) - &y) / nrows
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn softmax_rows_sum_to_one() {
        let logits = array![[1., 2., 3.], [100., 100., 100.]];
        let probs = CrossEntropy::softmax(logits.view());

        for row in probs.axis_iter(Axis(0)) {
            assert!((row.sum() - 1.).abs() < 1e-5);
        }
        assert!((probs[[1, 0]] - 1. / 3.).abs() < 1e-5);
    }

    #[test]
    fn confident_correct_prediction_has_low_loss() {
        let y = array![[0., 1.]];
        let good = array![[-10., 10.]];
        let bad = array![[10., -10.]];

        let ce = CrossEntropy::new();
        assert!(ce.loss(good.view(), y.view()) < 1e-3);
        assert!(ce.loss(bad.view(), y.view()) > 10.);
    }

    #[test]
    fn gradient_is_probabilities_minus_targets() {
        let y = array![[1., 0.]];
        let logits = array![[0., 0.]];

        let d = CrossEntropy::new().loss_prime(logits.view(), y.view());
        assert!((d[[0, 0]] + 0.5).abs() < 1e-6);
        assert!((d[[0, 1]] - 0.5).abs() < 1e-6);
    }
}
