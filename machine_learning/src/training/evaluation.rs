use ndarray::Axis;

use crate::{
    Result,
    arch::{Model, loss::LossFn},
    data::Dataset,
    state::ModelState,
};

/// How well a model state does on a held out dataset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Percentage of correctly classified samples, in `[0, 100]`.
    pub accuracy: f64,
    pub loss: f32,
}

/// Evaluates `state` on every sample of `dataset`.
///
/// # Arguments
/// * `model` - A model with the state's architecture, its parameters are overwritten.
/// * `state` - The parameters to evaluate.
/// * `loss_fn` - The loss function reported alongside the accuracy.
/// * `dataset` - The held out dataset.
///
/// # Returns
/// The `Evaluation`, or an error if `state` doesn't fit `model`.
pub fn evaluate<M, L>(
    model: &mut M,
    state: &ModelState,
    loss_fn: &L,
    dataset: &Dataset,
) -> Result<Evaluation>
where
    M: Model,
    L: LossFn,
{
    if dataset.is_empty() {
        return Ok(Evaluation {
            accuracy: 0.,
            loss: 0.,
        });
    }

    model.load_state(state)?;

    let idxs: Vec<usize> = (0..dataset.len()).collect();
    let (x, y) = dataset.batch(&idxs);
    let y_pred = model.predict(x.view())?;
    let loss = loss_fn.loss(y_pred.view(), y.view());

    let correct = y_pred
        .axis_iter(Axis(0))
        .zip(dataset.labels())
        .filter(|(row, label)| argmax(row.iter().copied()) == **label)
        .count();

    Ok(Evaluation {
        accuracy: 100. * correct as f64 / dataset.len() as f64,
        loss,
    })
}

fn argmax<I: Iterator<Item = f32>>(values: I) -> usize {
    values
        .enumerate()
        .fold((0, f32::NEG_INFINITY), |(best, max), (i, v)| {
            if v > max { (i, v) } else { (best, max) }
        })
        .0
}

#[cfg(test)]
mod tests {
    use ndarray::{ArrayD, IxDyn, array};

    use super::*;
    use crate::arch::{Sequential, layers::Dense, loss::CrossEntropy};

    fn identity_state() -> ModelState {
        let mut state = ModelState::new();
        state.insert(
            "layers.0.weight",
            ArrayD::from_shape_vec(IxDyn(&[2, 2]), vec![1., 0., 0., 1.]).unwrap(),
        );
        state.insert("layers.0.bias", ArrayD::zeros(IxDyn(&[2])));
        state
    }

    #[test]
    fn counts_argmax_hits() {
        let mut model = Sequential::new([Dense::new((2, 2), None)]);
        let features = array![[1., 0.], [0., 1.], [2., 0.], [0., 3.]];
        let dataset = Dataset::new(features, vec![0, 1, 1, 1], 2).unwrap();

        let eval = evaluate(&mut model, &identity_state(), &CrossEntropy::new(), &dataset).unwrap();

        assert!((eval.accuracy - 75.).abs() < 1e-9);
        assert!(eval.loss > 0.);
    }

    #[test]
    fn argmax_keeps_first_maximum() {
        assert_eq!(argmax([1., 3., 3., 0.].into_iter()), 1);
    }
}
