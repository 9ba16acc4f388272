use machine_learning::ModelState;

use crate::Result;

/// One client's model state as handed to an `Aggregator`.
#[derive(Debug, Clone, Copy)]
pub struct Contribution<'a> {
    pub state: &'a ModelState,
    /// How many rounds ago the client started the task that produced `state`.
    pub staleness: usize,
}

impl<'a> Contribution<'a> {
    pub fn new(state: &'a ModelState, staleness: usize) -> Self {
        Self { state, staleness }
    }

    /// A contribution computed against the latest global state.
    pub fn fresh(state: &'a ModelState) -> Self {
        Self::new(state, 0)
    }
}

/// Folds the model states of a cohort into the next global model state.
pub trait Aggregator {
    /// Combines every contribution into a new state.
    ///
    /// Implementations must be deterministic: the same contributions in the same order
    /// always produce the same state.
    ///
    /// # Arguments
    /// * `contributions` - The cohort's results, in cohort order.
    ///
    /// # Returns
    /// The new global state, `Empty` if there's nothing to aggregate or `ShapeMismatch` if the
    /// contributions don't share the same keys and shapes.
    fn aggregate(&self, contributions: &[Contribution<'_>]) -> Result<ModelState>;
}
