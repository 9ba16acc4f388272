use std::num::NonZeroUsize;

use log::debug;
use rand::{Rng, seq::SliceRandom};

use crate::{
    MlErr, Result,
    arch::{Model, loss::LossFn},
    data::Dataset,
    optimization::GradientDescent,
    privacy::PrivacyBudget,
    state::ModelState,
};

/// The outcome of one client's local training.
#[derive(Debug, Clone)]
pub struct LocalResult {
    pub client: usize,
    pub state: ModelState,
    pub loss: f32,
    /// The learning rate the client should use the next time it's selected.
    pub learning_rate: f32,
}

/// Trains copies of a model template on client shards under a privacy budget.
///
/// The trainer holds no per client state, so one instance can serve every client of a
/// round concurrently.
#[derive(Debug, Clone)]
pub struct LocalTrainer<M, L>
where
    M: Model + Clone,
    L: LossFn,
{
    template: M,
    loss_fn: L,
    local_epochs: NonZeroUsize,
    batch_size: NonZeroUsize,
    lr_decay: f32,
}

impl<M, L> LocalTrainer<M, L>
where
    M: Model + Clone,
    L: LossFn,
{
    /// Creates a new `LocalTrainer`.
    ///
    /// # Arguments
    /// * `template` - A model with the architecture every client trains, its parameters are overwritten on each call.
    /// * `loss_fn` - The loss function.
    /// * `local_epochs` - The amount of passes over the shard per call.
    /// * `batch_size` - The maximum amount of samples per batch.
    /// * `lr_decay` - The factor applied to the learning rate after each call.
    ///
    /// # Returns
    /// A new `LocalTrainer` instance.
    pub fn new(
        template: M,
        loss_fn: L,
        local_epochs: NonZeroUsize,
        batch_size: NonZeroUsize,
        lr_decay: f32,
    ) -> Self {
        Self {
            template,
            loss_fn,
            local_epochs,
            batch_size,
            lr_decay,
        }
    }

    pub fn template(&self) -> &M {
        &self.template
    }

    pub fn loss_fn(&self) -> &L {
        &self.loss_fn
    }

    /// Trains a fresh copy of `global` on a client's shard.
    ///
    /// When the budget's mechanism is active every gradient is clipped while training and the
    /// resulting parameters are perturbed with noise calibrated to the per round epsilon.
    ///
    /// # Arguments
    /// * `client` - The id of the client being trained.
    /// * `shard` - The client's indices into `dataset`.
    /// * `dataset` - The training dataset.
    /// * `global` - The current global model state, left untouched.
    /// * `learning_rate` - The client's current learning rate.
    /// * `budget` - The per round privacy budget.
    /// * `rng` - The source of randomness for batching and noise.
    ///
    /// # Returns
    /// The client's `LocalResult`, or `InvalidShard`, `BudgetExhausted`, `Diverged` or a
    /// layout error if `global` doesn't fit the template.
    #[allow(clippy::too_many_arguments)]
    pub fn train<R: Rng + ?Sized>(
        &self,
        client: usize,
        shard: &[usize],
        dataset: &Dataset,
        global: &ModelState,
        learning_rate: f32,
        budget: &PrivacyBudget,
        rng: &mut R,
    ) -> Result<LocalResult> {
        if shard.is_empty() || shard.iter().any(|&i| i >= dataset.len()) {
            return Err(MlErr::InvalidShard { client });
        }

        budget.validate()?;

        let mut model = self.template.clone();
        model.load_state(global)?;

        let mut optimizer = GradientDescent::new(learning_rate);
        let clipping = budget.clipping();
        let mut idxs = shard.to_vec();
        let mut total_loss = 0.;

        for _ in 0..self.local_epochs.get() {
            idxs.shuffle(rng);
            let batches = dataset.batches(&idxs, self.batch_size);
            total_loss += model.backprop(&mut optimizer, &self.loss_fn, clipping.as_ref(), batches)?;
        }

        let loss = total_loss / self.local_epochs.get() as f32;
        if !loss.is_finite() {
            return Err(MlErr::Diverged { client });
        }

        let mut state = model.state();
        let mechanism = budget.mechanism();
        if mechanism.is_active() {
            let scale = budget.noise_scale(learning_rate, shard.len());
            for (_, tensor) in state.iter_mut() {
                mechanism.perturb(tensor, scale, rng)?;
            }
        }

        debug!(client = client, loss = loss, samples = shard.len(); "local training finished");

        Ok(LocalResult {
            client,
            state,
            loss,
            learning_rate: learning_rate * self.lr_decay,
        })
    }
}
