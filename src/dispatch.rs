use std::{sync::Arc, time::Duration};

use log::{debug, warn};
use machine_learning::{
    ModelState,
    arch::{Model, loss::LossFn},
    data::Dataset,
    privacy::PrivacyBudget,
    training::{LocalResult, LocalTrainer},
};
use rand::{SeedableRng, rngs::StdRng};
use tokio::{
    sync::Semaphore,
    task::{self, JoinSet},
    time,
};

use crate::{Result, SimErr, client::Client, config::FailurePolicy};

/// One client's share of a round's work.
#[derive(Debug, Clone)]
pub struct Job {
    pub client: usize,
    pub shard: Arc<[usize]>,
    pub learning_rate: f32,
    /// Seeds every random decision of this client's local training.
    pub seed: u64,
}

impl Job {
    /// Creates the job for `client` in `round` of a run seeded with `seed`.
    pub fn new(client: &Client, seed: u64, round: usize) -> Self {
        Self {
            client: client.id(),
            shard: Arc::clone(client.shard()),
            learning_rate: client.learning_rate(),
            seed: job_seed(seed, round, client.id()),
        }
    }
}

/// Derives an independent seed for every `(round, client)` pair so results don't depend on
/// the order tasks happen to run in.
pub fn job_seed(seed: u64, round: usize, client: usize) -> u64 {
    let mut z = seed
        ^ (round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (client as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);

    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// The data every job of a round reads from.
pub struct RoundContext<M, L>
where
    M: Model + Clone,
    L: LossFn,
{
    pub trainer: Arc<LocalTrainer<M, L>>,
    pub dataset: Arc<Dataset>,
    pub global: Arc<ModelState>,
    pub budget: PrivacyBudget,
}

impl<M, L> Clone for RoundContext<M, L>
where
    M: Model + Clone,
    L: LossFn,
{
    fn clone(&self) -> Self {
        Self {
            trainer: Arc::clone(&self.trainer),
            dataset: Arc::clone(&self.dataset),
            global: Arc::clone(&self.global),
            budget: self.budget,
        }
    }
}

/// Fans a round's jobs out to the blocking thread pool and joins all of them.
#[derive(Debug)]
pub struct Dispatcher {
    permits: Arc<Semaphore>,
    deadline: Option<Duration>,
    on_failure: FailurePolicy,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    ///
    /// # Arguments
    /// * `workers` - The maximum amount of clients training at the same time.
    /// * `deadline` - How long a single client may train, unbounded if `None`.
    /// * `on_failure` - What to do with a round when a client fails.
    ///
    /// # Returns
    /// A new `Dispatcher` instance.
    pub fn new(workers: usize, deadline: Option<Duration>, on_failure: FailurePolicy) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(workers.max(1))),
            deadline,
            on_failure,
        }
    }

    /// Runs every job and waits until all of them are done.
    ///
    /// # Arguments
    /// * `jobs` - The round's jobs, in cohort order.
    /// * `ctx` - The trainer and the data shared by every job.
    ///
    /// # Returns
    /// The local results in cohort order, without the dropped clients. With the `Abort` policy
    /// any failure fails the round, with `Drop` only if every client failed. Either way the
    /// error returned is the one of the earliest failing cohort position.
    pub async fn dispatch<M, L>(&self, jobs: Vec<Job>, ctx: RoundContext<M, L>) -> Result<Vec<LocalResult>>
    where
        M: Model + Clone + Send + Sync + 'static,
        L: LossFn + Send + Sync + 'static,
    {
        let total = jobs.len();
        let mut tasks = JoinSet::new();

        for (pos, job) in jobs.into_iter().enumerate() {
            let permits = Arc::clone(&self.permits);
            let deadline = self.deadline;
            let ctx = ctx.clone();

            tasks.spawn(async move {
                let client = job.client;
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => Self::train(job, ctx, deadline).await,
                    Err(e) => Err(SimErr::Join(e.to_string())),
                };

                (pos, client, result)
            });
        }

        let mut slots: Vec<Option<LocalResult>> = vec![None; total];
        let mut failures = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            let (pos, client, result) = joined.map_err(|e| SimErr::Join(e.to_string()))?;

            match result {
                Ok(local) => {
                    debug!(client = client, loss = local.loss; "client reported");
                    slots[pos] = Some(local);
                }
                Err(e) => failures.push((pos, client, e)),
            }
        }

        failures.sort_by_key(|(pos, ..)| *pos);
        let results: Vec<_> = slots.into_iter().flatten().collect();

        if self.on_failure == FailurePolicy::Abort || results.is_empty() {
            if let Some((_, _, e)) = failures.into_iter().next() {
                return Err(e);
            }
        } else {
            for (_, client, e) in &failures {
                warn!(client = client; "dropping client from the round, the cohort shrinks: {e}");
            }
        }

        Ok(results)
    }

    /// Trains a single job on the blocking pool.
    ///
    /// On a deadline expiry the blocking work can't be interrupted, it finishes in the
    /// background and its result is discarded.
    async fn train<M, L>(job: Job, ctx: RoundContext<M, L>, deadline: Option<Duration>) -> Result<LocalResult>
    where
        M: Model + Clone + Send + Sync + 'static,
        L: LossFn + Send + Sync + 'static,
    {
        let client = job.client;
        let work = task::spawn_blocking(move || {
            let mut rng = StdRng::seed_from_u64(job.seed);
            ctx.trainer.train(
                job.client,
                &job.shard,
                &ctx.dataset,
                &ctx.global,
                job.learning_rate,
                &ctx.budget,
                &mut rng,
            )
        });

        let joined = match deadline {
            Some(deadline) => time::timeout(deadline, work)
                .await
                .map_err(|_| SimErr::Deadline { client })?,
            None => work.await,
        };

        joined
            .map_err(|e| SimErr::Join(e.to_string()))?
            .map_err(|source| SimErr::Training { client, source })
    }
}
