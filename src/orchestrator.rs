use std::sync::Arc;

use aggregator::{Aggregator, Contribution};
use log::{debug, error, info};
use machine_learning::{
    ModelState,
    arch::{Model, loss::LossFn},
    data::Dataset,
    privacy::PrivacyBudget,
    training::{LocalTrainer, evaluate},
};
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    Result, SimErr,
    client::Client,
    clock::VirtualClock,
    dispatch::{Dispatcher, Job, RoundContext},
    latency::Latency,
    metrics::{MetricLog, MetricSink},
    readiness::ReadinessTracker,
    scheduling::Scheduler,
};

/// The state of the round loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    Idle,
    Scheduling,
    Dispatching,
    Aggregating,
    Evaluating,
    Terminated,
}

/// Everything that happened in one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: usize,
    /// The selected clients, in selection order.
    pub cohort: Vec<usize>,
    pub cost: f64,
    /// The virtual clock once the round's cost has passed.
    pub clock: f64,
    pub accuracy: f64,
    /// The loss of the new global model on the held out dataset.
    pub loss: f32,
    /// The mean training loss reported by the clients that contributed.
    pub mean_local_loss: f32,
}

/// Fixed parameters of a run.
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub rounds: usize,
    pub cohort_size: usize,
    /// Seeds the scheduling decisions and every client's local training.
    pub seed: u64,
    pub sink: Option<MetricSink>,
}

/// The clients of a federation and the data they train and are evaluated on.
#[derive(Debug, Clone)]
pub struct Federation {
    pub clients: Vec<Client>,
    pub train_set: Arc<Dataset>,
    pub test_set: Dataset,
}

/// Drives the rounds: scheduling, local training, aggregation and evaluation, one after the
/// other, until the round count is exhausted.
pub struct Orchestrator<S, M, L, A>
where
    S: Scheduler,
    M: Model + Clone,
    L: LossFn,
    A: Aggregator,
{
    scheduler: S,
    latency: Latency,
    tracker: ReadinessTracker,
    clock: VirtualClock,
    rng: StdRng,

    federation: Federation,
    trainer: Arc<LocalTrainer<M, L>>,
    evaluator: M,
    aggregator: A,
    dispatcher: Dispatcher,
    budget: PrivacyBudget,
    global: Arc<ModelState>,

    settings: RunSettings,
    round: usize,
    phase: RoundPhase,
    /// Set once a round fails, the run can't be resumed afterwards.
    halted: bool,
    log: MetricLog,
    reports: Vec<RoundReport>,
}

impl<S, M, L, A> Orchestrator<S, M, L, A>
where
    S: Scheduler,
    M: Model + Clone + Send + Sync + 'static,
    L: LossFn + Send + Sync + 'static,
    A: Aggregator,
{
    /// Creates a new `Orchestrator` in the `Idle` phase.
    ///
    /// # Arguments
    /// * `scheduler` - The client selection policy.
    /// * `latency` - The source of every client's task durations.
    /// * `federation` - The clients and the datasets.
    /// * `trainer` - The local trainer, its template must have the layout of `global`.
    /// * `aggregator` - Folds the cohort's states into the next global state.
    /// * `dispatcher` - Runs each round's local trainings.
    /// * `budget` - The per round privacy budget.
    /// * `global` - The initial global model state.
    /// * `settings` - The fixed parameters of the run.
    ///
    /// # Returns
    /// A new `Orchestrator` instance, or an `InvalidConfig` error if `latency` doesn't describe
    /// exactly the federation's clients.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        scheduler: S,
        latency: Latency,
        federation: Federation,
        trainer: LocalTrainer<M, L>,
        aggregator: A,
        dispatcher: Dispatcher,
        budget: PrivacyBudget,
        global: ModelState,
        settings: RunSettings,
    ) -> Result<Self> {
        let clients = federation.clients.len();
        if latency.len() != clients {
            return Err(SimErr::InvalidConfig(format!(
                "latency describes {} clients but the federation has {clients}",
                latency.len()
            )));
        }

        let misplaced = federation
            .clients
            .iter()
            .enumerate()
            .find(|(pos, client)| client.id() != *pos);
        if let Some((pos, client)) = misplaced {
            return Err(SimErr::InvalidConfig(format!(
                "client {} sits at position {pos}, clients must be ordered by id",
                client.id()
            )));
        }

        let tracker = ReadinessTracker::new(latency.initial());
        let evaluator = trainer.template().clone();
        let phase = if settings.rounds == 0 {
            RoundPhase::Terminated
        } else {
            RoundPhase::Idle
        };

        Ok(Self {
            scheduler,
            latency,
            tracker,
            clock: VirtualClock::new(),
            rng: StdRng::seed_from_u64(settings.seed),
            federation,
            trainer: Arc::new(trainer),
            evaluator,
            aggregator,
            dispatcher,
            budget,
            global: Arc::new(global),
            settings,
            round: 0,
            phase,
            halted: false,
            log: MetricLog::new(),
            reports: Vec::new(),
        })
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn clock(&self) -> f64 {
        self.clock.now()
    }

    pub fn global(&self) -> &ModelState {
        &self.global
    }

    pub fn clients(&self) -> &[Client] {
        &self.federation.clients
    }

    pub fn tracker(&self) -> &ReadinessTracker {
        &self.tracker
    }

    pub fn metric_log(&self) -> &MetricLog {
        &self.log
    }

    pub fn reports(&self) -> &[RoundReport] {
        &self.reports
    }

    fn enter(&mut self, phase: RoundPhase) {
        debug!(round = self.round; "{:?} -> {phase:?}", self.phase);
        self.phase = phase;
    }

    /// Runs a single round, from `Scheduling` back to `Idle`, or to `Terminated` if it was the
    /// last one.
    ///
    /// A fatal error terminates the run: the clock keeps the failed round's cost and every
    /// later call is refused.
    ///
    /// # Returns
    /// The round's report, the fatal error that stopped it or `Terminated` if the run already
    /// ended. Rounds already logged stay valid.
    pub async fn run_round(&mut self) -> Result<RoundReport> {
        if self.phase == RoundPhase::Terminated {
            return Err(SimErr::Terminated { round: self.round });
        }

        match self.step().await {
            Ok(report) => Ok(report),
            Err(e) => {
                error!(round = self.round, clock = self.clock.now(); "round failed: {e}");
                self.halted = true;
                self.enter(RoundPhase::Terminated);
                Err(e)
            }
        }
    }

    async fn step(&mut self) -> Result<RoundReport> {
        self.enter(RoundPhase::Scheduling);
        let schedule = self.scheduler.schedule(
            self.settings.cohort_size,
            self.round,
            &mut self.tracker,
            &self.latency,
            &mut self.rng,
        )?;
        let clock = self.clock.advance(schedule.cost);

        self.enter(RoundPhase::Dispatching);
        let jobs = schedule
            .cohort
            .iter()
            .map(|&id| Job::new(&self.federation.clients[id], self.settings.seed, self.round))
            .collect();
        let ctx = RoundContext {
            trainer: Arc::clone(&self.trainer),
            dataset: Arc::clone(&self.federation.train_set),
            global: Arc::clone(&self.global),
            budget: self.budget,
        };
        let results = self.dispatcher.dispatch(jobs, ctx).await?;

        for result in &results {
            self.federation.clients[result.client].set_learning_rate(result.learning_rate);
        }

        self.enter(RoundPhase::Aggregating);
        let contributions: Vec<_> = results
            .iter()
            .map(|result| {
                let staleness = schedule
                    .cohort
                    .iter()
                    .position(|&c| c == result.client)
                    .map_or(0, |pos| schedule.staleness[pos]);
                Contribution::new(&result.state, staleness)
            })
            .collect();
        let global = self.aggregator.aggregate(&contributions)?;
        self.global = Arc::new(global);

        self.enter(RoundPhase::Evaluating);
        let eval = evaluate(
            &mut self.evaluator,
            &self.global,
            self.trainer.loss_fn(),
            &self.federation.test_set,
        )
        .map_err(SimErr::Evaluation)?;
        self.log.push(clock, eval.accuracy);

        let mean_local_loss = results.iter().map(|r| r.loss).sum::<f32>() / results.len() as f32;
        let report = RoundReport {
            round: self.round,
            cohort: schedule.cohort,
            cost: schedule.cost,
            clock,
            accuracy: eval.accuracy,
            loss: eval.loss,
            mean_local_loss,
        };

        info!(
            round = self.round,
            clock = clock,
            accuracy = eval.accuracy,
            loss = eval.loss,
            cohort = results.len();
            "round finished"
        );

        self.reports.push(report.clone());
        self.round += 1;

        let next = if self.round >= self.settings.rounds {
            RoundPhase::Terminated
        } else {
            RoundPhase::Idle
        };
        self.enter(next);

        Ok(report)
    }

    /// Runs every remaining round and flushes the metric log to the sink, if any.
    ///
    /// # Returns
    /// The complete `MetricLog`, the first fatal error or `Terminated` if an earlier round
    /// already failed.
    pub async fn run(&mut self) -> Result<MetricLog> {
        if self.halted {
            return Err(SimErr::Terminated { round: self.round });
        }

        while self.phase != RoundPhase::Terminated {
            self.run_round().await?;
        }

        if let Some(sink) = &self.settings.sink {
            sink.flush(&self.log)?;
        }

        Ok(self.log.clone())
    }
}
