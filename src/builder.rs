use std::{num::NonZeroUsize, sync::Arc, time::Duration};

use aggregator::FedAvg;
use log::info;
use machine_learning::{
    ModelState,
    arch::{Model, ModelKind, Sequential, activations::ActFn, loss::CrossEntropy},
    data::{self, BlobSpec, Dataset, Partition},
    privacy::{NoiseMechanism, PrivacyBudget},
    training::LocalTrainer,
};
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Result,
    client::Client,
    config::{
        ActivationConfig, AggregationConfig, DatasetSource, LatencyConfig, MechanismConfig, ModelConfig,
        PartitionConfig, SchedulingConfig, SimConfig,
    },
    dispatch::Dispatcher,
    latency::Latency,
    metrics::MetricSink,
    orchestrator::{Federation, Orchestrator, RunSettings},
    scheduling::{SemiAsync, Scheduler, Synchronous, cohort_size},
    simulation::Simulation,
};

/// Keeps the setup draws (data, partition, initial model and latencies) apart from the
/// scheduling ones, which are seeded with the run's seed itself.
const SETUP_STREAM: u64 = 0xA5A5_5A5A_0F0F_F0F0;

/// Builds `Simulation`s given a configuration.
///
/// Every configuration choice is resolved once here into a concrete object, nothing is
/// re-checked while the rounds run.
#[derive(Debug, Default)]
pub struct SimulationBuilder {
    write_metrics: bool,
}

impl SimulationBuilder {
    /// Creates a new `SimulationBuilder` that persists the metric log on termination.
    pub fn new() -> Self {
        Self {
            write_metrics: true,
        }
    }

    /// Skips persisting the metric log, it's still returned by `Simulation::run`.
    pub fn without_output(mut self) -> Self {
        self.write_metrics = false;
        self
    }

    /// Builds a new `Simulation` following a config.
    ///
    /// # Arguments
    /// * `config` - The configuration of the run.
    ///
    /// # Returns
    /// A new simulation or an `InvalidConfig` error describing the first problem found.
    pub fn build(&self, config: SimConfig) -> Result<Box<dyn Simulation>> {
        config.validate()?;
        self.resolve_scheduler(config)
    }

    /// Resolves the seed of the run, drawing one if the config has none.
    fn resolve_seed(&self, config: &SimConfig) -> u64 {
        let seed = config.seed.unwrap_or_else(rand::random);
        info!(seed = seed; "seeding the simulation");
        seed
    }

    /// Resolves the `Scheduler` for this simulation.
    fn resolve_scheduler(&self, config: SimConfig) -> Result<Box<dyn Simulation>> {
        match config.scheduling {
            SchedulingConfig::Synchronous => self.terminate_build(config, Synchronous::new()),
            SchedulingConfig::SemiAsynchronous => self.terminate_build(config, SemiAsync::new()),
        }
    }

    /// Resolves the train and test datasets and every client's shard.
    ///
    /// # Returns
    /// The training set, the test set and the partition of the training set.
    fn resolve_dataset<R: Rng + ?Sized>(
        &self,
        config: &SimConfig,
        rng: &mut R,
    ) -> Result<(Dataset, Dataset, Partition)> {
        let DatasetSource::Synthetic {
            samples,
            features,
            classes,
            spread,
            test_fraction,
        } = config.dataset.source;

        let spec = BlobSpec {
            samples,
            features,
            classes,
            spread,
        };
        let dataset = data::blobs(&spec, rng)?;
        let (train, test) = data::train_test_split(&dataset, test_fraction, rng)?;

        let partition = match config.dataset.partition {
            PartitionConfig::Iid => data::iid(train.len(), config.clients, rng)?,
            PartitionConfig::NonIid { shards_per_client } => {
                data::non_iid(train.labels(), config.clients, shards_per_client, rng)?
            }
        };

        Ok((train, test, partition))
    }

    /// Resolves the architecture and its random initial state.
    fn resolve_model<R: Rng + ?Sized>(
        &self,
        config: &SimConfig,
        train: &Dataset,
        rng: &mut R,
    ) -> Result<(Sequential, ModelState)> {
        let kind = match config.model {
            ModelConfig::Logistic => ModelKind::Logistic,
            ModelConfig::Mlp { hidden, activation } => ModelKind::Mlp {
                hidden,
                act_fn: match activation {
                    ActivationConfig::Relu => ActFn::relu(),
                    ActivationConfig::Sigmoid => ActFn::sigmoid(1.),
                },
            },
        };

        let model = kind.build(train.nfeatures(), train.classes(), rng)?;
        let global = model.state();
        Ok((model, global))
    }

    /// Resolves the source of the clients' task durations.
    fn resolve_latency<R: Rng + ?Sized>(&self, config: &SimConfig, rng: &mut R) -> Result<Latency> {
        match &config.latency {
            LatencyConfig::Fixed { times } => Latency::fixed(times.clone()),
            LatencyConfig::Uniform { low, high, jitter } => {
                Latency::uniform(config.clients, *low, *high, *jitter, rng)
            }
        }
    }

    /// Resolves the per round `PrivacyBudget` by splitting the total epsilon across the run.
    fn resolve_budget(&self, config: &SimConfig) -> Result<PrivacyBudget> {
        let privacy = &config.privacy;
        let mechanism = match privacy.mechanism {
            MechanismConfig::NoDp => NoiseMechanism::NoDp,
            MechanismConfig::Gaussian => NoiseMechanism::Gaussian,
            MechanismConfig::Laplace => NoiseMechanism::Laplace,
        };

        let budget = PrivacyBudget::allocate(
            privacy.epsilon,
            config.participation,
            config.rounds,
            privacy.delta,
            privacy.clip,
            mechanism,
        )?;

        info!(epsilon = budget.epsilon(), mechanism = privacy.mechanism.name(); "per round privacy budget");
        Ok(budget)
    }

    /// Resolves the `Aggregator` for this simulation.
    fn resolve_aggregator(&self, config: &SimConfig) -> Result<FedAvg> {
        match config.aggregation {
            AggregationConfig::Uniform => Ok(FedAvg::new()),
            AggregationConfig::StalenessDiscounted { exponent } => {
                Ok(FedAvg::staleness_discounted(exponent)?)
            }
        }
    }

    /// Terminates the entire build and finally instantiates all the entities.
    ///
    /// # Arguments
    /// * `config` - The configuration of the run.
    /// * `scheduler` - A resolved scheduler.
    ///
    /// # Returns
    /// A new simulation.
    fn terminate_build<S>(&self, config: SimConfig, scheduler: S) -> Result<Box<dyn Simulation>>
    where
        S: Scheduler + Send + Sync + 'static,
    {
        let seed = self.resolve_seed(&config);
        let mut rng = StdRng::seed_from_u64(seed ^ SETUP_STREAM);

        let (train, test, partition) = self.resolve_dataset(&config, &mut rng)?;
        let (model, global) = self.resolve_model(&config, &train, &mut rng)?;
        let latency = self.resolve_latency(&config, &mut rng)?;
        let budget = self.resolve_budget(&config)?;
        let aggregator = self.resolve_aggregator(&config)?;

        let training = &config.training;
        let trainer = LocalTrainer::new(
            model,
            CrossEntropy::new(),
            NonZeroUsize::new(training.local_epochs).unwrap_or(NonZeroUsize::MIN),
            NonZeroUsize::new(training.batch_size).unwrap_or(NonZeroUsize::MIN),
            training.lr_decay,
        );

        let clients = partition
            .into_iter()
            .enumerate()
            .map(|(id, shard)| Client::new(id, shard, training.learning_rate))
            .collect();
        let federation = Federation {
            clients,
            train_set: Arc::new(train),
            test_set: test,
        };

        let dispatch = &config.dispatch;
        let dispatcher = Dispatcher::new(
            dispatch.workers,
            dispatch.deadline_ms.map(Duration::from_millis),
            dispatch.on_failure,
        );

        let settings = RunSettings {
            rounds: config.rounds,
            cohort_size: cohort_size(config.participation, config.clients)?,
            seed,
            sink: self.write_metrics.then(|| MetricSink::for_config(&config)),
        };

        info!(
            clients = config.clients,
            cohort = settings.cohort_size,
            rounds = config.rounds,
            policy = scheduler.name(),
            model = config.model.name();
            "simulation ready"
        );

        let orchestrator = Orchestrator::new(
            scheduler, latency, federation, trainer, aggregator, dispatcher, budget, global,
            settings,
        )?;

        Ok(Box::new(orchestrator))
    }
}
