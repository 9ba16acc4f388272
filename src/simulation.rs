use aggregator::Aggregator;
use machine_learning::arch::{Model, loss::LossFn};

use crate::{
    Result,
    metrics::MetricLog,
    orchestrator::{Orchestrator, RoundReport},
    scheduling::Scheduler,
};

/// This trait acts as an indirection layer, allowing the `SimulationBuilder` to return
/// orchestrators with different scheduling policies from its unique build method.
#[async_trait::async_trait]
pub trait Simulation: Send {
    /// Indirection method for `Orchestrator::run`.
    async fn run(&mut self) -> Result<MetricLog>;

    /// Indirection method for `Orchestrator::run_round`.
    async fn run_round(&mut self) -> Result<RoundReport>;

    /// Indirection method for `Orchestrator::reports`.
    fn reports(&self) -> &[RoundReport];

    /// Indirection method for `Orchestrator::clock`.
    fn clock(&self) -> f64;
}

#[async_trait::async_trait]
impl<S, M, L, A> Simulation for Orchestrator<S, M, L, A>
where
    S: Scheduler + Send + Sync,
    M: Model + Clone + Send + Sync + 'static,
    L: LossFn + Send + Sync + 'static,
    A: Aggregator + Send + Sync,
{
    async fn run(&mut self) -> Result<MetricLog> {
        Orchestrator::run(self).await
    }

    async fn run_round(&mut self) -> Result<RoundReport> {
        Orchestrator::run_round(self).await
    }

    fn reports(&self) -> &[RoundReport] {
        Orchestrator::reports(self)
    }

    fn clock(&self) -> f64 {
        Orchestrator::clock(self)
    }
}
