pub mod builder;
pub mod client;
pub mod clock;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod latency;
pub mod metrics;
pub mod orchestrator;
pub mod readiness;
pub mod scheduling;
pub mod simulation;

pub use builder::SimulationBuilder;
pub use config::SimConfig;
pub use error::{Result, SimErr};
pub use metrics::MetricLog;
pub use orchestrator::{Orchestrator, RoundPhase, RoundReport};
pub use simulation::Simulation;
