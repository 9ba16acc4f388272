use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use aggregator::AggregationErr;
use machine_learning::MlErr;

/// The result type used across the simulator.
pub type Result<T> = std::result::Result<T, SimErr>;

/// All errors that can stop a simulation.
#[derive(Debug)]
pub enum SimErr {
    /// Invalid configuration, caught before the first round.
    InvalidConfig(String),
    /// A client's local training failed.
    Training { client: usize, source: MlErr },
    /// The cohort's states couldn't be aggregated.
    Aggregation(AggregationErr),
    /// The new global model couldn't be evaluated on the held out dataset.
    Evaluation(MlErr),
    /// A client didn't finish its local training before the deadline.
    Deadline { client: usize },
    /// A training task panicked or was cancelled.
    Join(String),
    /// The run already ended, either after its last round or on a fatal error.
    Terminated { round: usize },
    Io(io::Error),
    Json(serde_json::Error),
}

impl Display for SimErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Training { client, source } => {
                write!(f, "client {client} failed to train: {source}")
            }
            Self::Aggregation(e) => write!(f, "aggregation failed: {e}"),
            Self::Evaluation(e) => write!(f, "evaluation failed: {e}"),
            Self::Deadline { client } => write!(f, "client {client} missed its deadline"),
            Self::Join(msg) => write!(f, "training task failed: {msg}"),
            Self::Terminated { round } => {
                write!(f, "the simulation is terminated, it stopped at round {round}")
            }
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Json(e) => write!(f, "json error: {e}"),
        }
    }
}

impl Error for SimErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Training { source, .. } => Some(source),
            Self::Aggregation(e) => Some(e),
            Self::Evaluation(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<AggregationErr> for SimErr {
    fn from(e: AggregationErr) -> Self {
        Self::Aggregation(e)
    }
}

impl From<io::Error> for SimErr {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for SimErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<MlErr> for SimErr {
    /// Errors raised outside of a client's training are setup mistakes.
    fn from(e: MlErr) -> Self {
        Self::InvalidConfig(e.to_string())
    }
}
