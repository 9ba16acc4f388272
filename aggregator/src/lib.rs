mod accumulator;
mod aggregator;
mod error;
mod fed_avg;

pub use aggregator::{Aggregator, Contribution};
pub use error::{AggregationErr, Result};
pub use fed_avg::{FedAvg, Weighting};
