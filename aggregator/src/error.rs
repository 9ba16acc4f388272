use std::{
    error::Error,
    fmt::{self, Display},
};

/// The specific result type for the aggregation module.
pub type Result<T> = std::result::Result<T, AggregationErr>;

/// Error returned whenever a set of contributions can't be folded into one model state.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationErr {
    Empty,
    ShapeMismatch { key: String },
    InvalidWeights,
}

impl Display for AggregationErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AggregationErr::Empty => f.write_str("Aggregation error: there are no contributions"),
            AggregationErr::ShapeMismatch { key } => write!(
                f,
                "Aggregation error: parameter {key} is missing or has a different shape across contributions"
            ),
            AggregationErr::InvalidWeights => {
                f.write_str("Aggregation error: the contribution weights aren't positive and finite")
            }
        }
    }
}

impl Error for AggregationErr {}
