use std::{
    error::Error,
    fmt::{self, Display},
};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug, Clone, PartialEq)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    ShapeMismatch {
        key: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    MissingParam {
        key: String,
    },
    InvalidShard {
        client: usize,
    },
    BudgetExhausted {
        epsilon: f64,
    },
    Diverged {
        client: usize,
    },
    InvalidConfig(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::ShapeMismatch { key, got, expected } => write!(
                f,
                "Parameter {key} has shape {got:?} but {expected:?} was expected"
            ),
            MlErr::MissingParam { key } => write!(f, "Parameter {key} is missing from the state"),
            MlErr::InvalidShard { client } => {
                write!(f, "Client {client} owns an empty data shard")
            }
            MlErr::BudgetExhausted { epsilon } => write!(
                f,
                "The privacy budget is exhausted, got a per round epsilon of {epsilon}"
            ),
            MlErr::Diverged { client } => {
                write!(f, "Local training diverged for client {client}")
            }
            MlErr::InvalidConfig(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}

impl Error for MlErr {}
