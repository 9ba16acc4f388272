mod budget;
mod mechanism;

pub use budget::{PrivacyBudget, per_round_epsilon};
pub use mechanism::{ClipNorm, Clipping, NoiseMechanism};
