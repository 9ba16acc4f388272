mod evaluation;
mod local;

pub use evaluation::{Evaluation, evaluate};
pub use local::{LocalResult, LocalTrainer};
