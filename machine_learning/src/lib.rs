pub mod arch;
pub mod data;
pub mod error;
pub mod optimization;
pub mod privacy;
pub mod state;
pub mod training;

pub use error::{MlErr, Result};
pub use state::ModelState;
