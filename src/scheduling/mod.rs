mod scheduler;
mod semi_async;
mod synchronous;

pub use scheduler::{Schedule, Scheduler, cohort_size};
pub use semi_async::SemiAsync;
pub use synchronous::Synchronous;
