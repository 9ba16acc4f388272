use rand::Rng;

use super::Scheduler;
use crate::readiness::ReadinessTracker;

/// Harvests the `m` clients that finish soonest, the round lasts until the `m`-th of them is
/// done.
///
/// Ties on the remaining time are broken by ascending client id.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemiAsync;

impl SemiAsync {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for SemiAsync {
    fn name(&self) -> &'static str {
        "semi_asynchronous"
    }

    fn select<R: Rng + ?Sized>(&self, m: usize, tracker: &ReadinessTracker, _rng: &mut R) -> Vec<usize> {
        let remaining = tracker.remaining_times();
        let mut order: Vec<usize> = (0..tracker.len()).collect();

        order.sort_by(|&a, &b| remaining[a].total_cmp(&remaining[b]).then(a.cmp(&b)));
        order.truncate(m);
        order
    }
}
