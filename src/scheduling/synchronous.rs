use rand::{Rng, seq::index};

use super::Scheduler;
use crate::readiness::ReadinessTracker;

/// Samples the cohort uniformly at random, the round lasts until its slowest member is done.
#[derive(Debug, Clone, Copy, Default)]
pub struct Synchronous;

impl Synchronous {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for Synchronous {
    fn name(&self) -> &'static str {
        "synchronous"
    }

    fn select<R: Rng + ?Sized>(&self, m: usize, tracker: &ReadinessTracker, rng: &mut R) -> Vec<usize> {
        index::sample(rng, tracker.len(), m).into_vec()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::latency::Latency;

    #[test]
    fn cost_is_the_slowest_member() {
        let tracker = ReadinessTracker::new(vec![5., 2., 9.]);
        assert_eq!(Synchronous.cost(&[0, 1, 2], &tracker), 9.);
    }

    #[test]
    fn cohorts_are_distinct_and_sized() {
        let mut tracker = ReadinessTracker::new(vec![1.; 20]);
        let latency = Latency::fixed(vec![1.; 20]).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for round in 0..50 {
            let schedule = Synchronous
                .schedule(6, round, &mut tracker, &latency, &mut rng)
                .unwrap();

            let unique: HashSet<_> = schedule.cohort.iter().collect();
            assert_eq!(unique.len(), 6);
            assert!(schedule.cohort.iter().all(|&c| c < 20));
        }
    }

    #[test]
    fn idle_clients_keep_ticking() {
        let mut tracker = ReadinessTracker::new(vec![5., 2., 9.]);
        let latency = Latency::fixed(vec![5., 2., 9.]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        let schedule = Synchronous
            .schedule(1, 0, &mut tracker, &latency, &mut rng)
            .unwrap();
        let [chosen] = schedule.cohort[..] else {
            panic!("expected a single client, got {:?}", schedule.cohort);
        };

        let initial = [5., 2., 9.];
        assert_eq!(schedule.cost, initial[chosen]);
        for client in 0..3 {
            let expected = if client == chosen {
                initial[client]
            } else {
                initial[client] - schedule.cost
            };
            assert_eq!(tracker.remaining(client), expected);
        }
    }

    #[test]
    fn out_of_range_cohort_fails() {
        let mut tracker = ReadinessTracker::new(vec![1.; 3]);
        let latency = Latency::fixed(vec![1.; 3]).unwrap();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(Synchronous.schedule(0, 0, &mut tracker, &latency, &mut rng).is_err());
        assert!(Synchronous.schedule(4, 0, &mut tracker, &latency, &mut rng).is_err());
    }
}
