use log::debug;
use rand::Rng;

use crate::{Result, SimErr, latency::Latency, readiness::ReadinessTracker};

/// The outcome of one scheduling decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Schedule {
    /// The selected client ids, in selection order.
    pub cohort: Vec<usize>,
    /// The simulated time the round takes.
    pub cost: f64,
    /// How many global updates each cohort member's task missed, same order as `cohort`.
    pub staleness: Vec<usize>,
}

/// Computes how many clients take part in each round, `max(1, round(participation * clients))`.
///
/// # Returns
/// The cohort size or an `InvalidConfig` error if it can't be satisfied.
pub fn cohort_size(participation: f64, clients: usize) -> Result<usize> {
    if clients == 0 || !(participation > 0. && participation <= 1.) {
        return Err(SimErr::InvalidConfig(format!(
            "can't select a fraction {participation} out of {clients} clients"
        )));
    }

    let m = (participation * clients as f64).round() as usize;
    Ok(m.clamp(1, clients))
}

/// A client selection policy.
///
/// Implementors decide who takes part in a round and how much simulated time it costs, the
/// bookkeeping that follows every decision is shared.
pub trait Scheduler {
    fn name(&self) -> &'static str;

    /// Picks `m` distinct clients.
    ///
    /// # Arguments
    /// * `m` - The cohort size, in `[1, tracker.len()]`.
    /// * `tracker` - The current remaining time of every client.
    /// * `rng` - The source of randomness.
    fn select<R: Rng + ?Sized>(&self, m: usize, tracker: &ReadinessTracker, rng: &mut R) -> Vec<usize>;

    /// The simulated time until every client in `cohort` is done.
    fn cost(&self, cohort: &[usize], tracker: &ReadinessTracker) -> f64 {
        let slowest = cohort
            .iter()
            .map(|&client| tracker.remaining(client))
            .fold(f64::NEG_INFINITY, f64::max);

        // Everyone might be done already.
        slowest.max(0.)
    }

    /// Runs one scheduling step: selects the cohort, lets the round's cost pass for every
    /// client and starts a new task for each selected one.
    ///
    /// # Arguments
    /// * `m` - The cohort size.
    /// * `round` - The round being scheduled.
    /// * `tracker` - The readiness of every client.
    /// * `latency` - The source of new task durations.
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    /// The `Schedule` or an `InvalidConfig` error if `m` is out of range.
    fn schedule<R: Rng + ?Sized>(
        &self,
        m: usize,
        round: usize,
        tracker: &mut ReadinessTracker,
        latency: &Latency,
        rng: &mut R,
    ) -> Result<Schedule> {
        if m == 0 || m > tracker.len() {
            return Err(SimErr::InvalidConfig(format!(
                "cohort size {m} is out of range for {} clients",
                tracker.len()
            )));
        }

        let cohort = self.select(m, tracker, rng);
        let cost = self.cost(&cohort, tracker);
        let staleness = cohort.iter().map(|&c| tracker.staleness(c, round)).collect();

        tracker.advance(cost);
        for &client in &cohort {
            let prepare_time = latency.prepare_time(client, rng);
            tracker.reset(client, prepare_time, round + 1);
        }

        debug!(round = round, policy = self.name(), cost = cost; "scheduled cohort {cohort:?}");

        Ok(Schedule {
            cohort,
            cost,
            staleness,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cohort_size_rounds_and_clamps() {
        assert_eq!(cohort_size(0.3, 10).unwrap(), 3);
        assert_eq!(cohort_size(0.25, 10).unwrap(), 3);
        assert_eq!(cohort_size(0.01, 10).unwrap(), 1);
        assert_eq!(cohort_size(1.0, 10).unwrap(), 10);
        assert!(cohort_size(0.0, 10).is_err());
        assert!(cohort_size(1.5, 10).is_err());
        assert!(cohort_size(0.5, 0).is_err());
    }
}
