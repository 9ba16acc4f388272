/// Tracks how much simulated time each client still needs before it can contribute.
///
/// Remaining times are allowed to go negative: a negative value means the client has been
/// done for a while, which still orders it correctly when picking the soonest to finish.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadinessTracker {
    remaining: Vec<f64>,
    started: Vec<usize>,
}

impl ReadinessTracker {
    /// Creates a new `ReadinessTracker`.
    ///
    /// # Arguments
    /// * `prepare_times` - The initial remaining time of each client, indexed by client id.
    ///
    /// # Returns
    /// A new `ReadinessTracker` where every task can be reported from round `0` on.
    pub fn new(prepare_times: Vec<f64>) -> Self {
        let started = vec![0; prepare_times.len()];

        Self {
            remaining: prepare_times,
            started,
        }
    }

    /// Returns the amount of tracked clients.
    #[inline]
    pub fn len(&self) -> usize {
        self.remaining.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.remaining.is_empty()
    }

    pub fn remaining(&self, client: usize) -> f64 {
        self.remaining[client]
    }

    pub fn remaining_times(&self) -> &[f64] {
        &self.remaining
    }

    /// Returns the first round `client`'s current task could be reported in.
    pub fn started(&self, client: usize) -> usize {
        self.started[client]
    }

    /// How many global updates `client`'s current task missed if it's reported in `round`.
    pub fn staleness(&self, client: usize, round: usize) -> usize {
        round.saturating_sub(self.started[client])
    }

    /// Lets `duration` of simulated time pass for every client.
    pub fn advance(&mut self, duration: f64) {
        self.remaining.iter_mut().for_each(|r| *r -= duration);
    }

    /// Starts a new task for `client`.
    ///
    /// # Arguments
    /// * `client` - The client's id.
    /// * `prepare_time` - The simulated duration of the new task.
    /// * `round` - The first round the new task can be reported in.
    pub fn reset(&mut self, client: usize, prepare_time: f64, round: usize) {
        self.remaining[client] = prepare_time;
        self.started[client] = round;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advance_subtracts_from_everyone() {
        let mut tracker = ReadinessTracker::new(vec![5., 2., 9.]);

        tracker.advance(3.);
        assert_eq!(tracker.remaining_times(), &[2., -1., 6.]);
    }

    #[test]
    fn reset_only_touches_one_client() {
        let mut tracker = ReadinessTracker::new(vec![5., 2., 9.]);

        tracker.advance(2.);
        tracker.reset(1, 4., 3);

        assert_eq!(tracker.remaining_times(), &[3., 4., 7.]);
        assert_eq!(tracker.started(1), 3);
        assert_eq!(tracker.started(0), 0);
        assert_eq!(tracker.staleness(0, 3), 3);
        assert_eq!(tracker.staleness(1, 3), 0);
    }
}
