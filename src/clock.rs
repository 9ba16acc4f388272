/// The simulated elapsed time, driven only by scheduling decisions.
///
/// The clock never goes backwards: it's only moved by non-negative round costs.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd)]
pub struct VirtualClock {
    now: f64,
}

impl VirtualClock {
    /// Creates a new `VirtualClock` at time zero.
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn now(&self) -> f64 {
        self.now
    }

    /// Moves the clock forward by `cost`, negative or `NaN` costs are ignored.
    ///
    /// # Returns
    /// The new time.
    pub fn advance(&mut self, cost: f64) -> f64 {
        if cost > 0. {
            self.now += cost;
        }

        self.now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_monotonically() {
        let mut clock = VirtualClock::new();

        assert_eq!(clock.advance(2.5), 2.5);
        assert_eq!(clock.advance(0.), 2.5);
        assert_eq!(clock.advance(-1.), 2.5);
        assert_eq!(clock.advance(f64::NAN), 2.5);
        assert_eq!(clock.advance(0.5), 3.);
    }
}
