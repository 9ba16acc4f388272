use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::{Result, SimErr};

/// Where each client's simulated task duration comes from.
#[derive(Debug, Clone)]
pub enum Latency {
    /// Every task of client `i` takes exactly `times[i]`.
    Fixed(Vec<f64>),
    /// Every task of client `i` takes `base[i]` scaled by a random load factor.
    Jittered {
        base: Vec<f64>,
        jitter: Option<Uniform<f64>>,
    },
}

impl Latency {
    /// Creates a new `Latency` that always returns the given times.
    ///
    /// # Returns
    /// A new `Latency` or an `InvalidConfig` error if a time is negative or not finite.
    pub fn fixed(times: Vec<f64>) -> Result<Self> {
        if let Some(t) = times.iter().find(|t| !(t.is_finite() && **t >= 0.)) {
            return Err(SimErr::InvalidConfig(format!(
                "prepare times must be finite and non negative, got {t}"
            )));
        }

        Ok(Self::Fixed(times))
    }

    /// Creates a new `Latency` whose base times are drawn once from `U(low, high)`.
    ///
    /// # Arguments
    /// * `clients` - The amount of clients.
    /// * `low` - The lower bound of the base times.
    /// * `high` - The upper bound of the base times.
    /// * `jitter` - Each task takes `base * (1 + U(-jitter, jitter))`, `0` disables it.
    /// * `rng` - The source of randomness.
    ///
    /// # Returns
    /// A new `Latency` or an `InvalidConfig` error for invalid bounds.
    pub fn uniform<R: Rng + ?Sized>(
        clients: usize,
        low: f64,
        high: f64,
        jitter: f64,
        rng: &mut R,
    ) -> Result<Self> {
        if !(low >= 0. && low <= high && high.is_finite()) {
            return Err(SimErr::InvalidConfig(format!(
                "prepare time bounds must satisfy 0 <= low <= high, got {low} and {high}"
            )));
        }

        if !(jitter >= 0. && jitter.is_finite()) {
            return Err(SimErr::InvalidConfig(format!(
                "jitter must be finite and non negative, got {jitter}"
            )));
        }

        let base = if low == high {
            vec![low; clients]
        } else {
            let dist = Uniform::new(low, high).map_err(|e| SimErr::InvalidConfig(e.to_string()))?;
            (0..clients).map(|_| dist.sample(rng)).collect()
        };

        let jitter = if jitter > 0. {
            Some(Uniform::new(-jitter, jitter).map_err(|e| SimErr::InvalidConfig(e.to_string()))?)
        } else {
            None
        };

        Ok(Self::Jittered { base, jitter })
    }

    /// Returns the amount of clients this source has times for.
    pub fn len(&self) -> usize {
        match self {
            Self::Fixed(times) => times.len(),
            Self::Jittered { base, .. } => base.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The duration of every client's first task.
    pub fn initial(&self) -> Vec<f64> {
        match self {
            Self::Fixed(times) => times.clone(),
            Self::Jittered { base, .. } => base.clone(),
        }
    }

    /// Draws the duration of `client`'s next task.
    pub fn prepare_time<R: Rng + ?Sized>(&self, client: usize, rng: &mut R) -> f64 {
        match self {
            Self::Fixed(times) => times[client],
            Self::Jittered { base, jitter } => match jitter {
                Some(dist) => (base[client] * (1. + dist.sample(rng))).max(0.),
                None => base[client],
            },
        }
    }
}
