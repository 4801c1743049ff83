//! Synthetic samplers for running without hardware.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::button::SignalState;
use crate::sampler::{ContinuousSampler, DiscreteSampler};
use crate::{PollError, SensorReading};

/// Default probability that the simulated button flips between reads.
const DEFAULT_TOGGLE_PROBABILITY: f64 = 0.2;

struct SignalInner {
    rng: StdRng,
    state: SignalState,
}

/// Two-valued signal that flips with a fixed probability on every read.
pub struct RandomSignal {
    toggle_probability: f64,
    inner: Mutex<SignalInner>,
}

impl std::fmt::Debug for RandomSignal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomSignal")
            .field("toggle_probability", &self.toggle_probability)
            .finish_non_exhaustive()
    }
}

impl Default for RandomSignal {
    fn default() -> Self {
        Self::new(DEFAULT_TOGGLE_PROBABILITY)
    }
}

impl RandomSignal {
    /// Start `Open`, flipping with `toggle_probability` (clamped to `0..=1`).
    pub fn new(toggle_probability: f64) -> Self {
        Self::with_rng(toggle_probability, StdRng::from_entropy())
    }

    /// Deterministic variant for tests.
    pub fn seeded(toggle_probability: f64, seed: u64) -> Self {
        Self::with_rng(toggle_probability, StdRng::seed_from_u64(seed))
    }

    fn with_rng(toggle_probability: f64, rng: StdRng) -> Self {
        Self {
            toggle_probability: toggle_probability.clamp(0.0, 1.0),
            inner: Mutex::new(SignalInner {
                rng,
                state: SignalState::Open,
            }),
        }
    }
}

#[async_trait]
impl DiscreteSampler for RandomSignal {
    async fn read_discrete(&self) -> Result<SignalState, PollError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        if inner.rng.gen_bool(self.toggle_probability) {
            inner.state = match inner.state {
                SignalState::Open => SignalState::Closed,
                _ => SignalState::Open,
            };
        }
        Ok(inner.state)
    }
}

struct ClimateInner {
    rng: StdRng,
    /// `(sensor_id, temperature, humidity)`
    values: Vec<(i64, f64, f64)>,
}

/// Random-walk temperature and humidity for a set of sensors, stamped with
/// the current time.
pub struct SimulatedClimate {
    inner: Mutex<ClimateInner>,
}

impl std::fmt::Debug for SimulatedClimate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SimulatedClimate").finish_non_exhaustive()
    }
}

impl SimulatedClimate {
    pub fn new(sensor_ids: &[i64]) -> Self {
        Self::with_rng(sensor_ids, StdRng::from_entropy())
    }

    pub fn seeded(sensor_ids: &[i64], seed: u64) -> Self {
        Self::with_rng(sensor_ids, StdRng::seed_from_u64(seed))
    }

    fn with_rng(sensor_ids: &[i64], rng: StdRng) -> Self {
        Self {
            inner: Mutex::new(ClimateInner {
                rng,
                values: sensor_ids.iter().map(|&id| (id, 21.0, 50.0)).collect(),
            }),
        }
    }
}

#[async_trait]
impl ContinuousSampler for SimulatedClimate {
    async fn read_continuous(&self) -> Result<Vec<SensorReading>, PollError> {
        let now = Utc::now();
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let ClimateInner { rng, values } = &mut *inner;

        Ok(values
            .iter_mut()
            .map(|(id, temperature, humidity)| {
                *temperature = (*temperature + rng.gen_range(-0.3..=0.3)).clamp(10.0, 35.0);
                *humidity = (*humidity + rng.gen_range(-1.0..=1.0)).clamp(20.0, 90.0);
                SensorReading::new(*id, *temperature, *humidity, now)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_random_signal_never_unknown() {
        let signal = RandomSignal::seeded(0.5, 7);
        for _ in 0..50 {
            let state = signal.read_discrete().await.unwrap();
            assert_ne!(state, SignalState::Unknown);
        }
    }

    #[tokio::test]
    async fn test_random_signal_extremes() {
        let steady = RandomSignal::seeded(0.0, 1);
        for _ in 0..5 {
            assert_eq!(steady.read_discrete().await.unwrap(), SignalState::Open);
        }

        let flipping = RandomSignal::seeded(1.0, 1);
        assert_eq!(flipping.read_discrete().await.unwrap(), SignalState::Closed);
        assert_eq!(flipping.read_discrete().await.unwrap(), SignalState::Open);
    }

    #[tokio::test]
    async fn test_simulated_climate_stays_in_range() {
        let climate = SimulatedClimate::seeded(&[1, 2], 42);
        for _ in 0..100 {
            let batch = climate.read_continuous().await.unwrap();
            assert_eq!(batch.len(), 2);
            assert_eq!(batch[0].sensor_id, 1);
            assert_eq!(batch[1].sensor_id, 2);
            assert!(batch.iter().all(|r| (10.0..=35.0).contains(&r.temperature)));
            assert!(batch.iter().all(|r| (20.0..=90.0).contains(&r.humidity)));
        }
    }
}
