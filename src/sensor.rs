//! Continuous sensor poller action.
//!
//! Reads one batch per firing and persists every reading that is newer than
//! the last one stored for the same sensor. The external DHT reader rewrites
//! its files only every few seconds, so most firings see repeats.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::poller::{PollError, TaskAction};
use crate::sampler::ContinuousSampler;
use crate::EventStore;

/// Persists fresh readings from a [`ContinuousSampler`].
pub struct SensorAction {
    sampler: Arc<dyn ContinuousSampler>,
    store: Arc<dyn EventStore>,
    last_seen: Mutex<HashMap<i64, DateTime<Utc>>>,
}

impl SensorAction {
    pub fn new(sampler: Arc<dyn ContinuousSampler>, store: Arc<dyn EventStore>) -> Self {
        Self {
            sampler,
            store,
            last_seen: Mutex::new(HashMap::new()),
        }
    }

    /// Seed the per-sensor high-water marks, e.g. from the database at startup.
    pub fn with_last_seen(self, last_seen: HashMap<i64, DateTime<Utc>>) -> Self {
        *self.last_seen.lock().unwrap_or_else(PoisonError::into_inner) = last_seen;
        self
    }

    /// Timestamp of the newest stored reading of a sensor.
    pub fn last_seen(&self, sensor_id: i64) -> Option<DateTime<Utc>> {
        self.last_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&sensor_id)
            .copied()
    }

    /// Read and store one batch. Returns how many readings were persisted.
    ///
    /// # Errors
    /// Fails on a sampler error, or on the first reading that cannot be
    /// stored; readings stored before it stay stored.
    pub async fn poll_once(&self) -> Result<usize, PollError> {
        let batch = self.sampler.read_continuous().await?;
        let mut stored = 0;

        for reading in batch {
            if let Some(last) = self.last_seen(reading.sensor_id)
                && reading.timestamp <= last
            {
                tracing::trace!(sensor = reading.sensor_id, ts = %reading.timestamp, "Reading already stored");
                continue;
            }

            self.store
                .append(
                    reading.sensor_id,
                    reading.temperature,
                    reading.humidity,
                    reading.timestamp,
                )
                .await?;
            self.last_seen
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(reading.sensor_id, reading.timestamp);
            stored += 1;
        }

        if stored > 0 {
            tracing::debug!(stored, "Sensor readings stored");
        }
        Ok(stored)
    }
}

#[async_trait]
impl TaskAction for SensorAction {
    async fn run(&self) -> Result<(), PollError> {
        self.poll_once().await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryStore, SensorReading};
    use chrono::TimeDelta;
    use std::collections::VecDeque;

    struct Batches(Mutex<VecDeque<Vec<SensorReading>>>);

    #[async_trait]
    impl ContinuousSampler for Batches {
        async fn read_continuous(&self) -> Result<Vec<SensorReading>, PollError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| PollError::Sampler("no data".to_string()))
        }
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_skips_stale_readings() {
        let t1 = t0() + TimeDelta::seconds(4);
        let sampler = Arc::new(Batches(Mutex::new(VecDeque::from([
            vec![
                SensorReading::new(1, 20.0, 50.0, t0()),
                SensorReading::new(2, 22.0, 45.0, t0()),
            ],
            vec![
                SensorReading::new(1, 20.0, 50.0, t0()),
                SensorReading::new(2, 22.5, 46.0, t1),
            ],
        ]))));
        let store = Arc::new(MemoryStore::new());
        let action = SensorAction::new(sampler, store.clone());

        assert_eq!(action.poll_once().await.unwrap(), 2);
        assert_eq!(action.poll_once().await.unwrap(), 1);
        assert_eq!(store.readings().len(), 3);
        assert_eq!(action.last_seen(2), Some(t1));
        assert!(action.poll_once().await.is_err());
    }

    #[tokio::test]
    async fn test_seeded_high_water_mark() {
        let sampler = Arc::new(Batches(Mutex::new(VecDeque::from([vec![
            SensorReading::new(1, 20.0, 50.0, t0()),
        ]]))));
        let store = Arc::new(MemoryStore::new());
        let action =
            SensorAction::new(sampler, store.clone()).with_last_seen(HashMap::from([(1, t0())]));

        assert_eq!(action.poll_once().await.unwrap(), 0);
        assert!(store.readings().is_empty());
    }

    #[tokio::test]
    async fn test_failed_append_does_not_advance_mark() {
        let sampler = Arc::new(Batches(Mutex::new(VecDeque::from([
            vec![SensorReading::new(1, 20.0, 50.0, t0())],
            vec![SensorReading::new(1, 20.0, 50.0, t0())],
        ]))));
        let store = Arc::new(MemoryStore::new());
        let action = SensorAction::new(sampler, store.clone());

        store.set_fail_appends(true);
        assert!(matches!(
            action.poll_once().await,
            Err(PollError::Storage(_))
        ));
        assert_eq!(action.last_seen(1), None);

        store.set_fail_appends(false);
        assert_eq!(action.poll_once().await.unwrap(), 1);
    }
}
