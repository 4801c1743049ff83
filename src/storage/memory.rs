//! In-memory store with failure injection.
//!
//! Implements the same repository traits as [`SqliteStore`](super::SqliteStore)
//! without touching disk, and can be told to fail appends or to abort
//! deletions after a number of successes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::{
    ButtonEvent, EventStore, ReadingRef, SensorReading, StorageError, WeatherRecord, WeatherStore,
};

#[derive(Debug, Default)]
struct Tables {
    readings: Vec<SensorReading>,
    events: Vec<ButtonEvent>,
    weather: Vec<WeatherRecord>,
    next_id: i64,
    /// Remaining deletions before an injected failure.
    deletes_left: Option<usize>,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    fail_appends: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make every append fail until switched off again.
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    /// Let `n` more deletions succeed, then fail every following one.
    pub fn fail_deletes_after(&self, n: usize) {
        self.lock().deletes_left = Some(n);
    }

    /// Snapshot of stored readings in insertion order.
    pub fn readings(&self) -> Vec<SensorReading> {
        self.lock().readings.clone()
    }

    /// Snapshot of stored button events in insertion order.
    pub fn events(&self) -> Vec<ButtonEvent> {
        self.lock().events.clone()
    }

    pub fn weather(&self) -> Vec<WeatherRecord> {
        self.lock().weather.clone()
    }

    fn check_appends(&self) -> Result<(), StorageError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("append failure injected".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn append(
        &self,
        sensor_id: i64,
        temperature: f64,
        humidity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_appends()?;
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.readings.push(SensorReading {
            id: Some(id),
            ..SensorReading::new(sensor_id, temperature, humidity, timestamp)
        });
        Ok(())
    }

    async fn append_event(
        &self,
        button_id: i64,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        self.check_appends()?;
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.events.push(ButtonEvent {
            id: Some(id),
            ..ButtonEvent::new(button_id, started_at, ended_at)
        });
        Ok(())
    }

    async fn page_events(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ButtonEvent>, StorageError> {
        let mut events = self.events();
        events.sort_by_key(|e| (e.started_at, e.id));
        Ok(events.into_iter().skip(offset).take(limit).collect())
    }

    async fn readings_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ReadingRef>, StorageError> {
        let mut hits: Vec<ReadingRef> = self
            .lock()
            .readings
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .filter_map(|r| {
                r.id.map(|id| ReadingRef {
                    id,
                    timestamp: r.timestamp,
                })
            })
            .collect();
        hits.sort_by_key(|r| (r.timestamp, r.id));
        Ok(hits)
    }

    async fn delete_reading(&self, id: i64) -> Result<(), StorageError> {
        let mut tables = self.lock();
        if let Some(left) = tables.deletes_left.as_mut() {
            if *left == 0 {
                return Err(StorageError::Internal(format!(
                    "delete failure injected for reading {}",
                    id
                )));
            }
            *left -= 1;
        }
        tables.readings.retain(|r| r.id != Some(id));
        Ok(())
    }
}

#[async_trait]
impl WeatherStore for MemoryStore {
    async fn save_weather(&self, record: &WeatherRecord) -> Result<(), StorageError> {
        self.check_appends()?;
        let mut tables = self.lock();
        let id = tables.next_id();
        tables.weather.push(WeatherRecord {
            id: Some(id),
            ..record.clone()
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[tokio::test]
    async fn test_append_failure_injection() {
        let store = MemoryStore::new();
        store.set_fail_appends(true);
        assert!(store.append(1, 20.0, 50.0, Utc::now()).await.is_err());
        assert!(store.readings().is_empty());

        store.set_fail_appends(false);
        store.append(1, 20.0, 50.0, Utc::now()).await.unwrap();
        assert_eq!(store.readings().len(), 1);
    }

    #[tokio::test]
    async fn test_delete_failure_after_n() {
        let store = MemoryStore::new();
        let now = Utc::now();
        for i in 0..3 {
            store.append(1, 20.0, 50.0, now + TimeDelta::seconds(i)).await.unwrap();
        }
        store.fail_deletes_after(1);

        let ids: Vec<_> = store.readings().iter().filter_map(|r| r.id).collect();
        store.delete_reading(ids[0]).await.unwrap();
        assert!(store.delete_reading(ids[1]).await.is_err());
        assert_eq!(store.readings().len(), 2);
    }

    #[tokio::test]
    async fn test_window_is_inclusive() {
        let store = MemoryStore::new();
        let t = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        store.append(1, 20.0, 50.0, t).await.unwrap();
        store
            .append(1, 20.0, 50.0, t + TimeDelta::minutes(12))
            .await
            .unwrap();
        store
            .append(1, 20.0, 50.0, t + TimeDelta::minutes(13))
            .await
            .unwrap();

        let hits = store
            .readings_in_window(t, t + TimeDelta::minutes(12))
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }
}
