//! Repository traits consumed by the pollers and the cleanup coordinator,
//! plus their SQLite implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::storage::db::SqlitePool;
use crate::storage::types::{from_micros, to_micros};
use crate::storage::{ButtonEvent, ReadingRef, StorageError, WeatherRecord};

/// Persistence for continuous readings and discrete button events.
#[async_trait]
pub trait EventStore: Send + Sync + 'static {
    /// Persist one continuous reading.
    async fn append(
        &self,
        sensor_id: i64,
        temperature: f64,
        humidity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Persist one completed button press.
    async fn append_event(
        &self,
        button_id: i64,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError>;

    /// Button events ordered oldest first.
    async fn page_events(&self, offset: usize, limit: usize)
    -> Result<Vec<ButtonEvent>, StorageError>;

    /// Readings with `start <= timestamp <= end`.
    async fn readings_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ReadingRef>, StorageError>;

    /// Delete one reading by id. Deleting a missing id is not an error.
    async fn delete_reading(&self, id: i64) -> Result<(), StorageError>;
}

/// Persistence for weather observations.
#[async_trait]
pub trait WeatherStore: Send + Sync + 'static {
    async fn save_weather(&self, record: &WeatherRecord) -> Result<(), StorageError>;
}

/// SQLite-backed [`EventStore`] and [`WeatherStore`].
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Wrap a pool whose schema is already initialized.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Timestamp of the newest reading stored for a sensor.
    pub async fn last_reading_at(
        &self,
        sensor_id: i64,
    ) -> Result<Option<DateTime<Utc>>, StorageError> {
        let row: (Option<i64>,) = sqlx::query_as("SELECT MAX(ts) FROM readings WHERE sensor_id = ?")
            .bind(sensor_id)
            .fetch_one(self.pool.inner())
            .await?;
        row.0.map(from_micros).transpose()
    }

    /// Number of stored readings, logged at startup.
    pub async fn count_readings(&self) -> Result<i64, StorageError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM readings")
            .fetch_one(self.pool.inner())
            .await?;
        Ok(row.0)
    }

    /// Most recent weather observation.
    pub async fn latest_weather(&self) -> Result<Option<WeatherRecord>, StorageError> {
        let row: Option<(i64, i64, String, f64, f64, f64, f64, f64)> = sqlx::query_as(
            "SELECT id, ts, name, lat, lon, temperature, humidity, feels_like
             FROM weather_data ORDER BY ts DESC, id DESC LIMIT 1",
        )
        .fetch_optional(self.pool.inner())
        .await?;

        row.map(|(id, ts, name, lat, lon, temperature, humidity, feels_like)| {
            Ok(WeatherRecord {
                id: Some(id),
                time: from_micros(ts)?,
                name,
                lat,
                lon,
                temperature,
                humidity,
                feels_like,
            })
        })
        .transpose()
    }

    /// Close the underlying pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

fn to_limit(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

#[async_trait]
impl EventStore for SqliteStore {
    async fn append(
        &self,
        sensor_id: i64,
        temperature: f64,
        humidity: f64,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO readings (sensor_id, temperature, humidity, ts) VALUES (?, ?, ?, ?)",
        )
        .bind(sensor_id)
        .bind(temperature)
        .bind(humidity)
        .bind(to_micros(timestamp))
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    async fn append_event(
        &self,
        button_id: i64,
        started_at: DateTime<Utc>,
        ended_at: DateTime<Utc>,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO button_readings (button_id, started_at, ended_at) VALUES (?, ?, ?)",
        )
        .bind(button_id)
        .bind(to_micros(started_at))
        .bind(to_micros(ended_at))
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }

    async fn page_events(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ButtonEvent>, StorageError> {
        let rows: Vec<(i64, i64, i64, i64)> = sqlx::query_as(
            "SELECT id, button_id, started_at, ended_at FROM button_readings
             ORDER BY started_at ASC, id ASC LIMIT ? OFFSET ?",
        )
        .bind(to_limit(limit))
        .bind(to_limit(offset))
        .fetch_all(self.pool.inner())
        .await?;

        rows.into_iter()
            .map(|(id, button_id, started_at, ended_at)| {
                Ok(ButtonEvent {
                    id: Some(id),
                    button_id,
                    started_at: from_micros(started_at)?,
                    ended_at: from_micros(ended_at)?,
                })
            })
            .collect()
    }

    async fn readings_in_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<ReadingRef>, StorageError> {
        let rows: Vec<(i64, i64)> = sqlx::query_as(
            "SELECT id, ts FROM readings WHERE ts >= ? AND ts <= ? ORDER BY ts ASC, id ASC",
        )
        .bind(to_micros(start))
        .bind(to_micros(end))
        .fetch_all(self.pool.inner())
        .await?;

        rows.into_iter()
            .map(|(id, ts)| {
                Ok(ReadingRef {
                    id,
                    timestamp: from_micros(ts)?,
                })
            })
            .collect()
    }

    async fn delete_reading(&self, id: i64) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM readings WHERE id = ?")
            .bind(id)
            .execute(self.pool.inner())
            .await?;
        Ok(())
    }
}

#[async_trait]
impl WeatherStore for SqliteStore {
    async fn save_weather(&self, record: &WeatherRecord) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO weather_data (ts, name, lat, lon, temperature, humidity, feels_like)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(to_micros(record.time))
        .bind(&record.name)
        .bind(record.lat)
        .bind(record.lon)
        .bind(record.temperature)
        .bind(record.humidity)
        .bind(record.feels_like)
        .execute(self.pool.inner())
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageBuilder;
    use chrono::TimeDelta;

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    async fn store() -> SqliteStore {
        StorageBuilder::in_memory().build().await.unwrap()
    }

    #[tokio::test]
    async fn test_append_and_window_query() {
        let store = store().await;
        for minutes in [-1, 0, 5, 12, 13] {
            store
                .append(1, 20.0, 50.0, t0() + TimeDelta::minutes(minutes))
                .await
                .unwrap();
        }

        let hits = store
            .readings_in_window(t0(), t0() + TimeDelta::minutes(12))
            .await
            .unwrap();
        let stamps: Vec<_> = hits.iter().map(|r| r.timestamp).collect();
        assert_eq!(
            stamps,
            vec![
                t0(),
                t0() + TimeDelta::minutes(5),
                t0() + TimeDelta::minutes(12)
            ]
        );

        store.delete_reading(hits[0].id).await.unwrap();
        // Deleting twice is fine
        store.delete_reading(hits[0].id).await.unwrap();
        assert_eq!(store.count_readings().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_page_events_oldest_first() {
        let store = store().await;
        for minutes in [30, 10, 20] {
            let start = t0() + TimeDelta::minutes(minutes);
            store
                .append_event(1, start, start + TimeDelta::seconds(8))
                .await
                .unwrap();
        }

        let first = store.page_events(0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].started_at, t0() + TimeDelta::minutes(10));
        assert_eq!(first[1].started_at, t0() + TimeDelta::minutes(20));
        assert_eq!(first[0].duration(), TimeDelta::seconds(8));

        let second = store.page_events(2, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert!(store.page_events(3, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_latest_queries() {
        let store = store().await;
        assert!(store.last_reading_at(1).await.unwrap().is_none());
        assert!(store.latest_weather().await.unwrap().is_none());

        store.append(1, 19.0, 40.0, t0()).await.unwrap();
        store
            .append(1, 19.5, 41.0, t0() + TimeDelta::seconds(30))
            .await
            .unwrap();
        store.append(2, 22.0, 55.0, t0()).await.unwrap();

        assert_eq!(
            store.last_reading_at(1).await.unwrap(),
            Some(t0() + TimeDelta::seconds(30))
        );
        assert_eq!(store.count_readings().await.unwrap(), 3);

        let record = WeatherRecord {
            id: None,
            time: t0(),
            name: "Home".to_string(),
            lat: 52.52,
            lon: 13.40,
            temperature: 7.5,
            humidity: 81.0,
            feels_like: 5.2,
        };
        store.save_weather(&record).await.unwrap();
        let saved = store.latest_weather().await.unwrap().unwrap();
        assert!(saved.id.is_some());
        assert_eq!(saved.name, "Home");
        assert_eq!(saved.feels_like, 5.2);
    }
}
