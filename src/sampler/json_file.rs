//! Climate sensor files written by the external DHT reader.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::sampler::ContinuousSampler;
use crate::{PollError, SensorReading};

/// On-disk payload, one file per sensor.
#[derive(Debug, Deserialize)]
struct RawReading {
    temperature_c: f64,
    humidity: f64,
    /// Unix seconds, possibly fractional.
    timestamp: f64,
}

/// Reads `sensor<id>.json` for every configured sensor id.
///
/// The batch fails as a whole if any sensor file is missing or malformed.
#[derive(Debug, Clone)]
pub struct JsonFileSampler {
    dir: PathBuf,
    sensor_ids: Vec<i64>,
}

impl JsonFileSampler {
    pub fn new(dir: impl AsRef<Path>, sensor_ids: Vec<i64>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            sensor_ids,
        }
    }

    fn file_for(&self, sensor_id: i64) -> PathBuf {
        self.dir.join(format!("sensor{}.json", sensor_id))
    }

    async fn read_sensor(&self, sensor_id: i64) -> Result<SensorReading, PollError> {
        let path = self.file_for(sensor_id);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| PollError::Sampler(format!("cannot read {}: {}", path.display(), e)))?;
        let parsed: RawReading = serde_json::from_str(&raw)
            .map_err(|e| PollError::Sampler(format!("malformed {}: {}", path.display(), e)))?;

        let timestamp = to_datetime(parsed.timestamp).ok_or_else(|| {
            PollError::Sampler(format!(
                "timestamp {} in {} is out of range",
                parsed.timestamp,
                path.display()
            ))
        })?;
        Ok(SensorReading::new(
            sensor_id,
            parsed.temperature_c,
            parsed.humidity,
            timestamp,
        ))
    }
}

fn to_datetime(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    DateTime::from_timestamp_micros((seconds * 1_000_000.0).round() as i64)
}

#[async_trait]
impl ContinuousSampler for JsonFileSampler {
    async fn read_continuous(&self) -> Result<Vec<SensorReading>, PollError> {
        let mut batch = Vec::with_capacity(self.sensor_ids.len());
        for &sensor_id in &self.sensor_ids {
            batch.push(self.read_sensor(sensor_id).await?);
        }
        Ok(batch)
    }
}
