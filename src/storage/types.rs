//! Core data types for the storage layer.
//!
//! - [`SensorReading`]: Continuous climate sample (temperature + humidity)
//! - [`ButtonEvent`]: Completed push/release pair of a discrete source
//! - [`ReadingRef`]: Lightweight id/timestamp pair used by the retention sweep
//! - [`WeatherRecord`]: Current outdoor conditions from the weather service

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// A continuous reading stored in the `readings` table.
///
/// # Example
///
/// ```
/// use homewatch::SensorReading;
/// use chrono::Utc;
///
/// let reading = SensorReading::new(1, 21.5, 48.0, Utc::now());
/// assert!(reading.id.is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    /// Auto-generated row identifier.
    pub id: Option<i64>,
    /// Source sensor.
    pub sensor_id: i64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// When the sensor took the sample (UTC).
    pub timestamp: DateTime<Utc>,
}

impl SensorReading {
    pub fn new(sensor_id: i64, temperature: f64, humidity: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: None,
            sensor_id,
            temperature,
            humidity,
            timestamp,
        }
    }
}

/// A completed button press stored in the `button_readings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonEvent {
    /// Auto-generated row identifier.
    pub id: Option<i64>,
    /// Source button.
    pub button_id: i64,
    /// Push timestamp.
    pub started_at: DateTime<Utc>,
    /// Release timestamp.
    pub ended_at: DateTime<Utc>,
}

impl ButtonEvent {
    pub fn new(button_id: i64, started_at: DateTime<Utc>, ended_at: DateTime<Utc>) -> Self {
        Self {
            id: None,
            button_id,
            started_at,
            ended_at,
        }
    }

    /// Time between push and release.
    pub fn duration(&self) -> TimeDelta {
        self.ended_at - self.started_at
    }

    /// Inclusive `[started_at, ended_at + grace]` window of readings tied to
    /// this press.
    pub fn retention_window(&self, grace: TimeDelta) -> (DateTime<Utc>, DateTime<Utc>) {
        (self.started_at, self.ended_at + grace)
    }
}

/// Identifier and timestamp of a stored reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingRef {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
}

/// Outdoor conditions stored in the `weather_data` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    /// Auto-generated row identifier.
    pub id: Option<i64>,
    /// Observation time reported by the service.
    pub time: DateTime<Utc>,
    /// Location label.
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    /// Temperature in degrees Celsius.
    pub temperature: f64,
    /// Relative humidity in percent.
    pub humidity: f64,
    /// Perceived temperature in degrees Celsius.
    pub feels_like: f64,
}

/// Encode a timestamp as integer microseconds since the Unix epoch.
pub(crate) fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

/// Decode a timestamp stored as integer microseconds.
pub(crate) fn from_micros(micros: i64) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| StorageError::InvalidData(format!("timestamp out of range: {}", micros)))
}
