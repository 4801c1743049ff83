//! Weather Layer
//!
//! Fetches current outdoor conditions and stores them. The poller wraps
//! [`WeatherAction`] in a [`BackoffPolicy`](crate::poller::BackoffPolicy),
//! so an unreachable service is retried quickly a few times and then
//! polled at a slower cooldown pace.

mod action;
mod openweather;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::PollError;

pub use action::WeatherAction;
pub use openweather::{DEFAULT_BASE_URL, OpenWeatherClient};

/// Current conditions at a location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub lat: f64,
    pub lon: f64,
    /// Observation time reported by the service.
    pub observed_at: DateTime<Utc>,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Percent.
    pub humidity: f64,
    /// Degrees Celsius.
    pub feels_like: f64,
}

/// Provider of current weather conditions.
#[async_trait]
pub trait WeatherSource: Send + Sync + 'static {
    async fn current(&self) -> Result<WeatherReport, PollError>;
}
