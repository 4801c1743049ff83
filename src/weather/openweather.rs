//! OpenWeather One Call client.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;

use crate::PollError;
use crate::weather::{WeatherReport, WeatherSource};

/// One Call 3.0 endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org/data/3.0/onecall";

/// Only the `current` block is needed.
const EXCLUDES: &str = "minutely,hourly,daily,alerts";

const DEFAULT_LANG: &str = "de";

#[derive(Debug, Deserialize)]
struct OneCallResponse {
    lat: f64,
    lon: f64,
    current: OneCallCurrent,
}

#[derive(Debug, Deserialize)]
struct OneCallCurrent {
    dt: i64,
    temp: f64,
    humidity: f64,
    feels_like: f64,
}

impl OneCallResponse {
    fn into_report(self) -> Result<WeatherReport, PollError> {
        let observed_at = DateTime::from_timestamp(self.current.dt, 0).ok_or_else(|| {
            PollError::Sampler(format!(
                "weather timestamp out of range: {}",
                self.current.dt
            ))
        })?;
        Ok(WeatherReport {
            lat: self.lat,
            lon: self.lon,
            observed_at,
            temperature: self.current.temp,
            humidity: self.current.humidity,
            feels_like: self.current.feels_like,
        })
    }
}

/// Client for the OpenWeather One Call API (metric units).
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: String,
    lat: f64,
    lon: f64,
    lang: String,
}

impl std::fmt::Debug for OpenWeatherClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenWeatherClient")
            .field("base_url", &self.base_url)
            .field("lat", &self.lat)
            .field("lon", &self.lon)
            .field("lang", &self.lang)
            .finish_non_exhaustive()
    }
}

impl OpenWeatherClient {
    /// Create a client for one location.
    ///
    /// # Errors
    /// Returns `PollError::Config` if the HTTP client cannot be built.
    pub fn new(
        api_key: impl Into<String>,
        lat: f64,
        lon: f64,
        timeout: Duration,
    ) -> Result<Self, PollError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PollError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            lat,
            lon,
            lang: DEFAULT_LANG.to_string(),
        })
    }

    /// Point the client at another endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Language of textual fields in the response.
    pub fn with_lang(mut self, lang: impl Into<String>) -> Self {
        self.lang = lang.into();
        self
    }

    fn query(&self) -> [(&'static str, String); 6] {
        [
            ("lat", self.lat.to_string()),
            ("lon", self.lon.to_string()),
            ("exclude", EXCLUDES.to_string()),
            ("units", "metric".to_string()),
            ("lang", self.lang.clone()),
            ("appid", self.api_key.clone()),
        ]
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self) -> Result<WeatherReport, PollError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&self.query())
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| PollError::Sampler(format!("weather request failed: {}", e.without_url())))?;

        let body: OneCallResponse = response
            .json()
            .await
            .map_err(|e| PollError::Sampler(format!("weather response invalid: {}", e)))?;

        let report = body.into_report()?;
        tracing::debug!(
            temperature = report.temperature,
            humidity = report.humidity,
            observed_at = %report.observed_at,
            "Fetched current weather"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_call_response() {
        let json = r#"{
            "lat": 52.52,
            "lon": 13.405,
            "timezone": "Europe/Berlin",
            "current": {
                "dt": 1700000000,
                "temp": 7.4,
                "feels_like": 4.9,
                "humidity": 87,
                "weather": [{"id": 500, "description": "leichter Regen"}]
            }
        }"#;

        let parsed: OneCallResponse = serde_json::from_str(json).unwrap();
        let report = parsed.into_report().unwrap();
        assert_eq!(report.lat, 52.52);
        assert_eq!(report.temperature, 7.4);
        assert_eq!(report.humidity, 87.0);
        assert_eq!(report.feels_like, 4.9);
        assert_eq!(report.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_query_parameters() {
        let client = OpenWeatherClient::new("secret", 52.52, 13.405, Duration::from_secs(5))
            .unwrap()
            .with_lang("en");
        let query = client.query();

        assert!(query.contains(&("units", "metric".to_string())));
        assert!(query.contains(&("exclude", "minutely,hourly,daily,alerts".to_string())));
        assert!(query.contains(&("lang", "en".to_string())));
        assert!(query.contains(&("appid", "secret".to_string())));
        assert!(query.contains(&("lat", "52.52".to_string())));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_sampler_error() {
        let client = OpenWeatherClient::new("k", 0.0, 0.0, Duration::from_millis(500))
            .unwrap()
            .with_base_url("http://127.0.0.1:9/onecall");
        assert!(matches!(
            client.current().await,
            Err(PollError::Sampler(_))
        ));
    }

    #[test]
    fn test_debug_hides_api_key() {
        let client = OpenWeatherClient::new("secret", 1.0, 2.0, Duration::from_secs(1)).unwrap();
        assert!(!format!("{:?}", client).contains("secret"));
    }
}
