//! Per-poller configuration sections.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::button::DEFAULT_MIN_PRESS;
use crate::cleanup::{DEFAULT_GRACE_PERIOD, DEFAULT_PAGE_SIZE};
use crate::poller::BackoffConfig;

use super::validation::ConfigError;

// =============================================================================
// Defaults
// =============================================================================

/// Default button sampling interval.
pub const DEFAULT_BUTTON_INTERVAL: Duration = Duration::from_secs(10);

/// Default climate sensor interval.
pub const DEFAULT_SENSOR_INTERVAL: Duration = Duration::from_secs(60);

/// Default weather interval.
pub const DEFAULT_WEATHER_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Default weather request timeout.
pub const DEFAULT_WEATHER_TIMEOUT: Duration = Duration::from_secs(10);

/// Default retention sweep interval.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

fn default_true() -> bool {
    true
}

fn default_button_id() -> i64 {
    1
}

fn default_button_interval() -> Duration {
    DEFAULT_BUTTON_INTERVAL
}

fn default_min_press() -> Duration {
    DEFAULT_MIN_PRESS
}

fn default_value_file() -> String {
    "/sys/class/gpio/gpio24/value".to_string()
}

fn default_sensor_interval() -> Duration {
    DEFAULT_SENSOR_INTERVAL
}

fn default_sensor_ids() -> Vec<i64> {
    vec![1, 2]
}

fn default_sensor_dir() -> String {
    "/run/homewatch".to_string()
}

fn default_weather_interval() -> Duration {
    DEFAULT_WEATHER_INTERVAL
}

fn default_weather_timeout() -> Duration {
    DEFAULT_WEATHER_TIMEOUT
}

fn default_location() -> String {
    "Home".to_string()
}

fn default_lang() -> String {
    "de".to_string()
}

fn default_cleanup_interval() -> Duration {
    DEFAULT_CLEANUP_INTERVAL
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_grace_period() -> Duration {
    DEFAULT_GRACE_PERIOD
}

fn require_positive(name: &str, interval: Duration) -> Result<(), ConfigError> {
    if interval.is_zero() {
        return Err(ConfigError::ValidationError(format!(
            "{} must be greater than zero",
            name
        )));
    }
    Ok(())
}

// =============================================================================
// Button
// =============================================================================

/// Discrete button poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ButtonConfig {
    /// Enable the poller (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Identifier stored with every press (default: 1).
    #[serde(default = "default_button_id")]
    pub id: i64,

    /// Sampling interval (default: 10s).
    #[serde(default = "default_button_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Presses must last longer than this to be stored (default: 5s).
    #[serde(default = "default_min_press", with = "humantime_serde")]
    pub min_press: Duration,

    /// GPIO value file to sample.
    #[serde(default = "default_value_file")]
    pub value_file: String,
}

impl Default for ButtonConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            id: default_button_id(),
            interval: DEFAULT_BUTTON_INTERVAL,
            min_press: DEFAULT_MIN_PRESS,
            value_file: default_value_file(),
        }
    }
}

impl ButtonConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("button interval", self.interval)?;
        if self.enabled && self.value_file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "button value_file cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Climate sensors
// =============================================================================

/// Continuous climate sensor poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorsConfig {
    /// Enable the poller (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Polling interval (default: 60s).
    #[serde(default = "default_sensor_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Poll once right after start (default: true).
    #[serde(default = "default_true")]
    pub immediate: bool,

    /// Sensor ids; each is read from `sensor<id>.json` (default: [1, 2]).
    #[serde(default = "default_sensor_ids")]
    pub ids: Vec<i64>,

    /// Directory holding the sensor files.
    #[serde(default = "default_sensor_dir")]
    pub dir: String,
}

impl Default for SensorsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: DEFAULT_SENSOR_INTERVAL,
            immediate: true,
            ids: default_sensor_ids(),
            dir: default_sensor_dir(),
        }
    }
}

impl SensorsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("sensors interval", self.interval)?;
        if self.enabled && self.ids.is_empty() {
            return Err(ConfigError::ValidationError(
                "sensors ids cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for id in &self.ids {
            if !seen.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate sensor id: {}",
                    id
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Weather
// =============================================================================

/// Weather poller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeatherConfig {
    /// Enable the poller (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// OpenWeather API key, usually `${OPEN_WEATHER_API_KEY}`.
    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub lat: f64,

    #[serde(default)]
    pub lon: f64,

    /// Name stored with each observation (default: "Home").
    #[serde(default = "default_location")]
    pub location: String,

    /// Response language (default: "de").
    #[serde(default = "default_lang")]
    pub lang: String,

    /// Nominal polling interval (default: 30m).
    #[serde(default = "default_weather_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Request timeout (default: 10s).
    #[serde(default = "default_weather_timeout", with = "humantime_serde")]
    pub timeout: Duration,

    /// Retry behavior while the service keeps failing.
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for WeatherConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            lat: 0.0,
            lon: 0.0,
            location: default_location(),
            lang: default_lang(),
            interval: DEFAULT_WEATHER_INTERVAL,
            timeout: DEFAULT_WEATHER_TIMEOUT,
            backoff: BackoffConfig::default(),
        }
    }
}

impl WeatherConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("weather interval", self.interval)?;
        require_positive("weather timeout", self.timeout)?;
        self.backoff
            .validate(self.interval)
            .map_err(|e| ConfigError::ValidationError(format!("weather {}", e)))?;

        if !(-90.0..=90.0).contains(&self.lat) {
            return Err(ConfigError::ValidationError(format!(
                "weather lat {} out of range [-90, 90]",
                self.lat
            )));
        }
        if !(-180.0..=180.0).contains(&self.lon) {
            return Err(ConfigError::ValidationError(format!(
                "weather lon {} out of range [-180, 180]",
                self.lon
            )));
        }
        if self.enabled && self.api_key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "weather is enabled but api_key is empty".to_string(),
            ));
        }
        Ok(())
    }
}

// =============================================================================
// Cleanup
// =============================================================================

/// Retention cleanup coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Enable the coordinator (default: false).
    #[serde(default)]
    pub enabled: bool,

    /// Sweep interval (default: 24h).
    #[serde(default = "default_cleanup_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Sweep right after start (default: true).
    #[serde(default = "default_true")]
    pub run_immediately: bool,

    /// Button events fetched per page (default: 10).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Readings up to this long after a release are removed too (default: 10m).
    #[serde(default = "default_grace_period", with = "humantime_serde")]
    pub grace_period: Duration,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            interval: DEFAULT_CLEANUP_INTERVAL,
            run_immediately: true,
            page_size: DEFAULT_PAGE_SIZE,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }
}

impl CleanupConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("cleanup interval", self.interval)?;
        if self.page_size == 0 {
            return Err(ConfigError::ValidationError(
                "cleanup page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        ButtonConfig::default().validate().unwrap();
        SensorsConfig::default().validate().unwrap();
        WeatherConfig::default().validate().unwrap();
        CleanupConfig::default().validate().unwrap();
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = ButtonConfig {
            interval: Duration::ZERO,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("button interval"));
    }

    #[test]
    fn test_duplicate_sensor_ids_rejected() {
        let config = SensorsConfig {
            ids: vec![1, 2, 1],
            ..Default::default()
        };
        assert!(
            config
                .validate()
                .unwrap_err()
                .to_string()
                .contains("duplicate sensor id: 1")
        );
    }

    #[test]
    fn test_weather_requires_api_key_when_enabled() {
        let mut config = WeatherConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.api_key = "abc".to_string();
        config.validate().unwrap();

        config.lat = 91.0;
        assert!(config.validate().unwrap_err().to_string().contains("lat"));
    }

    #[test]
    fn test_weather_backoff_checked_against_interval() {
        let config = WeatherConfig {
            interval: Duration::from_secs(1),
            ..Default::default()
        };
        // Retry of 2s is not shorter than a 2s cooldown
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_cleanup_page_size() {
        let config = CleanupConfig {
            page_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_sections_with_defaults() {
        let yaml = r#"
interval: 5s
min_press: 3s
"#;
        let button: ButtonConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(button.enabled);
        assert_eq!(button.interval, Duration::from_secs(5));
        assert_eq!(button.min_press, Duration::from_secs(3));

        let yaml = r#"
enabled: true
api_key: key
backoff:
  failure_threshold: 3
  retry_interval: 10s
"#;
        let weather: WeatherConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(weather.backoff.failure_threshold, 3);
        assert_eq!(weather.backoff.retry_interval, Duration::from_secs(10));
        assert_eq!(weather.backoff.cooldown_factor, 2);
        assert_eq!(weather.interval, DEFAULT_WEATHER_INTERVAL);
    }
}
