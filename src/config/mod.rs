//! Configuration module for homewatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Database settings (path, pool size)
//! - Poller settings (button, climate sensors, weather with backoff)
//! - Retention cleanup schedule

mod app;
mod pollers;
mod validation;

pub use app::{AppConfig, DEFAULT_POOL_SIZE, DatabaseConfig};
pub use pollers::{ButtonConfig, CleanupConfig, SensorsConfig, WeatherConfig};
pub use validation::{ConfigError, expand_env_vars};
