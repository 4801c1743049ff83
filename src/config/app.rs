//! Application configuration structures.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::pollers::{ButtonConfig, CleanupConfig, SensorsConfig, WeatherConfig};
use super::validation::{ConfigError, expand_env_vars};

// =============================================================================
// Constants
// =============================================================================

/// Default connection pool size.
pub const DEFAULT_POOL_SIZE: u32 = 4;

fn default_pool_size() -> u32 {
    DEFAULT_POOL_SIZE
}

fn default_db_path() -> String {
    "homewatch.db".to_string()
}

// =============================================================================
// Database Configuration
// =============================================================================

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (default: "homewatch.db").
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Connection pool size (default: 4).
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Button poller.
    #[serde(default)]
    pub button: ButtonConfig,

    /// Climate sensor poller.
    #[serde(default)]
    pub sensors: SensorsConfig,

    /// Weather poller.
    #[serde(default)]
    pub weather: WeatherConfig,

    /// Retention cleanup.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// `${VAR}` and `${VAR:-default}` references are expanded before parsing.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from a YAML string.
    ///
    /// # Errors
    /// Returns `ConfigError` if the YAML cannot be parsed or validated.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(&expand_env_vars(content))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.path.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "database path cannot be empty".to_string(),
            ));
        }

        if self.database.pool_size == 0 {
            return Err(ConfigError::ValidationError(
                "database pool_size must be positive".to_string(),
            ));
        }

        self.button.validate()?;
        self.sensors.validate()?;
        self.weather.validate()?;
        self.cleanup.validate()?;

        Ok(())
    }
}
