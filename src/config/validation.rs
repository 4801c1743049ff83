//! Config errors and `${VAR}` expansion.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use thiserror::Error;

/// Errors raised while loading the YAML config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// A value parsed fine but is out of range or inconsistent.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// `${NAME}` or `${NAME:-fallback}`.
static ENV_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
        .expect("env reference pattern is valid")
});

/// Replace `${NAME}` and `${NAME:-fallback}` with values from the environment.
///
/// Runs on the raw YAML text, so secrets such as the OpenWeather key stay out
/// of the file. An unset variable without a fallback becomes an empty string;
/// quote the reference when an empty value must stay a string.
pub fn expand_env_vars(input: &str) -> String {
    ENV_REFERENCE
        .replace_all(input, |caps: &Captures| {
            let fallback = caps.get(2).map_or("", |m| m.as_str());
            std::env::var(&caps[1]).unwrap_or_else(|_| fallback.to_string())
        })
        .into_owned()
}
