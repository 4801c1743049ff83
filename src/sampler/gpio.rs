//! GPIO value file sampler.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::PollError;
use crate::button::SignalState;
use crate::sampler::DiscreteSampler;

/// Reads a GPIO `value` file such as `/sys/class/gpio/gpio24/value`.
///
/// A high line (`1`) is `Open`, a low line (`0`) is `Closed`, anything else
/// is `Unknown`.
#[derive(Debug, Clone)]
pub struct ValueFileSampler {
    path: PathBuf,
}

impl ValueFileSampler {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn parse_level(raw: &str) -> SignalState {
    match raw.trim() {
        "1" => SignalState::Open,
        "0" => SignalState::Closed,
        _ => SignalState::Unknown,
    }
}

#[async_trait]
impl DiscreteSampler for ValueFileSampler {
    async fn read_discrete(&self) -> Result<SignalState, PollError> {
        let raw = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            PollError::Sampler(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        Ok(parse_level(&raw))
    }
}
