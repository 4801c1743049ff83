//! Sampler Layer
//!
//! Capabilities that read the current value of a monitored source. Samplers
//! never schedule themselves; a poller calls them once per firing.
//!
//! - [`ValueFileSampler`]: GPIO value file (`1`/`0`) for a button
//! - [`JsonFileSampler`]: Per-sensor JSON files written by an external DHT reader
//! - [`RandomSignal`] / [`SimulatedClimate`]: Synthetic sources for development

mod gpio;
mod json_file;
mod simulated;

use async_trait::async_trait;

use crate::button::SignalState;
use crate::{PollError, SensorReading};

pub use gpio::ValueFileSampler;
pub use json_file::JsonFileSampler;
pub use simulated::{RandomSignal, SimulatedClimate};

/// Source of one two-valued sample per read.
#[async_trait]
pub trait DiscreteSampler: Send + Sync + 'static {
    async fn read_discrete(&self) -> Result<SignalState, PollError>;
}

/// Source of a batch of readings per read.
#[async_trait]
pub trait ContinuousSampler: Send + Sync + 'static {
    async fn read_continuous(&self) -> Result<Vec<SensorReading>, PollError>;
}
