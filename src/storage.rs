//! Storage Layer
//!
//! SQLite persistence for readings, button events and weather observations,
//! reached through narrow repository traits so pollers and the cleanup
//! coordinator never see SQL.
//!
//! # Components
//!
//! - [`EventStore`]: Continuous readings and button events, plus the queries the retention sweep needs
//! - [`WeatherStore`]: Weather observations
//! - [`SqliteStore`]: sqlx-backed implementation of both
//! - [`MemoryStore`]: In-memory implementation with failure injection
//! - [`StorageBuilder`]: Pool setup and schema initialization

mod builder;
pub mod db;
mod error;
mod memory;
mod schema;
mod store;
mod types;

pub use builder::StorageBuilder;
pub use error::StorageError;
pub use memory::MemoryStore;
pub use store::{EventStore, SqliteStore, WeatherStore};
pub use types::{ButtonEvent, ReadingRef, SensorReading, WeatherRecord};
