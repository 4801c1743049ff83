//! Homewatch - Home Telemetry Poller
//!
//! This crate provides the polling and lifecycle scheduling engine behind the
//! `homewatch` binary. It samples a push button, climate sensors, and a
//! weather service on independent intervals, stores what it sees in SQLite,
//! and periodically sweeps sensor readings that were taken while the button
//! was held down.
//!
//! # Architecture
//!
//! - **Poller**: Restartable periodic tasks, failure backoff, and a named registry
//! - **Button**: Edge detection on a discrete signal and press recording
//! - **Sampler**: File-backed and simulated signal sources
//! - **Sensor / Weather**: Continuous readings and remote observations
//! - **Cleanup**: Paged retention sweep wrapped in before/after hooks
//! - **Storage**: SQLite persistence plus an in-memory store for tests
//!
//! # Example
//!
//! ```rust,no_run
//! use homewatch::StorageBuilder;
//! use homewatch::cleanup::CleanupCoordinator;
//! use homewatch::poller::PollerRegistry;
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(StorageBuilder::new("./homewatch.db").build().await?);
//! let registry = PollerRegistry::new();
//! let cleanup = CleanupCoordinator::builder(store)
//!     .before_cleanup(registry.pause_hook(["button"]))
//!     .after_cleanup(registry.resume_hook(["button"]))
//!     .build()?;
//! let report = cleanup.run_cycle().await?;
//! println!("deleted {} readings", report.readings_deleted);
//! # Ok(())
//! # }
//! ```

pub mod button;
pub mod cleanup;
pub mod config;
pub mod poller;
pub mod sampler;
pub mod sensor;
pub mod storage;
pub mod weather;

pub use cleanup::{CleanupCoordinator, SweepReport};
pub use config::AppConfig;
pub use poller::PollError;
pub use storage::{
    ButtonEvent, EventStore, MemoryStore, ReadingRef, SensorReading, SqliteStore, StorageBuilder,
    StorageError, WeatherRecord, WeatherStore,
};
