//! Poller Layer
//!
//! Scheduling engine shared by every data source. Each poller runs on its own
//! Tokio task and fires its action at a restartable interval.
//!
//! # Architecture
//!
//! - [`PeriodicTask`]: Restartable, cancelable repeating loop
//! - [`TaskAction`]: Unit of work fired on every tick
//! - [`BackoffPolicy`]: Stretches the interval while an action keeps failing
//! - [`PollerRegistry`]: Named pollers plus the pause/resume hooks used by cleanup
//!
//! # Example
//!
//! ```rust,no_run
//! use homewatch::poller::{FnAction, Poller, PollerRegistry};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn demo() -> Result<(), homewatch::PollError> {
//! let registry = PollerRegistry::new();
//! let action = Arc::new(FnAction(|| async { Ok::<(), homewatch::PollError>(()) }));
//! registry
//!     .register(Poller::new("heartbeat", action, Duration::from_secs(10), true))
//!     .await?;
//! registry.start_all().await?;
//! let pause = registry.pause_hook(["heartbeat"]);
//! pause().await?;
//! # Ok(())
//! # }
//! ```

mod backoff;
mod registry;
mod task;
mod traits;

pub use backoff::{
    BackoffConfig, BackoffPolicy, BackoffState, DEFAULT_COOLDOWN_FACTOR,
    DEFAULT_FAILURE_THRESHOLD, DEFAULT_RETRY_INTERVAL,
};
pub use registry::{Poller, PollerInfo, PollerRegistry};
pub use task::{IntervalHandle, PeriodicTask};
pub use traits::{FnAction, Hook, HookFuture, HookStage, PollError, TaskAction};
