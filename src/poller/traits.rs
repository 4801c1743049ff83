//! Core poller traits and error types.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use strum_macros::{AsRefStr, Display};
use thiserror::Error;

use crate::StorageError;

/// Which side of a maintenance cycle a hook belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum HookStage {
    /// Runs before the retention sweep (pauses pollers).
    Before,
    /// Runs after a successful sweep (resumes pollers).
    After,
}

/// Errors that can occur while polling, detecting edges or cleaning up.
#[derive(Debug, Error)]
pub enum PollError {
    /// An edge detector was fed an `Unknown` sample.
    #[error("invalid sample: signal state must be open or closed")]
    InvalidSample,

    /// A release arrived without a matching push, or ended before it started.
    #[error("out of order button event: {0}")]
    OutOfOrderEvent(String),

    /// Push and release were closer together than the minimum press duration.
    #[error("button press too short: {actual:?} is below the minimum of {minimum:?}")]
    ExcessiveFrequency { actual: Duration, minimum: Duration },

    /// The retention sweep failed partway through.
    #[error("cleanup sweep aborted after deleting {deleted} readings: {source}")]
    SweepAborted {
        deleted: usize,
        #[source]
        source: StorageError,
    },

    /// A before/after maintenance hook failed.
    #[error("{stage} cleanup hook failed: {reason}")]
    HookFailed { stage: HookStage, reason: String },

    /// A task interval must be strictly positive.
    #[error("invalid interval: {0:?} (must be greater than zero)")]
    InvalidInterval(Duration),

    /// `stop` was called on a task that is not running.
    #[error("task '{0}' is not running")]
    NotRunning(String),

    /// A sampler could not produce a value.
    #[error("sampler error: {0}")]
    Sampler(String),

    /// Persisting or reading data failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// Invalid construction parameters.
    #[error("config error: {0}")]
    Config(String),
}

/// One unit of work invoked by a [`PeriodicTask`](super::PeriodicTask) on every tick.
///
/// Implementations report failures through the returned error; the task loop
/// only logs them; it never stops because of a failed tick.
#[async_trait::async_trait]
pub trait TaskAction: Send + Sync + 'static {
    /// Perform one firing.
    async fn run(&self) -> Result<(), PollError>;
}

#[async_trait::async_trait]
impl<T: TaskAction + ?Sized> TaskAction for Arc<T> {
    async fn run(&self) -> Result<(), PollError> {
        (**self).run().await
    }
}

/// Adapter turning an async closure into a [`TaskAction`].
///
/// ```rust,no_run
/// use homewatch::poller::{FnAction, PeriodicTask};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn demo() -> Result<(), homewatch::PollError> {
/// let task = PeriodicTask::new("heartbeat");
/// let action = Arc::new(FnAction(|| async {
///     tracing::info!("tick");
///     Ok::<(), homewatch::PollError>(())
/// }));
/// task.start(action, Duration::from_secs(5), true)?;
/// # Ok(())
/// # }
/// ```
pub struct FnAction<F>(pub F);

#[async_trait::async_trait]
impl<F, Fut> TaskAction for FnAction<F>
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PollError>> + Send + 'static,
{
    async fn run(&self) -> Result<(), PollError> {
        (self.0)().await
    }
}

/// Future returned by a maintenance hook.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), PollError>> + Send>>;

/// Caller-supplied pause/resume callback.
pub type Hook = Arc<dyn Fn() -> HookFuture + Send + Sync>;
