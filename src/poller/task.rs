//! Restartable periodic task.
//!
//! A [`PeriodicTask`] owns at most one background loop. The loop sleeps for
//! the current interval, fires its action, and rearms using whatever interval
//! is current at that moment, so [`PeriodicTask::reset_interval`] (used by
//! [`BackoffPolicy`](super::BackoffPolicy)) changes the pace between firings
//! without restarting the loop.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::poller::{PollError, TaskAction};

/// Shared, atomically updated interval of a running task.
///
/// Cloning yields a handle to the same value.
#[derive(Debug, Clone)]
pub struct IntervalHandle(Arc<AtomicU64>);

impl IntervalHandle {
    fn new(interval: Duration) -> Self {
        Self(Arc::new(AtomicU64::new(to_nanos(interval))))
    }

    /// Current interval.
    pub fn get(&self) -> Duration {
        Duration::from_nanos(self.0.load(Ordering::Acquire))
    }

    /// Replace the interval used when the loop next rearms.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` for a zero duration.
    pub fn set(&self, interval: Duration) -> Result<(), PollError> {
        if interval.is_zero() {
            return Err(PollError::InvalidInterval(interval));
        }
        self.0.store(to_nanos(interval), Ordering::Release);
        Ok(())
    }
}

fn to_nanos(d: Duration) -> u64 {
    d.as_nanos().min(u128::from(u64::MAX)) as u64
}

struct ActiveLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// A restartable, cancelable repeating task.
pub struct PeriodicTask {
    name: String,
    interval: IntervalHandle,
    active: Mutex<Option<ActiveLoop>>,
}

impl std::fmt::Debug for PeriodicTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeriodicTask")
            .field("name", &self.name)
            .field("interval", &self.interval.get())
            .field("running", &self.is_running())
            .finish()
    }
}

impl PeriodicTask {
    /// Create an idle task.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            interval: IntervalHandle::new(Duration::from_secs(1)),
            active: Mutex::new(None),
        }
    }

    /// Task name used in logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handle to the interval the loop rearms with.
    pub fn interval_handle(&self) -> IntervalHandle {
        self.interval.clone()
    }

    /// Interval that will be used for the next wait.
    pub fn interval(&self) -> Duration {
        self.interval.get()
    }

    /// Whether a loop is currently active.
    pub fn is_running(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Start the execution loop.
    ///
    /// With `immediate_first_run` the action fires right away, otherwise the
    /// first firing happens one full `interval` after the call. Starting a
    /// task that is already running is a no-op and returns `Ok(false)`.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` if `interval` is zero.
    pub fn start(
        &self,
        action: Arc<dyn TaskAction>,
        interval: Duration,
        immediate_first_run: bool,
    ) -> Result<bool, PollError> {
        if interval.is_zero() {
            return Err(PollError::InvalidInterval(interval));
        }

        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.is_some() {
            tracing::debug!(task = %self.name, "Task already running, start ignored");
            return Ok(false);
        }

        self.interval.set(interval)?;
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_loop(
            self.name.clone(),
            action,
            self.interval.clone(),
            immediate_first_run,
            cancel.clone(),
        ));
        *active = Some(ActiveLoop { cancel, handle });

        tracing::info!(
            task = %self.name,
            interval = ?interval,
            immediate_first_run,
            "Task started"
        );
        Ok(true)
    }

    /// Stop the loop and wait until it has exited.
    ///
    /// An action that is in flight is allowed to finish. Must not be awaited
    /// from inside the task's own action.
    ///
    /// # Errors
    /// Returns `PollError::NotRunning` if the task is not running.
    pub async fn stop(&self) -> Result<(), PollError> {
        let active = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(active) = active else {
            return Err(PollError::NotRunning(self.name.clone()));
        };

        active.cancel.cancel();
        if let Err(e) = active.handle.await {
            tracing::error!(task = %self.name, error = %e, "Task loop terminated abnormally");
        }
        tracing::info!(task = %self.name, "Task stopped");
        Ok(())
    }

    /// Change the delay before the next firing without restarting the loop.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` if `interval` is zero.
    pub fn reset_interval(&self, interval: Duration) -> Result<(), PollError> {
        self.interval.set(interval)
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        let active = self
            .active
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(active) = active {
            active.cancel.cancel();
        }
    }
}

async fn run_loop(
    name: String,
    action: Arc<dyn TaskAction>,
    interval: IntervalHandle,
    immediate_first_run: bool,
    cancel: CancellationToken,
) {
    if !immediate_first_run && !wait_tick(&cancel, interval.get()).await {
        return;
    }

    loop {
        if cancel.is_cancelled() {
            break;
        }
        fire(&name, &action).await;
        if !wait_tick(&cancel, interval.get()).await {
            break;
        }
    }

    tracing::debug!(task = %name, "Task loop exited");
}

/// Sleep for one interval. Returns `false` if cancelled before or during the wait.
async fn wait_tick(cancel: &CancellationToken, interval: Duration) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(interval) => !cancel.is_cancelled(),
    }
}

/// Run one firing, isolating errors and panics from the loop.
async fn fire(name: &str, action: &Arc<dyn TaskAction>) {
    let start = std::time::Instant::now();
    let action = Arc::clone(action);
    let result = tokio::spawn(async move { action.run().await }).await;
    let duration_ms = start.elapsed().as_millis();

    match result {
        Ok(Ok(())) => tracing::debug!(task = %name, duration_ms, "Firing completed"),
        Ok(Err(e)) => tracing::warn!(task = %name, error = %e, duration_ms, "Firing failed"),
        Err(e) if e.is_panic() => {
            tracing::error!(task = %name, duration_ms, "Firing panicked, loop continues")
        }
        Err(e) => tracing::error!(task = %name, error = %e, "Firing was cancelled"),
    }
}
