//! Poller registry for managing poller lifecycle.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;

use crate::poller::{Hook, HookFuture, PeriodicTask, PollError, TaskAction};

/// Metadata about a registered poller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerInfo {
    /// Poller name.
    pub name: String,
    /// Configured (nominal) interval.
    pub interval: Duration,
    /// Interval the loop will rearm with next.
    pub current_interval: Duration,
    /// Whether the poller fires on start.
    pub immediate: bool,
    /// Whether the loop is active.
    pub running: bool,
}

/// A named periodic task bound to its action.
pub struct Poller {
    task: PeriodicTask,
    action: Arc<dyn TaskAction>,
    interval: Duration,
    immediate: bool,
}

impl std::fmt::Debug for Poller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Poller")
            .field("task", &self.task)
            .field("interval", &self.interval)
            .field("immediate", &self.immediate)
            .finish_non_exhaustive()
    }
}

impl Poller {
    /// Bind `action` to a fresh task.
    pub fn new(
        name: impl Into<String>,
        action: Arc<dyn TaskAction>,
        interval: Duration,
        immediate: bool,
    ) -> Self {
        Self::with_task(PeriodicTask::new(name), action, interval, immediate)
    }

    /// Bind `action` to an existing task.
    ///
    /// Used when the action needs the task's interval handle up front, as a
    /// [`BackoffPolicy`](super::BackoffPolicy) does.
    pub fn with_task(
        task: PeriodicTask,
        action: Arc<dyn TaskAction>,
        interval: Duration,
        immediate: bool,
    ) -> Self {
        Self {
            task,
            action,
            interval,
            immediate,
        }
    }

    pub fn name(&self) -> &str {
        self.task.name()
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Start with the configured first-run behavior.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` for a zero interval.
    pub fn start(&self) -> Result<bool, PollError> {
        self.task
            .start(Arc::clone(&self.action), self.interval, self.immediate)
    }

    /// Stop the loop.
    ///
    /// # Errors
    /// Returns `PollError::NotRunning` if the poller is idle.
    pub async fn stop(&self) -> Result<(), PollError> {
        self.task.stop().await
    }

    /// Stop the loop if it is running. Returns whether it was.
    pub async fn pause(&self) -> bool {
        match self.task.stop().await {
            Ok(()) => true,
            Err(PollError::NotRunning(_)) => false,
            Err(e) => {
                tracing::warn!(poller = %self.name(), error = %e, "Pause failed");
                false
            }
        }
    }

    /// Restart after a pause. The first firing waits one full interval.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` for a zero interval.
    pub fn resume(&self) -> Result<bool, PollError> {
        self.task
            .start(Arc::clone(&self.action), self.interval, false)
    }

    pub fn info(&self) -> PollerInfo {
        PollerInfo {
            name: self.name().to_string(),
            interval: self.interval,
            current_interval: self.task.interval(),
            immediate: self.immediate,
            running: self.is_running(),
        }
    }
}

/// Registry for managing multiple pollers.
///
/// Each poller runs on its own task; the registry only tracks them by name and
/// builds the pause/resume hooks handed to the cleanup coordinator.
#[derive(Default)]
pub struct PollerRegistry {
    pollers: Arc<RwLock<HashMap<String, Arc<Poller>>>>,
}

impl std::fmt::Debug for PollerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollerRegistry")
            .field(
                "poller_count",
                &self.pollers.try_read().map(|p| p.len()).unwrap_or(0),
            )
            .finish_non_exhaustive()
    }
}

impl PollerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a poller without starting it.
    ///
    /// # Errors
    /// Returns `PollError::Config` if the name is taken.
    pub async fn register(&self, poller: Poller) -> Result<Arc<Poller>, PollError> {
        let mut pollers = self.pollers.write().await;
        let name = poller.name().to_string();
        if pollers.contains_key(&name) {
            return Err(PollError::Config(format!(
                "poller '{}' is already registered",
                name
            )));
        }

        let poller = Arc::new(poller);
        pollers.insert(name.clone(), Arc::clone(&poller));
        tracing::info!(poller = %name, interval = ?poller.interval, "Poller registered");
        Ok(poller)
    }

    /// Look up a poller by name.
    pub async fn get(&self, name: &str) -> Option<Arc<Poller>> {
        self.pollers.read().await.get(name).cloned()
    }

    /// Start every registered poller. Returns how many were started.
    ///
    /// # Errors
    /// Fails on the first poller that cannot start.
    pub async fn start_all(&self) -> Result<usize, PollError> {
        let pollers = self.pollers.read().await;
        let mut started = 0;
        for poller in pollers.values() {
            if poller.start()? {
                started += 1;
            }
        }
        tracing::info!(started, total = pollers.len(), "Pollers started");
        Ok(started)
    }

    /// List all registered pollers, sorted by name.
    pub async fn list(&self) -> Vec<PollerInfo> {
        let mut infos: Vec<_> = self
            .pollers
            .read()
            .await
            .values()
            .map(|p| p.info())
            .collect();
        infos.sort_by(|a, b| a.name.cmp(&b.name));
        infos
    }

    pub async fn len(&self) -> usize {
        self.pollers.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pollers.read().await.is_empty()
    }

    /// Stop every running poller.
    pub async fn shutdown(&self) {
        let pollers: Vec<_> = self.pollers.read().await.values().cloned().collect();
        let mut stopped = 0;
        for poller in pollers {
            if poller.pause().await {
                stopped += 1;
            }
        }
        tracing::info!(stopped, "Poller registry shutdown complete");
    }

    /// Hook that stops the named pollers, in order.
    ///
    /// Pollers that are already stopped are skipped. Names are resolved when
    /// the hook runs; an unknown name fails the hook.
    pub fn pause_hook<I, S>(&self, names: I) -> Hook
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Arc<[String]> = names.into_iter().map(Into::into).collect();
        let pollers = Arc::clone(&self.pollers);
        Arc::new(move || {
            let (names, pollers) = (Arc::clone(&names), Arc::clone(&pollers));
            Box::pin(async move {
                for poller in resolve(&pollers, &names).await? {
                    if poller.pause().await {
                        tracing::debug!(poller = %poller.name(), "Poller paused");
                    }
                }
                Ok::<(), PollError>(())
            }) as HookFuture
        })
    }

    /// Hook that restarts the named pollers, in order, without an immediate
    /// firing. Pollers that are already running are left alone.
    pub fn resume_hook<I, S>(&self, names: I) -> Hook
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Arc<[String]> = names.into_iter().map(Into::into).collect();
        let pollers = Arc::clone(&self.pollers);
        Arc::new(move || {
            let (names, pollers) = (Arc::clone(&names), Arc::clone(&pollers));
            Box::pin(async move {
                for poller in resolve(&pollers, &names).await? {
                    if poller.resume()? {
                        tracing::debug!(poller = %poller.name(), "Poller resumed");
                    }
                }
                Ok::<(), PollError>(())
            }) as HookFuture
        })
    }
}

async fn resolve(
    pollers: &RwLock<HashMap<String, Arc<Poller>>>,
    names: &[String],
) -> Result<Vec<Arc<Poller>>, PollError> {
    let pollers = pollers.read().await;
    names
        .iter()
        .map(|name| {
            pollers
                .get(name)
                .cloned()
                .ok_or_else(|| PollError::Config(format!("unknown poller '{}'", name)))
        })
        .collect()
}
