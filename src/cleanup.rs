//! Retention cleanup coordinator.
//!
//! Periodically deletes the continuous readings recorded while a button was
//! pressed (plus a grace period after the release). Before each sweep a
//! caller-supplied hook pauses the pollers that write readings; after a
//! successful sweep a second hook resumes them, so live inserts never race
//! with deletes in the same window.
//!
//! The coordinator knows nothing about those pollers. It only sees the two
//! hooks, typically built with [`PollerRegistry::pause_hook`] and
//! [`PollerRegistry::resume_hook`].
//!
//! [`PollerRegistry::pause_hook`]: crate::poller::PollerRegistry::pause_hook
//! [`PollerRegistry::resume_hook`]: crate::poller::PollerRegistry::resume_hook

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::TimeDelta;

use crate::poller::{Hook, HookStage, PeriodicTask, PollError, TaskAction};
use crate::{EventStore, StorageError};

/// Default number of button events fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Default time after a release whose readings are also removed.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(10 * 60);

/// Outcome of one successful sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub events_scanned: usize,
    pub readings_deleted: usize,
    pub pages: usize,
}

/// Builder for [`CleanupCoordinator`].
pub struct CleanupCoordinatorBuilder {
    store: Arc<dyn EventStore>,
    before: Option<Hook>,
    after: Option<Hook>,
    page_size: usize,
    grace_period: Duration,
}

impl CleanupCoordinatorBuilder {
    /// Hook run before every sweep. Its failure skips the cycle.
    pub fn before_cleanup(mut self, hook: Hook) -> Self {
        self.before = Some(hook);
        self
    }

    /// Hook run after every successful sweep.
    pub fn after_cleanup(mut self, hook: Hook) -> Self {
        self.after = Some(hook);
        self
    }

    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    /// # Errors
    /// Returns `PollError::Config` for a zero page size or an unrepresentable
    /// grace period.
    pub fn build(self) -> Result<CleanupCoordinator, PollError> {
        if self.page_size == 0 {
            return Err(PollError::Config(
                "cleanup page_size must be greater than zero".to_string(),
            ));
        }
        let grace = TimeDelta::from_std(self.grace_period).map_err(|_| {
            PollError::Config(format!(
                "cleanup grace_period {:?} is out of range",
                self.grace_period
            ))
        })?;

        Ok(CleanupCoordinator {
            task: PeriodicTask::new("cleanup"),
            cycle: Arc::new(CleanupCycle {
                store: self.store,
                before: self.before,
                after: self.after,
                page_size: self.page_size,
                grace,
            }),
        })
    }
}

struct CleanupCycle {
    store: Arc<dyn EventStore>,
    before: Option<Hook>,
    after: Option<Hook>,
    page_size: usize,
    grace: TimeDelta,
}

impl CleanupCycle {
    async fn run_cycle(&self) -> Result<SweepReport, PollError> {
        if let Some(hook) = &self.before {
            run_hook(hook, HookStage::Before).await?;
        }

        let report = self.sweep().await?;
        tracing::info!(
            events = report.events_scanned,
            deleted = report.readings_deleted,
            pages = report.pages,
            "Cleanup sweep finished"
        );

        if let Some(hook) = &self.after {
            run_hook(hook, HookStage::After).await?;
        }
        Ok(report)
    }

    async fn sweep(&self) -> Result<SweepReport, PollError> {
        let mut report = SweepReport::default();
        let abort =
            |deleted: usize| move |source: StorageError| PollError::SweepAborted { deleted, source };

        loop {
            let events = self
                .store
                .page_events(report.events_scanned, self.page_size)
                .await
                .map_err(abort(report.readings_deleted))?;
            if events.is_empty() {
                break;
            }
            report.pages += 1;
            report.events_scanned += events.len();

            for event in &events {
                let (start, end) = event.retention_window(self.grace);
                let readings = self
                    .store
                    .readings_in_window(start, end)
                    .await
                    .map_err(abort(report.readings_deleted))?;

                for reading in readings {
                    self.store
                        .delete_reading(reading.id)
                        .await
                        .map_err(abort(report.readings_deleted))?;
                    report.readings_deleted += 1;
                }
            }
        }

        Ok(report)
    }
}

async fn run_hook(hook: &Hook, stage: HookStage) -> Result<(), PollError> {
    hook().await.map_err(|e| match e {
        PollError::HookFailed { .. } => e,
        other => PollError::HookFailed {
            stage,
            reason: other.to_string(),
        },
    })
}

#[async_trait]
impl TaskAction for CleanupCycle {
    async fn run(&self) -> Result<(), PollError> {
        self.run_cycle().await.map(|_| ())
    }
}

/// Periodic retention sweep bracketed by pause/resume hooks.
pub struct CleanupCoordinator {
    task: PeriodicTask,
    cycle: Arc<CleanupCycle>,
}

impl std::fmt::Debug for CleanupCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CleanupCoordinator")
            .field("task", &self.task)
            .field("page_size", &self.cycle.page_size)
            .field("grace", &self.cycle.grace)
            .finish_non_exhaustive()
    }
}

impl CleanupCoordinator {
    pub fn builder(store: Arc<dyn EventStore>) -> CleanupCoordinatorBuilder {
        CleanupCoordinatorBuilder {
            store,
            before: None,
            after: None,
            page_size: DEFAULT_PAGE_SIZE,
            grace_period: DEFAULT_GRACE_PERIOD,
        }
    }

    /// Arm the periodic sweep.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` for a zero interval.
    pub fn start(&self, interval: Duration, run_immediately: bool) -> Result<bool, PollError> {
        self.task
            .start(self.cycle.clone(), interval, run_immediately)
    }

    /// Tear down the periodic sweep, waiting for a running cycle to finish.
    ///
    /// # Errors
    /// Returns `PollError::NotRunning` if the coordinator was not started.
    pub async fn stop(&self) -> Result<(), PollError> {
        self.task.stop().await
    }

    pub fn is_running(&self) -> bool {
        self.task.is_running()
    }

    /// Run one full cycle now, outside the schedule.
    ///
    /// # Errors
    /// - `PollError::HookFailed` when a hook fails
    /// - `PollError::SweepAborted` when the sweep fails partway
    pub async fn run_cycle(&self) -> Result<SweepReport, PollError> {
        self.cycle.run_cycle().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use crate::poller::HookFuture;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex;

    fn t() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn minutes(m: i64) -> DateTime<Utc> {
        t() + TimeDelta::minutes(m)
    }

    type Calls = Arc<Mutex<Vec<&'static str>>>;

    fn hook(calls: &Calls, label: &'static str, fail: bool) -> Hook {
        let calls = Arc::clone(calls);
        Arc::new(move || {
            calls.lock().unwrap().push(label);
            Box::pin(async move {
                if fail {
                    Err(PollError::Config(format!("{} refused", label)))
                } else {
                    Ok(())
                }
            }) as HookFuture
        })
    }

    async fn seeded_store() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store.append_event(1, t(), minutes(2)).await.unwrap();
        for m in [-1, 1, 5, 13] {
            store.append(1, 20.0, 50.0, minutes(m)).await.unwrap();
        }
        store
    }

    fn surviving(store: &MemoryStore) -> Vec<DateTime<Utc>> {
        store.readings().iter().map(|r| r.timestamp).collect()
    }

    #[tokio::test]
    async fn test_window_deletes_only_readings_inside() {
        let store = seeded_store().await;
        let coordinator = CleanupCoordinator::builder(store.clone()).build().unwrap();

        let report = coordinator.run_cycle().await.unwrap();
        assert_eq!(report.readings_deleted, 2);
        assert_eq!(report.events_scanned, 1);
        assert_eq!(surviving(&store), vec![minutes(-1), minutes(13)]);
    }

    #[tokio::test]
    async fn test_hooks_bracket_the_sweep() {
        let store = seeded_store().await;
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));

        let observed = Arc::clone(&store);
        let after_calls = Arc::clone(&calls);
        let after: Hook = Arc::new(move || {
            after_calls.lock().unwrap().push("after");
            let remaining = observed.readings().len();
            Box::pin(async move {
                assert_eq!(remaining, 2);
                Ok::<(), PollError>(())
            }) as HookFuture
        });

        let coordinator = CleanupCoordinator::builder(store.clone())
            .before_cleanup(hook(&calls, "before", false))
            .after_cleanup(after)
            .build()
            .unwrap();
        coordinator.run_cycle().await.unwrap();

        assert_eq!(*calls.lock().unwrap(), vec!["before", "after"]);
    }

    #[tokio::test]
    async fn test_before_hook_failure_skips_sweep_and_after() {
        let store = seeded_store().await;
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let coordinator = CleanupCoordinator::builder(store.clone())
            .before_cleanup(hook(&calls, "before", true))
            .after_cleanup(hook(&calls, "after", false))
            .build()
            .unwrap();

        let err = coordinator.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            PollError::HookFailed {
                stage: HookStage::Before,
                ..
            }
        ));
        assert_eq!(store.readings().len(), 4);
        assert_eq!(*calls.lock().unwrap(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_after_hook_failure_is_cycle_failure() {
        let store = seeded_store().await;
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let coordinator = CleanupCoordinator::builder(store.clone())
            .after_cleanup(hook(&calls, "after", true))
            .build()
            .unwrap();

        let err = coordinator.run_cycle().await.unwrap_err();
        assert!(matches!(
            err,
            PollError::HookFailed {
                stage: HookStage::After,
                ..
            }
        ));
        // The sweep itself completed
        assert_eq!(store.readings().len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_failure_aborts_and_skips_after_hook() {
        let store = seeded_store().await;
        store.fail_deletes_after(1);
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let coordinator = CleanupCoordinator::builder(store.clone())
            .before_cleanup(hook(&calls, "before", false))
            .after_cleanup(hook(&calls, "after", false))
            .build()
            .unwrap();

        let err = coordinator.run_cycle().await.unwrap_err();
        assert!(matches!(err, PollError::SweepAborted { deleted: 1, .. }));
        assert_eq!(store.readings().len(), 3);
        assert_eq!(*calls.lock().unwrap(), vec!["before"]);
    }

    #[tokio::test]
    async fn test_pagination_visits_every_event() {
        let store = Arc::new(MemoryStore::new());
        for i in 0..5 {
            let start = minutes(i * 60);
            store.append_event(1, start, start + TimeDelta::seconds(10)).await.unwrap();
            store.append(1, 20.0, 50.0, start + TimeDelta::minutes(1)).await.unwrap();
        }
        // Outside every window
        store.append(1, 20.0, 50.0, minutes(30)).await.unwrap();

        let coordinator = CleanupCoordinator::builder(store.clone())
            .page_size(2)
            .build()
            .unwrap();
        let report = coordinator.run_cycle().await.unwrap();

        assert_eq!(
            report,
            SweepReport {
                events_scanned: 5,
                readings_deleted: 5,
                pages: 3,
            }
        );
        assert_eq!(surviving(&store), vec![minutes(30)]);
    }

    #[tokio::test]
    async fn test_empty_store_still_runs_after_hook() {
        let store = Arc::new(MemoryStore::new());
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let coordinator = CleanupCoordinator::builder(store)
            .after_cleanup(hook(&calls, "after", false))
            .build()
            .unwrap();

        let report = coordinator.run_cycle().await.unwrap();
        assert_eq!(report, SweepReport::default());
        assert_eq!(*calls.lock().unwrap(), vec!["after"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scheduled_cycles_keep_running_after_failure() {
        let store = seeded_store().await;
        let calls: Calls = Arc::new(Mutex::new(Vec::new()));
        let coordinator = CleanupCoordinator::builder(store.clone())
            .before_cleanup(hook(&calls, "before", true))
            .build()
            .unwrap();

        coordinator.start(Duration::from_secs(3600), true).unwrap();
        tokio::time::sleep(Duration::from_secs(3600 * 2 + 60)).await;
        coordinator.stop().await.unwrap();

        // Fired at 0h, 1h and 2h despite failing every time
        assert_eq!(calls.lock().unwrap().len(), 3);
        assert!(!coordinator.is_running());
        assert!(matches!(
            coordinator.stop().await,
            Err(PollError::NotRunning(_))
        ));
    }

    #[test]
    fn test_builder_rejects_zero_page_size() {
        let store = Arc::new(MemoryStore::new());
        assert!(matches!(
            CleanupCoordinator::builder(store).page_size(0).build(),
            Err(PollError::Config(_))
        ));
    }
}
