//! Failure-aware interval stretching for periodic actions.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::poller::{IntervalHandle, PollError, TaskAction};

/// Default number of consecutive failures retried at the short retry interval.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Default retry interval while under the failure threshold.
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Default cooldown multiple of the nominal interval.
pub const DEFAULT_COOLDOWN_FACTOR: u32 = 2;

fn default_failure_threshold() -> u32 {
    DEFAULT_FAILURE_THRESHOLD
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

fn default_cooldown_factor() -> u32 {
    DEFAULT_COOLDOWN_FACTOR
}

/// Retry tiers applied by [`BackoffPolicy`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Failures retried at `retry_interval` before switching to the cooldown.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,
    /// Short retry delay used while failures are at or below the threshold.
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,
    /// Cooldown interval as a multiple of the nominal interval.
    #[serde(default = "default_cooldown_factor")]
    pub cooldown_factor: u32,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            failure_threshold: DEFAULT_FAILURE_THRESHOLD,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            cooldown_factor: DEFAULT_COOLDOWN_FACTOR,
        }
    }
}

impl BackoffConfig {
    /// Cooldown interval for the given nominal interval.
    pub fn cooldown_interval(&self, nominal: Duration) -> Duration {
        nominal.saturating_mul(self.cooldown_factor)
    }

    /// Check the tiers against a nominal interval.
    ///
    /// # Errors
    /// Returns `PollError::Config` when the retry interval is zero or not
    /// shorter than the cooldown interval.
    pub fn validate(&self, nominal: Duration) -> Result<(), PollError> {
        if self.retry_interval.is_zero() {
            return Err(PollError::Config(
                "backoff retry_interval must be positive".to_string(),
            ));
        }
        if self.cooldown_factor < 2 {
            return Err(PollError::Config(
                "backoff cooldown_factor must be at least 2".to_string(),
            ));
        }
        if self.retry_interval >= self.cooldown_interval(nominal) {
            return Err(PollError::Config(format!(
                "backoff retry_interval {:?} must be shorter than the cooldown {:?}",
                self.retry_interval,
                self.cooldown_interval(nominal)
            )));
        }
        Ok(())
    }
}

/// Snapshot of a policy's failure bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffState {
    pub consecutive_failures: u32,
    pub current_interval: Duration,
    pub nominal_interval: Duration,
    pub failure_threshold: u32,
}

impl BackoffState {
    /// Whether the policy has given up on short retries.
    pub fn in_cooldown(&self) -> bool {
        self.consecutive_failures > self.failure_threshold
    }
}

/// Wraps an action and adjusts the owning task's interval after every firing.
///
/// Success restores the nominal interval. Failures up to the threshold retry
/// at the short retry interval; beyond it the task slows to the cooldown
/// interval until the next success. Failures are logged, never returned.
pub struct BackoffPolicy<A> {
    name: String,
    action: A,
    config: BackoffConfig,
    interval: IntervalHandle,
    state: Mutex<BackoffState>,
}

impl<A> std::fmt::Debug for BackoffPolicy<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackoffPolicy")
            .field("name", &self.name)
            .field("config", &self.config)
            .field(
                "state",
                &*self.state.lock().unwrap_or_else(PoisonError::into_inner),
            )
            .finish_non_exhaustive()
    }
}

impl<A: TaskAction> BackoffPolicy<A> {
    /// Wrap `action`, steering the task behind `interval`.
    ///
    /// # Errors
    /// Returns `PollError::InvalidInterval` for a zero nominal interval and
    /// `PollError::Config` for inconsistent tiers.
    pub fn new(
        name: impl Into<String>,
        action: A,
        nominal_interval: Duration,
        config: BackoffConfig,
        interval: IntervalHandle,
    ) -> Result<Self, PollError> {
        if nominal_interval.is_zero() {
            return Err(PollError::InvalidInterval(nominal_interval));
        }
        config.validate(nominal_interval)?;

        Ok(Self {
            name: name.into(),
            action,
            config,
            interval,
            state: Mutex::new(BackoffState {
                consecutive_failures: 0,
                current_interval: nominal_interval,
                nominal_interval,
                failure_threshold: config.failure_threshold,
            }),
        })
    }

    /// Current bookkeeping.
    pub fn state(&self) -> BackoffState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run the wrapped action once and update the interval.
    pub async fn execute(&self) -> BackoffState {
        let result = self.action.run().await;

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match result {
            Ok(()) => {
                if state.consecutive_failures > 0 {
                    tracing::info!(
                        poller = %self.name,
                        failures = state.consecutive_failures,
                        "Recovered, restoring nominal interval"
                    );
                }
                state.consecutive_failures = 0;
                state.current_interval = state.nominal_interval;
            }
            Err(e) => {
                state.consecutive_failures = state.consecutive_failures.saturating_add(1);
                state.current_interval = if state.in_cooldown() {
                    self.config.cooldown_interval(state.nominal_interval)
                } else {
                    self.config.retry_interval
                };
                if state.in_cooldown() {
                    tracing::warn!(
                        poller = %self.name,
                        error = %e,
                        failures = state.consecutive_failures,
                        next = ?state.current_interval,
                        "Action failing repeatedly, cooling down"
                    );
                } else {
                    tracing::warn!(
                        poller = %self.name,
                        error = %e,
                        failures = state.consecutive_failures,
                        next = ?state.current_interval,
                        "Action failed, retrying"
                    );
                }
            }
        }

        if let Err(e) = self.interval.set(state.current_interval) {
            tracing::error!(poller = %self.name, error = %e, "Failed to apply interval");
        }
        *state
    }
}

#[async_trait::async_trait]
impl<A: TaskAction> TaskAction for BackoffPolicy<A> {
    async fn run(&self) -> Result<(), PollError> {
        self.execute().await;
        Ok(())
    }
}
