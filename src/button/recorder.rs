//! Pairs push and release edges into persisted button events.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::button::EdgeDetector;
use crate::{ButtonEvent, EventStore, PollError};

/// Default minimum time between push and release.
pub const DEFAULT_MIN_PRESS: Duration = Duration::from_secs(5);

/// Source of wall-clock timestamps for recorded edges.
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Remembers the pending push of one button and stores the completed press
/// when the release arrives.
pub struct ButtonRecorder {
    button_id: i64,
    store: Arc<dyn EventStore>,
    min_press: Duration,
    clock: Clock,
    pending: Mutex<Option<DateTime<Utc>>>,
}

impl std::fmt::Debug for ButtonRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ButtonRecorder")
            .field("button_id", &self.button_id)
            .field("min_press", &self.min_press)
            .field("pending", &self.pending_push())
            .finish_non_exhaustive()
    }
}

impl ButtonRecorder {
    pub fn new(button_id: i64, store: Arc<dyn EventStore>) -> Self {
        Self {
            button_id,
            store,
            min_press: DEFAULT_MIN_PRESS,
            clock: Arc::new(Utc::now),
            pending: Mutex::new(None),
        }
    }

    /// Presses must last strictly longer than this to be stored.
    pub fn with_min_press(mut self, min_press: Duration) -> Self {
        self.min_press = min_press;
        self
    }

    /// Replace the timestamp source used by [`attach`](Self::attach).
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn button_id(&self) -> i64 {
        self.button_id
    }

    /// Push awaiting its release, if any.
    pub fn pending_push(&self) -> Option<DateTime<Utc>> {
        *self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remember the start of a press. A later push replaces an earlier one.
    pub fn record_push(&self, at: DateTime<Utc>) {
        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(previous) = pending.replace(at) {
            tracing::debug!(button = self.button_id, %previous, "Unreleased push replaced");
        }
    }

    /// Complete the pending press and persist it.
    ///
    /// The pending push is cleared whether or not the press is accepted.
    ///
    /// # Errors
    /// - `PollError::OutOfOrderEvent` without a pending push, or when the
    ///   release precedes the push
    /// - `PollError::ExcessiveFrequency` when the press is not longer than the
    ///   minimum press duration
    /// - `PollError::Storage` when persisting fails
    pub async fn record_release(&self, at: DateTime<Utc>) -> Result<ButtonEvent, PollError> {
        let started_at = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| {
                PollError::OutOfOrderEvent(format!(
                    "release at {} without a preceding push",
                    at
                ))
            })?;

        let Ok(actual) = (at - started_at).to_std() else {
            return Err(PollError::OutOfOrderEvent(format!(
                "release at {} precedes push at {}",
                at, started_at
            )));
        };
        if actual <= self.min_press {
            return Err(PollError::ExcessiveFrequency {
                actual,
                minimum: self.min_press,
            });
        }

        self.store
            .append_event(self.button_id, started_at, at)
            .await?;
        tracing::info!(
            button = self.button_id,
            %started_at,
            ended_at = %at,
            duration = ?actual,
            "Button press recorded"
        );
        Ok(ButtonEvent::new(self.button_id, started_at, at))
    }

    /// Register push/release handlers on `detector` that feed this recorder.
    pub fn attach(self: &Arc<Self>, detector: &EdgeDetector) {
        let recorder = Arc::clone(self);
        detector.on_push(move |_| {
            recorder.record_push((recorder.clock)());
            async { Ok(()) }
        });

        let recorder = Arc::clone(self);
        detector.on_release(move |_| {
            let recorder = Arc::clone(&recorder);
            async move {
                let at = (recorder.clock)();
                recorder.record_release(at).await.map(|_| ())
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStore;
    use crate::button::SignalState;
    use chrono::TimeDelta;
    use std::sync::atomic::{AtomicI64, Ordering};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_push_release_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let recorder = ButtonRecorder::new(1, store.clone());

        recorder.record_push(t0());
        let event = recorder
            .record_release(t0() + TimeDelta::seconds(8))
            .await
            .unwrap();

        assert!(event.started_at < event.ended_at);
        let stored = store.events();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].started_at, t0());
        assert_eq!(stored[0].ended_at, t0() + TimeDelta::seconds(8));
        assert!(recorder.pending_push().is_none());
    }

    #[tokio::test]
    async fn test_release_without_push() {
        let store = Arc::new(MemoryStore::new());
        let recorder = ButtonRecorder::new(1, store.clone());

        let result = recorder.record_release(t0()).await;
        assert!(matches!(result, Err(PollError::OutOfOrderEvent(_))));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_release_before_push() {
        let store = Arc::new(MemoryStore::new());
        let recorder = ButtonRecorder::new(1, store.clone());

        recorder.record_push(t0());
        let result = recorder.record_release(t0() - TimeDelta::seconds(1)).await;
        assert!(matches!(result, Err(PollError::OutOfOrderEvent(_))));
        assert!(recorder.pending_push().is_none());
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_short_press_rejected() {
        let store = Arc::new(MemoryStore::new());
        let recorder = ButtonRecorder::new(1, store.clone());

        recorder.record_push(t0());
        let result = recorder.record_release(t0() + TimeDelta::seconds(5)).await;
        match result {
            Err(PollError::ExcessiveFrequency { actual, minimum }) => {
                assert_eq!(actual, Duration::from_secs(5));
                assert_eq!(minimum, DEFAULT_MIN_PRESS);
            }
            other => panic!("unexpected result: {:?}", other),
        }
        // The push is consumed, so a second release is out of order
        let result = recorder.record_release(t0() + TimeDelta::seconds(9)).await;
        assert!(matches!(result, Err(PollError::OutOfOrderEvent(_))));
        assert!(store.events().is_empty());
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_appends(true);
        let recorder = ButtonRecorder::new(1, store.clone()).with_min_press(Duration::ZERO);

        recorder.record_push(t0());
        let result = recorder.record_release(t0() + TimeDelta::seconds(1)).await;
        assert!(matches!(result, Err(PollError::Storage(_))));
    }

    #[tokio::test]
    async fn test_attached_to_detector() {
        let store = Arc::new(MemoryStore::new());
        let seconds = Arc::new(AtomicI64::new(0));
        let clock_seconds = Arc::clone(&seconds);
        let clock: Clock =
            Arc::new(move || t0() + TimeDelta::seconds(clock_seconds.load(Ordering::SeqCst)));
        let recorder = Arc::new(ButtonRecorder::new(7, store.clone()).with_clock(clock));

        let detector = EdgeDetector::new("button-7");
        recorder.attach(&detector);

        detector.sample(SignalState::Open).await.unwrap();
        detector.sample(SignalState::Closed).await.unwrap();
        assert_eq!(recorder.pending_push(), Some(t0()));

        seconds.store(12, Ordering::SeqCst);
        detector.sample(SignalState::Open).await.unwrap();

        let events = store.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].button_id, 7);
        assert_eq!(events[0].duration(), TimeDelta::seconds(12));
    }
}
