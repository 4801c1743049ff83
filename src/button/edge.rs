//! Edge detection for a two-valued signal.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

use crate::PollError;

/// Observed state of a discrete signal.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumString,
    Display,
    AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
#[repr(u8)]
pub enum SignalState {
    /// No sample accepted yet, or the raw value was unreadable.
    #[default]
    Unknown = 0,
    Open = 1,
    Closed = 2,
}

impl SignalState {
    fn from_u8(raw: u8) -> Self {
        match raw {
            1 => Self::Open,
            2 => Self::Closed,
            _ => Self::Unknown,
        }
    }
}

/// A genuine transition between `Open` and `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum Edge {
    /// `Open` to `Closed`.
    Push,
    /// `Closed` to `Open`.
    Release,
}

impl Edge {
    /// Edge produced by moving from `previous` to `next`, if any.
    pub fn between(previous: SignalState, next: SignalState) -> Option<Self> {
        match (previous, next) {
            (SignalState::Open, SignalState::Closed) => Some(Self::Push),
            (SignalState::Closed, SignalState::Open) => Some(Self::Release),
            _ => None,
        }
    }
}

/// Future returned by an edge handler.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<(), PollError>> + Send>>;

/// Callback invoked with the new state when an edge fires.
pub type EdgeHandler = Arc<dyn Fn(SignalState) -> HandlerFuture + Send + Sync>;

/// Turns repeated samples into push/release notifications.
///
/// Samples are processed one at a time: the new state is compared with the
/// previous one, the matching handlers run in registration order, and only
/// then is the new state committed. A failing handler is logged and does not
/// stop the remaining handlers or the commit.
pub struct EdgeDetector {
    name: String,
    state: AtomicU8,
    sampling: tokio::sync::Mutex<()>,
    push_handlers: RwLock<Vec<EdgeHandler>>,
    release_handlers: RwLock<Vec<EdgeHandler>>,
}

impl std::fmt::Debug for EdgeDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EdgeDetector")
            .field("name", &self.name)
            .field("state", &self.current_state())
            .finish_non_exhaustive()
    }
}

impl EdgeDetector {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: AtomicU8::new(SignalState::Unknown as u8),
            sampling: tokio::sync::Mutex::new(()),
            push_handlers: RwLock::new(Vec::new()),
            release_handlers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Last committed state. Safe to call from any task.
    pub fn current_state(&self) -> SignalState {
        SignalState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Register a handler for `Open` to `Closed` transitions.
    pub fn on_push<F, Fut>(&self, handler: F)
    where
        F: Fn(SignalState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PollError>> + Send + 'static,
    {
        push_handler(&self.push_handlers, handler);
    }

    /// Register a handler for `Closed` to `Open` transitions.
    pub fn on_release<F, Fut>(&self, handler: F)
    where
        F: Fn(SignalState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), PollError>> + Send + 'static,
    {
        push_handler(&self.release_handlers, handler);
    }

    /// Feed one sample.
    ///
    /// Returns the edge that fired, if any.
    ///
    /// # Errors
    /// Returns `PollError::InvalidSample` for `Unknown`, leaving the state
    /// untouched.
    pub async fn sample(&self, next: SignalState) -> Result<Option<Edge>, PollError> {
        if next == SignalState::Unknown {
            return Err(PollError::InvalidSample);
        }

        let _guard = self.sampling.lock().await;
        let previous = self.current_state();
        let edge = Edge::between(previous, next);

        if let Some(edge) = edge {
            tracing::debug!(detector = %self.name, %edge, %previous, %next, "Edge detected");
            let handlers = match edge {
                Edge::Push => snapshot(&self.push_handlers),
                Edge::Release => snapshot(&self.release_handlers),
            };
            for (index, handler) in handlers.into_iter().enumerate() {
                // Run on its own task so a panicking handler cannot skip the commit
                match tokio::spawn(async move { handler(next).await }).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::warn!(
                        detector = %self.name,
                        %edge,
                        handler = index,
                        error = %e,
                        "Edge handler failed"
                    ),
                    Err(e) if e.is_panic() => tracing::error!(
                        detector = %self.name,
                        %edge,
                        handler = index,
                        "Edge handler panicked"
                    ),
                    Err(e) => tracing::error!(
                        detector = %self.name,
                        %edge,
                        handler = index,
                        error = %e,
                        "Edge handler was cancelled"
                    ),
                }
            }
        }

        self.state.store(next as u8, Ordering::Release);
        Ok(edge)
    }
}

fn push_handler<F, Fut>(handlers: &RwLock<Vec<EdgeHandler>>, handler: F)
where
    F: Fn(SignalState) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), PollError>> + Send + 'static,
{
    let handler: EdgeHandler = Arc::new(move |state| Box::pin(handler(state)) as HandlerFuture);
    handlers
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .push(handler);
}

fn snapshot(handlers: &RwLock<Vec<EdgeHandler>>) -> Vec<EdgeHandler> {
    handlers
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}
