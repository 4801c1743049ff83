//! Button Layer
//!
//! Discrete source handling: an [`EdgeDetector`] turns repeated open/closed
//! samples into push and release edges, a [`ButtonRecorder`] pairs them into
//! stored [`ButtonEvent`](crate::ButtonEvent)s, and a [`ButtonAction`] drives
//! the detector from a poller.
//!
//! An `Open` to `Closed` transition is a push; `Closed` to `Open` is a release.

mod action;
mod edge;
mod recorder;

pub use action::ButtonAction;
pub use edge::{Edge, EdgeDetector, EdgeHandler, HandlerFuture, SignalState};
pub use recorder::{ButtonRecorder, Clock, DEFAULT_MIN_PRESS};
