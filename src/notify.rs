//! Per-event outcome reporting.

use std::{
    error::Error,
    panic::{self, AssertUnwindSafe},
};

use crate::{event::Event, internal};

pub type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Receives the outcome of every event once its batch is settled.
///
/// Handlers are called on the delivery worker thread with no internal lock
/// held, so they may enqueue or flush from within a callback. Errors and
/// panics raised by a handler are logged and otherwise ignored.
pub trait EventHandler: Send + Sync {
    /// The event was accepted by the collector.
    ///
    /// # Errors
    ///
    /// Any error is discarded after being logged.
    fn on_success(&self, event: &Event) -> HandlerResult;

    /// The event could not be delivered after all retries were spent.
    ///
    /// # Errors
    ///
    /// Any error is discarded after being logged.
    fn on_failure(&self, event: &Event, reason: &str) -> HandlerResult;
}

/// How a batch was settled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    Failure(String),
}

/// Report `outcome` for every event in `batch`, in order.
pub(crate) fn dispatch(handler: Option<&dyn EventHandler>, batch: &[Event], outcome: &Outcome) {
    let Some(handler) = handler else {
        return;
    };

    for event in batch {
        let result = panic::catch_unwind(AssertUnwindSafe(|| match outcome {
            Outcome::Success => handler.on_success(event),
            Outcome::Failure(reason) => handler.on_failure(event, reason),
        }));

        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => internal!(level = WARN, "Event handler returned an error: {}", err),
            Err(_) => internal!(level = WARN, "Event handler panicked, continuing"),
        }
    }
}
