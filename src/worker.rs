//! The delivery worker.
//!
//! A single background thread drives every batch through the same cycle:
//!
//! ```text
//!            drained                       nothing due
//!   ┌──────┐ <────── ┌────────────┐ ──> ┌──────────┐ ──(timed wait)──┐
//!   │ Idle │         │ Assembling │     │ Deciding │                 │
//!   └──────┘ ──────> └────────────┘ <───┴──────────┴ <───────────────┘
//!      │      work         ^                 │ flush requested, batch full,
//!      │                   │                 │ or deadline reached
//!      │ shutdown          │                 v
//!      v                   │           ┌─────────┐
//!  Terminated              └────────── │ Sending │
//!                     settled or retry └─────────┘
//!                        scheduled
//! ```
//!
//! The shared lock is held everywhere except while the transport is called
//! and while outcomes are reported to the handler.

use std::{
    collections::BTreeMap,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    time::Instant,
};

use base64::{Engine, engine::general_purpose::STANDARD};
use parking_lot::MutexGuard;

use crate::{
    config::Config,
    envelope::Envelope,
    error::{DeliveryError, TransportError},
    event::timestamp,
    internal,
    notify::{self, Outcome},
    outgoing,
    queue::{Shared, State},
    schedule::RetryPolicy,
    transport::{Request, Transport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Assembling,
    Deciding,
    Sending,
    Terminated,
}

pub(crate) struct Worker {
    shared: Arc<Shared>,
    transport: Arc<dyn Transport>,
    envelope: Envelope,
    policy: RetryPolicy,
    flush_count: usize,
    flush_size: usize,
    url: String,
    headers: BTreeMap<String, String>,
}

impl Worker {
    pub(crate) fn new(
        shared: Arc<Shared>,
        transport: Arc<dyn Transport>,
        envelope: Envelope,
        config: &Config,
    ) -> Self {
        let headers = request_headers(&config.write_key, &envelope);

        Self {
            shared,
            transport,
            envelope,
            policy: RetryPolicy::from(config),
            flush_count: config.flush_count,
            flush_size: config.flush_size,
            url: config.batch_url(),
            headers,
        }
    }

    /// Run until a shutdown is requested and everything has been delivered.
    pub(crate) fn run(self) {
        internal!("Delivery worker started");

        let mut state = self.shared.state.lock();
        let mut phase = Phase::Assembling;

        while phase != Phase::Terminated {
            phase = match phase {
                Phase::Idle => self.idle(&mut state),
                Phase::Assembling => self.assemble(&mut state),
                Phase::Deciding => self.decide(&mut state),
                Phase::Sending => self.send(&mut state),
                Phase::Terminated => Phase::Terminated,
            };
        }

        internal!(level = DEBUG, "Delivery worker stopped");
    }

    fn idle(&self, state: &mut MutexGuard<'_, State>) -> Phase {
        if !state.is_drained() {
            return Phase::Assembling;
        }

        // A clean slate, so an old failure does not cut short the retries of
        // a batch sent much later. A pending flush request carries over to the
        // next event.
        state.failures = 0;
        state.schedule.reset();

        self.shared.drained.notify_all();

        if state.shutdown {
            return Phase::Terminated;
        }

        self.shared.work.wait(state);
        Phase::Assembling
    }

    fn assemble(&self, state: &mut MutexGuard<'_, State>) -> Phase {
        if state.is_drained() {
            return Phase::Idle;
        }

        // A batch waiting out its retry backoff is resent exactly as it was.
        if state.schedule.retry().is_none() {
            state.assemble(&self.envelope, self.flush_count, self.flush_size);
        }

        Phase::Deciding
    }

    fn decide(&self, state: &mut MutexGuard<'_, State>) -> Phase {
        if !state.is_urgent() && !state.schedule.is_due(Instant::now()) {
            match state.schedule.next() {
                Some(deadline) => {
                    self.shared.work.wait_until(state, deadline);
                }
                None => self.shared.work.wait(state),
            }
            return Phase::Assembling;
        }

        // Whichever deadline or request got us here, this attempt is the retry.
        state.need_flush = false;
        state.schedule.clear_retry();
        Phase::Sending
    }

    fn send(&self, state: &mut MutexGuard<'_, State>) -> Phase {
        if state.batch.is_empty() {
            return Phase::Assembling;
        }

        let sent_at = timestamp();
        for event in &mut state.batch {
            event.stamp(&sent_at);
        }

        let count = state.batch.len();
        let result = match self.envelope.encode(&state.batch) {
            Ok(body) => {
                let request = self.request(body);
                outgoing!(
                    "Sending {} events ({} bytes) to {}",
                    count,
                    request.body.len(),
                    request.url
                );
                MutexGuard::unlocked(state, || self.deliver(&request))
            }
            Err(err) => Err(DeliveryError::Encode(err)),
        };

        match result {
            Ok(()) => {
                outgoing!(level = DEBUG, "Delivered batch of {} events", count);
                state.failures = 0;
                self.settle(state, &Outcome::Success);
            }
            Err(err) if err.is_retryable() && self.policy.should_retry(state.failures) => {
                state.failures += 1;
                state
                    .schedule
                    .arm_retry(self.policy.next_retry(Instant::now()));
                outgoing!(
                    level = WARN,
                    "Batch of {} events failed ({}), {} retries left",
                    count,
                    err,
                    self.policy.remaining_retries(state.failures)
                );
            }
            Err(err) => {
                // The failure count is deliberately kept, so until the worker
                // drains or a send succeeds each later batch gets one attempt.
                outgoing!(
                    level = ERROR,
                    "Giving up on batch of {} events: {}",
                    count,
                    err
                );
                self.settle(state, &Outcome::Failure(err.to_string()));
            }
        }

        Phase::Assembling
    }

    /// Take the batch out and report `outcome` for each of its events.
    fn settle(&self, state: &mut MutexGuard<'_, State>, outcome: &Outcome) {
        let batch = std::mem::take(&mut state.batch);
        let handler = state.handler.clone();
        state.settling = batch.len();

        MutexGuard::unlocked(state, || {
            notify::dispatch(handler.as_deref(), &batch, outcome);
        });

        state.settling = 0;
    }

    fn deliver(&self, request: &Request) -> Result<(), DeliveryError> {
        let response = panic::catch_unwind(AssertUnwindSafe(|| self.transport.deliver(request)))
            .unwrap_or_else(|_| Err(TransportError::Request("transport panicked".to_string())))?;

        if response.is_success() {
            Ok(())
        } else {
            Err(DeliveryError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }

    fn request(&self, body: Vec<u8>) -> Request {
        Request {
            method: "POST".to_string(),
            url: self.url.clone(),
            headers: self.headers.clone(),
            body,
        }
    }
}

fn request_headers(write_key: &str, envelope: &Envelope) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(
        "Authorization".to_string(),
        format!("Basic {}", STANDARD.encode(format!("{write_key}:"))),
    );
    headers.insert("Content-Type".to_string(), "application/json".to_string());
    headers.insert("Accept".to_string(), "application/json".to_string());

    if let Some(user_agent) = envelope.user_agent() {
        headers.insert("User-Agent".to_string(), user_agent);
    }

    headers
}
