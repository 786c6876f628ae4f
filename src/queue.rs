//! Pending events and the batch being assembled from them.
//!
//! All of this state lives behind the single mutex in [`Shared`], together
//! with the two condition variables the worker and the callers coordinate on.

use std::{
    collections::VecDeque,
    sync::Arc,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::{envelope::Envelope, event::Event, notify::EventHandler, schedule::WakeSchedule};

/// State shared between callers and the delivery worker.
pub(crate) struct Shared {
    pub(crate) state: Mutex<State>,
    /// Signalled by enqueue, flush, scrub, and shutdown
    pub(crate) work: Condvar,
    /// Signalled whenever the worker finds nothing left to deliver
    pub(crate) drained: Condvar,
}

impl Shared {
    pub(crate) fn new(handler: Option<Arc<dyn EventHandler>>) -> Self {
        Self {
            state: Mutex::new(State::new(handler)),
            work: Condvar::new(),
            drained: Condvar::new(),
        }
    }
}

pub(crate) struct State {
    pub(crate) queue: VecDeque<Event>,
    pub(crate) batch: Vec<Event>,
    /// Events of a finished batch whose outcome is still being reported
    pub(crate) settling: usize,
    pub(crate) schedule: WakeSchedule,
    /// Failed attempts since the last success or the last time the worker drained
    pub(crate) failures: u32,
    pub(crate) need_flush: bool,
    /// Callers blocked in `flush_wait`, each keeping every batch urgent
    pub(crate) waiters: usize,
    pub(crate) shutdown: bool,
    pub(crate) handler: Option<Arc<dyn EventHandler>>,
}

impl State {
    fn new(handler: Option<Arc<dyn EventHandler>>) -> Self {
        Self {
            queue: VecDeque::new(),
            batch: Vec::new(),
            settling: 0,
            schedule: WakeSchedule::default(),
            failures: 0,
            need_flush: false,
            waiters: 0,
            shutdown: false,
            handler,
        }
    }

    /// Nothing queued, nothing in flight, and nothing left to report.
    pub(crate) fn is_drained(&self) -> bool {
        self.queue.is_empty() && self.batch.is_empty() && self.settling == 0
    }

    /// Send without waiting for a deadline.
    pub(crate) const fn is_urgent(&self) -> bool {
        self.need_flush || self.waiters > 0
    }

    pub(crate) fn pending(&self) -> usize {
        self.queue.len() + self.batch.len() + self.settling
    }

    /// Append `event` to the tail of the queue.
    ///
    /// The first event to arrive in an empty queue arms the flush deadline.
    pub(crate) fn enqueue(&mut self, event: Event, now: Instant, flush_interval: Duration) {
        self.queue.push_back(event);

        if self.queue.len() == 1 {
            self.schedule.arm_flush(now + flush_interval);
        }
    }

    /// Move events from the head of the queue into the batch.
    ///
    /// Growth stops at `flush_count` events, or just before the encoded
    /// envelope would reach `flush_size` bytes. Either bound being hit marks
    /// the batch as ready to send. The first event of a batch is always
    /// taken, however large it is.
    pub(crate) fn assemble(&mut self, envelope: &Envelope, flush_count: usize, flush_size: usize) {
        while self.batch.len() < flush_count {
            let Some(event) = self.queue.pop_front() else {
                break;
            };
            self.batch.push(event);

            if envelope.encoded_len(&self.batch) >= flush_size {
                if self.batch.len() > 1
                    && let Some(event) = self.batch.pop()
                {
                    self.queue.push_front(event);
                }
                self.need_flush = true;
                break;
            }
        }

        if self.batch.len() >= flush_count {
            self.need_flush = true;
        }
    }
}
