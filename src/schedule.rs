//! Wake deadlines for the delivery worker.
//!
//! Two concerns decide when the worker next looks at its batch: the flush
//! interval, armed when an event lands in an empty queue, and the retry
//! backoff, armed after a failed attempt. Both are kept in one
//! [`WakeSchedule`] so the worker only ever waits on a single deadline.

use std::time::{Duration, Instant};

use crate::config::Config;

/// Retry behaviour for a batch that failed to deliver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts allowed after the first one
    pub max_retries: u32,
    /// Fixed delay between attempts
    pub retry_interval: Duration,
}

impl From<&Config> for RetryPolicy {
    fn from(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            retry_interval: config.retry_interval(),
        }
    }
}

impl RetryPolicy {
    /// Check if a batch may be attempted again after `failures` failed attempts.
    #[must_use]
    pub const fn should_retry(&self, failures: u32) -> bool {
        failures < self.max_retries
    }

    /// Get the number of attempts left before the batch is given up on.
    #[must_use]
    pub const fn remaining_retries(&self, failures: u32) -> u32 {
        self.max_retries.saturating_sub(failures)
    }

    /// When the next attempt should happen if one fails at `now`.
    #[must_use]
    pub fn next_retry(&self, now: Instant) -> Instant {
        now + self.retry_interval
    }
}

/// The pending flush and retry deadlines.
///
/// Arming a deadline only ever moves it earlier. Both are cleared when the
/// worker drains, which is the "never" state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WakeSchedule {
    flush: Option<Instant>,
    retry: Option<Instant>,
}

impl WakeSchedule {
    /// Lower the flush deadline to `at` if that is sooner.
    pub fn arm_flush(&mut self, at: Instant) {
        self.flush = Some(self.flush.map_or(at, |current| current.min(at)));
    }

    /// Lower the retry deadline to `at` if that is sooner.
    pub fn arm_retry(&mut self, at: Instant) {
        self.retry = Some(self.retry.map_or(at, |current| current.min(at)));
    }

    /// The retry deadline has been honoured.
    pub const fn clear_retry(&mut self) {
        self.retry = None;
    }

    #[must_use]
    pub const fn retry(&self) -> Option<Instant> {
        self.retry
    }

    #[must_use]
    pub const fn flush(&self) -> Option<Instant> {
        self.flush
    }

    /// The earliest pending deadline, `None` meaning never.
    ///
    /// A flush deadline that has already passed also ends a retry backoff.
    #[must_use]
    pub fn next(&self) -> Option<Instant> {
        match (self.flush, self.retry) {
            (Some(flush), Some(retry)) => Some(flush.min(retry)),
            (flush, retry) => flush.or(retry),
        }
    }

    /// Check if the next deadline has been reached at `now`.
    #[must_use]
    pub fn is_due(&self, now: Instant) -> bool {
        self.next().is_some_and(|at| now >= at)
    }

    pub const fn reset(&mut self) {
        *self = Self {
            flush: None,
            retry: None,
        };
    }
}
