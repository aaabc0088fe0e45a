//! Per-consumer counters.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the poll loop and read through the consumer handle
#[derive(Debug, Default)]
pub struct ConsumerStats {
    cycles: AtomicU64,
    empty_polls: AtomicU64,
    messages_received: AtomicU64,
    events_emitted: AtomicU64,
    messages_deleted: AtomicU64,
    delete_failures: AtomicU64,
    failed_cycles: AtomicU64,
    retries: AtomicU64,
    fatal_errors: AtomicU64,
}

/// Point-in-time copy of [`ConsumerStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub cycles: u64,
    pub empty_polls: u64,
    pub messages_received: u64,
    pub events_emitted: u64,
    pub messages_deleted: u64,
    pub delete_failures: u64,
    pub failed_cycles: u64,
    pub retries: u64,
    pub fatal_errors: u64,
}

impl ConsumerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_cycle(&self, received: usize, events: u64) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        if received == 0 {
            self.empty_polls.fetch_add(1, Ordering::Relaxed);
        }
        self.messages_received
            .fetch_add(received as u64, Ordering::Relaxed);
        self.events_emitted.fetch_add(events, Ordering::Relaxed);
    }

    pub(crate) fn record_deleted(&self, deleted: usize, failed: usize) {
        self.messages_deleted
            .fetch_add(deleted as u64, Ordering::Relaxed);
        self.delete_failures
            .fetch_add(failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_failure(&self) {
        self.failed_cycles.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_fatal(&self) {
        self.fatal_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cycles: self.cycles.load(Ordering::Relaxed),
            empty_polls: self.empty_polls.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            events_emitted: self.events_emitted.load(Ordering::Relaxed),
            messages_deleted: self.messages_deleted.load(Ordering::Relaxed),
            delete_failures: self.delete_failures.load(Ordering::Relaxed),
            failed_cycles: self.failed_cycles.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            fatal_errors: self.fatal_errors.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
