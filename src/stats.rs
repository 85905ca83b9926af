//! Counters describing what happened to tracked events.
//!
//! Delivery problems never surface as errors to producers, so these counters
//! (alongside the `tracing` output) are how callers observe drops, retries
//! and requeues.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters shared by the queue owner, the flusher and the delivery unit.
#[derive(Debug, Default)]
pub struct ClientStats {
    enqueued: AtomicU64,
    dropped_overflow: AtomicU64,
    dropped_closing: AtomicU64,
    delivered: AtomicU64,
    failed_permanent: AtomicU64,
    requeued: AtomicU64,
    retries: AtomicU64,
    flushes: AtomicU64,
}

/// Point-in-time copy of [`ClientStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Events accepted into the queue
    pub enqueued: u64,

    /// Events evicted because the queue was full
    pub dropped_overflow: u64,

    /// Events rejected because the client was closing
    pub dropped_closing: u64,

    /// Events the collector accepted
    pub delivered: u64,

    /// Events dropped after a non-retryable failure
    pub failed_permanent: u64,

    /// Events put back on the queue after exhausting retries
    pub requeued: u64,

    /// In-place delivery retries
    pub retries: u64,

    /// Flushes that actually drained events
    pub flushes: u64,
}

impl ClientStats {
    pub fn record_enqueued(&self) {
        self.enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_overflow(&self) {
        self.dropped_overflow.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_closing(&self) {
        self.dropped_closing.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_delivered(&self) {
        self.delivered.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed_permanent(&self) {
        self.failed_permanent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_requeued(&self) {
        self.requeued.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a copy of the current counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped_overflow: self.dropped_overflow.load(Ordering::Relaxed),
            dropped_closing: self.dropped_closing.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            failed_permanent: self.failed_permanent.load(Ordering::Relaxed),
            requeued: self.requeued.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            flushes: self.flushes.load(Ordering::Relaxed),
        }
    }
}
