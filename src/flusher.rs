//! Draining the queue and driving deliveries.
//!
//! A flush takes a snapshot of the whole queue, splits it into sub-batches
//! of [`SUB_BATCH_SIZE`] and delivers every event of a sub-batch
//! concurrently, waiting for all of them before moving to the next one.
//! Events that fail transiently after exhausting their retries go back to
//! the front of the live queue; permanently failed events are dropped.
//!
//! At most one flush runs at a time. A flush requested while another is in
//! progress returns immediately without doing anything.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::future::join_all;
use tracing::debug;

use crate::delivery::Deliverer;
use crate::event::EventRecord;
use crate::queue::EventQueue;
use crate::stats::ClientStats;

/// Number of events delivered concurrently.
pub const SUB_BATCH_SIZE: usize = 10;

/// Summary of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    /// Events taken from the queue
    pub drained: usize,

    /// Events the collector accepted
    pub delivered: usize,

    /// Events put back on the queue
    pub requeued: usize,

    /// Events dropped (permanent failure, or no room to requeue)
    pub dropped: usize,
}

/// Clears the flushing flag when the flush ends, however it ends.
struct FlushGuard<'a>(&'a AtomicBool);

impl Drop for FlushGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drains the queue and hands events to the [`Deliverer`].
pub struct BatchFlusher {
    queue: Arc<EventQueue>,
    deliverer: Deliverer,
    flushing: AtomicBool,
    stats: Arc<ClientStats>,
    debug: bool,
}

impl BatchFlusher {
    pub fn new(
        queue: Arc<EventQueue>,
        deliverer: Deliverer,
        stats: Arc<ClientStats>,
        debug: bool,
    ) -> Self {
        Self {
            queue,
            deliverer,
            flushing: AtomicBool::new(false),
            stats,
            debug,
        }
    }

    /// Flush the queue once.
    ///
    /// Returns `None` without side effects if the queue is empty or another
    /// flush is already running. Delivery failures are never returned as
    /// errors; they are counted in the report and logged.
    pub async fn flush(&self) -> Option<FlushReport> {
        if self.queue.is_empty() {
            return None;
        }

        if self
            .flushing
            .compare_exchange(false, true, Ordering::Acquire, Ordering::Relaxed)
            .is_err()
        {
            return None;
        }
        let _guard = FlushGuard(&self.flushing);

        let events = self.queue.drain_all();
        if events.is_empty() {
            return None;
        }

        self.stats.record_flush();
        if self.debug {
            debug!(count = events.len(), "Flushing events");
        }

        let mut report = FlushReport {
            drained: events.len(),
            ..FlushReport::default()
        };

        for batch in events.chunks(SUB_BATCH_SIZE) {
            let outcomes = join_all(batch.iter().map(|record| self.deliverer.send(record))).await;

            for (record, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    Ok(()) => report.delivered += 1,
                    Err(e) if e.is_retryable() => {
                        if self.requeue(record.clone()) {
                            report.requeued += 1;
                        } else {
                            report.dropped += 1;
                        }
                    }
                    Err(_) => {
                        self.stats.record_failed_permanent();
                        report.dropped += 1;
                    }
                }
            }
        }

        let failed = report.requeued + report.dropped;
        if failed > 0 {
            debug!(
                failed = failed,
                requeued = report.requeued,
                dropped = report.dropped,
                "Some events failed to send"
            );
        }

        Some(report)
    }

    /// Whether a flush is currently running.
    pub fn is_flushing(&self) -> bool {
        self.flushing.load(Ordering::Acquire)
    }

    fn requeue(&self, record: EventRecord) -> bool {
        match self.queue.requeue_front(record) {
            Ok(()) => {
                self.stats.record_requeued();
                true
            }
            Err(dropped) => {
                debug!(
                    event = %dropped.event,
                    message_id = %dropped.message_id,
                    "Queue full, dropping failed event instead of requeueing"
                );
                self.stats.record_dropped_overflow();
                false
            }
        }
    }
}
