//! Bounded in-memory queue of pending events.
//!
//! Front of the queue is the next event to be sent. New events are appended
//! at the back; events whose delivery failed are put back at the front so
//! they are retried ahead of newer ones. When the queue is full the oldest
//! event (the front) is evicted to make room.
//!
//! No operation blocks: the lock is only held for the duration of a single
//! `VecDeque` mutation and never across an `.await`.
//!
//! Once [`EventQueue::close`] has been called new events are refused. The
//! closed check and the push happen under the same lock.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tracing::debug;

use crate::event::EventRecord;

/// Result of an [`EventQueue::enqueue`] call.
#[derive(Debug)]
pub struct EnqueueOutcome {
    /// Whether the event was appended (false once the queue is closed)
    pub accepted: bool,

    /// Queue length after the call
    pub len: usize,

    /// Event evicted to make room, if the queue was full
    pub evicted: Option<EventRecord>,
}

/// Bounded queue of events awaiting delivery.
pub struct EventQueue {
    state: Mutex<QueueState>,
    max_size: usize,
}

struct QueueState {
    events: VecDeque<EventRecord>,
    closed: bool,
}

impl EventQueue {
    /// Create an empty queue holding at most `max_size` events.
    pub fn new(max_size: usize) -> Self {
        let max_size = max_size.max(1);
        Self {
            state: Mutex::new(QueueState {
                events: VecDeque::with_capacity(max_size.min(1024)),
                closed: false,
            }),
            max_size,
        }
    }

    /// Append an event, evicting the oldest one first if the queue is full.
    ///
    /// The event is discarded without touching the queue if it is closed.
    pub fn enqueue(&self, record: EventRecord) -> EnqueueOutcome {
        let mut state = self.state.lock();
        if state.closed {
            return EnqueueOutcome {
                accepted: false,
                len: state.events.len(),
                evicted: None,
            };
        }

        let events = &mut state.events;

        let evicted = if events.len() >= self.max_size {
            events.pop_front()
        } else {
            None
        };

        if let Some(dropped) = &evicted {
            debug!(
                max_queue_size = self.max_size,
                event = %dropped.event,
                message_id = %dropped.message_id,
                "Queue full, dropping oldest event"
            );
        }

        events.push_back(record);

        EnqueueOutcome {
            accepted: true,
            len: events.len(),
            evicted,
        }
    }

    /// Refuse every later [`enqueue`](Self::enqueue).
    ///
    /// Requeues are still allowed so a final flush can put back what it
    /// failed to deliver.
    pub fn close(&self) {
        self.state.lock().closed = true;
    }

    /// Remove and return every queued event, leaving the queue empty.
    pub fn drain_all(&self) -> Vec<EventRecord> {
        let mut state = self.state.lock();
        std::mem::take(&mut state.events).into()
    }

    /// Put an event back at the front of the queue.
    ///
    /// Returns the event unchanged if the queue is already full; a requeued
    /// event is older than anything queued, so it is the one to give way.
    pub fn requeue_front(&self, record: EventRecord) -> Result<(), EventRecord> {
        let mut state = self.state.lock();
        if state.events.len() >= self.max_size {
            return Err(record);
        }
        state.events.push_front(record);
        Ok(())
    }

    /// Get the current number of queued events.
    pub fn len(&self) -> usize {
        self.state.lock().events.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.state.lock().events.is_empty()
    }

    /// Get the queue capacity.
    pub fn max_size(&self) -> usize {
        self.max_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Properties;

    fn create_test_event(name: &str) -> EventRecord {
        EventRecord::new(Some("test_user"), name, Properties::new()).unwrap()
    }

    fn names(records: &[EventRecord]) -> Vec<&str> {
        records.iter().map(|r| r.event.as_str()).collect()
    }

    #[test]
    fn test_enqueue_appends_in_order() {
        let queue = EventQueue::new(10);
        assert!(queue.is_empty());

        assert_eq!(queue.enqueue(create_test_event("a")).len, 1);
        assert_eq!(queue.enqueue(create_test_event("b")).len, 2);

        let drained = queue.drain_all();
        assert_eq!(names(&drained), vec!["a", "b"]);
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let queue = EventQueue::new(3);

        for i in 0..3 {
            let outcome = queue.enqueue(create_test_event(&format!("event{i}")));
            assert!(outcome.evicted.is_none());
        }

        let outcome = queue.enqueue(create_test_event("event3"));
        assert_eq!(outcome.len, 3);
        assert_eq!(outcome.evicted.map(|e| e.event), Some("event0".to_string()));

        queue.enqueue(create_test_event("event4"));
        assert_eq!(queue.len(), 3);

        let drained = queue.drain_all();
        assert_eq!(names(&drained), vec!["event2", "event3", "event4"]);
    }

    #[test]
    fn test_length_never_exceeds_capacity() {
        let queue = EventQueue::new(5);
        for i in 0..50 {
            queue.enqueue(create_test_event(&format!("event{i}")));
            assert!(queue.len() <= queue.max_size());
        }
    }

    #[test]
    fn test_drain_all_empties_queue() {
        let queue = EventQueue::new(10);
        queue.enqueue(create_test_event("a"));
        queue.enqueue(create_test_event("b"));

        assert_eq!(queue.drain_all().len(), 2);
        assert!(queue.is_empty());
        assert!(queue.drain_all().is_empty());

        // Arrivals after a drain start a fresh buffer
        queue.enqueue(create_test_event("c"));
        assert_eq!(names(&queue.drain_all()), vec!["c"]);
    }

    #[test]
    fn test_requeue_front_takes_priority() {
        let queue = EventQueue::new(10);
        queue.enqueue(create_test_event("new"));
        queue.requeue_front(create_test_event("retried")).unwrap();

        let drained = queue.drain_all();
        assert_eq!(names(&drained), vec!["retried", "new"]);
    }

    #[test]
    fn test_requeue_front_rejected_when_full() {
        let queue = EventQueue::new(2);
        queue.enqueue(create_test_event("a"));
        queue.enqueue(create_test_event("b"));

        let result = queue.requeue_front(create_test_event("retried"));
        assert_eq!(result.unwrap_err().event, "retried");
        assert_eq!(names(&queue.drain_all()), vec!["a", "b"]);
    }

    #[test]
    fn test_closed_queue_refuses_new_events() {
        let queue = EventQueue::new(10);
        assert!(queue.enqueue(create_test_event("before")).accepted);

        queue.close();

        let outcome = queue.enqueue(create_test_event("after"));
        assert!(!outcome.accepted);
        assert_eq!(outcome.len, 1);
        assert!(outcome.evicted.is_none());

        // Failed deliveries from the final flush can still go back
        queue.requeue_front(create_test_event("retried")).unwrap();
        assert_eq!(names(&queue.drain_all()), vec!["retried", "before"]);
    }
}
