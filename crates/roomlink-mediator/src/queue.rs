//! The outbound queue: an ordered, unbounded FIFO of encoded frames.
//!
//! Producers are the routing calls, which must never block, so pushes take
//! a short synchronous lock. The single consumer (the delivery loop) awaits
//! [`OutboundQueue::pop`], which parks on a `Notify` while the queue is
//! empty.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

/// Thread-safe FIFO with front reinsertion.
#[derive(Debug, Default)]
pub struct OutboundQueue {
    items: Mutex<VecDeque<String>>,
    available: Notify,
}

impl OutboundQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    fn items(&self) -> MutexGuard<'_, VecDeque<String>> {
        // No operation can leave the deque half-updated, so a poisoned
        // lock is still safe to use.
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a frame and returns the new depth.
    pub fn push_back(&self, frame: String) -> usize {
        let depth = {
            let mut items = self.items();
            items.push_back(frame);
            items.len()
        };
        self.available.notify_one();
        depth
    }

    /// Puts a frame back at the head, ahead of everything queued.
    pub fn push_front(&self, frame: String) {
        self.items().push_front(frame);
        self.available.notify_one();
    }

    /// Removes the head frame without waiting.
    pub fn try_pop(&self) -> Option<String> {
        self.items().pop_front()
    }

    /// Waits until a frame is available and removes it.
    ///
    /// Cancel-safe: the frame is only taken in the same poll that
    /// returns it, so dropping this future never loses a frame.
    pub async fn pop(&self) -> String {
        loop {
            if let Some(frame) = self.try_pop() {
                return frame;
            }
            // `notify_one` stores a permit when nobody is waiting, so a
            // push between the check above and this await is not lost.
            self.available.notified().await;
        }
    }

    /// Discards every queued frame and returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut items = self.items();
        let dropped = items.len();
        items.clear();
        dropped
    }

    /// Current depth.
    pub fn len(&self) -> usize {
        self.items().len()
    }

    /// Returns `true` if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }

    /// Copies the queued frames in delivery order.
    pub fn snapshot(&self) -> Vec<String> {
        self.items().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = OutboundQueue::new();
        assert_eq!(queue.push_back("a".into()), 1);
        assert_eq!(queue.push_back("b".into()), 2);
        assert_eq!(queue.try_pop().as_deref(), Some("a"));
        assert_eq!(queue.try_pop().as_deref(), Some("b"));
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_push_front_jumps_the_line() {
        let queue = OutboundQueue::new();
        queue.push_back("b".into());
        queue.push_back("c".into());
        queue.push_front("a".into());
        assert_eq!(queue.snapshot(), ["a", "b", "c"]);
    }

    #[test]
    fn test_clear_reports_dropped() {
        let queue = OutboundQueue::new();
        queue.push_back("a".into());
        queue.push_back("b".into());
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test]
    async fn test_pop_waits_for_push() {
        let queue = Arc::new(OutboundQueue::new());

        let consumer = {
            let queue = Arc::clone(&queue);
            tokio::spawn(async move { queue.pop().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!consumer.is_finished());

        queue.push_back("late".into());
        let frame = tokio::time::timeout(Duration::from_secs(1), consumer)
            .await
            .expect("pop should wake")
            .unwrap();
        assert_eq!(frame, "late");
    }

    #[tokio::test]
    async fn test_cancelled_pop_loses_nothing() {
        let queue = OutboundQueue::new();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(10), queue.pop()).await;
        assert!(timed_out.is_err());

        queue.push_back("kept".into());
        assert_eq!(queue.pop().await, "kept");
    }
}
