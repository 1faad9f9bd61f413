//! The delivery loop: the single writer between the outbound queue and the
//! room connection.
//!
//! One loop runs per mediator at a time. It owns the write side of the
//! connection, so frames leave in queue order without any locking around
//! the socket beyond what the transport does itself.
//!
//! A loop holds a [`DeliveryLease`] from the moment it is claimed until the
//! task is gone. No new loop can be claimed while a lease is alive, so a
//! frame that a dying loop puts back at the head of the queue is always
//! there before the next loop pops anything.

use std::pin::pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use roomlink_protocol::RoomId;
use roomlink_transport::{Connection, TransportError};
use tokio::sync::Notify;

use crate::{MediatorError, OutboundQueue};

#[derive(Debug, Default)]
struct Slot {
    /// The current loop should keep going.
    running: bool,
    /// A lease exists, whether or not its loop was asked to stop.
    leased: bool,
    /// Bumped on every claim so a loop can tell it has been superseded.
    epoch: u64,
}

/// Running flag, lease tracking and the wake-ups around them.
#[derive(Debug, Default)]
pub(crate) struct DeliveryControl {
    slot: Mutex<Slot>,
    /// Wakes a loop that is idle or mid-send so it can see a stop.
    interrupt: Notify,
    /// Fired when a lease is released.
    released: Notify,
}

/// Permission for exactly one delivery loop to run.
///
/// Dropping the lease, even without ever running the loop, frees the slot.
#[derive(Debug)]
pub(crate) struct DeliveryLease {
    control: Arc<DeliveryControl>,
    epoch: u64,
}

impl DeliveryLease {
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch
    }
}

impl Drop for DeliveryLease {
    fn drop(&mut self) {
        {
            let mut slot = self.control.slot();
            slot.leased = false;
            if slot.epoch == self.epoch {
                slot.running = false;
            }
        }
        self.control.released.notify_waiters();
    }
}

impl DeliveryControl {
    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims the slot if it is free. Returns `None` if a loop is running
    /// or a stopped loop has not exited yet.
    pub(crate) fn try_start(self: &Arc<Self>) -> Option<DeliveryLease> {
        let mut slot = self.slot();
        if slot.running || slot.leased {
            return None;
        }
        Some(self.claim(&mut slot))
    }

    fn claim(self: &Arc<Self>, slot: &mut Slot) -> DeliveryLease {
        slot.running = true;
        slot.leased = true;
        slot.epoch += 1;
        DeliveryLease {
            control: Arc::clone(self),
            epoch: slot.epoch,
        }
    }

    /// Claims the slot, first waiting for a stopped loop to exit. Returns
    /// `None` if a loop is still running.
    pub(crate) async fn start(self: &Arc<Self>) -> Option<DeliveryLease> {
        loop {
            let mut released = pin!(self.released.notified());
            released.as_mut().enable();
            {
                let mut slot = self.slot();
                if slot.running {
                    return None;
                }
                if !slot.leased {
                    return Some(self.claim(&mut slot));
                }
            }
            released.await;
        }
    }

    /// Waits until no loop holds the slot.
    pub(crate) async fn wait_idle(&self) {
        loop {
            let mut released = pin!(self.released.notified());
            released.as_mut().enable();
            if !self.slot().leased {
                return;
            }
            released.await;
        }
    }

    /// Asks the running loop to exit. An idle loop wakes up; a loop in the
    /// middle of a send abandons it and requeues the frame.
    pub(crate) fn stop(&self) {
        self.slot().running = false;
        self.interrupt.notify_waiters();
        self.interrupt.notify_one();
    }

    /// Wakes the loop without asking it to stop.
    #[cfg(test)]
    pub(crate) fn nudge(&self) {
        self.interrupt.notify_one();
    }

    pub(crate) fn is_running(&self) -> bool {
        self.slot().running
    }

    fn is_current(&self, epoch: u64) -> bool {
        let slot = self.slot();
        slot.running && slot.epoch == epoch
    }

    /// Resolves once the loop with `epoch` has been stopped or superseded.
    /// Stray wake-ups are absorbed.
    async fn stopped(&self, epoch: u64) {
        loop {
            let mut woken = pin!(self.interrupt.notified());
            woken.as_mut().enable();
            if !self.is_current(epoch) {
                return;
            }
            woken.await;
        }
    }

    /// Puts a frame back at the head and marks the loop stopped. The lease
    /// is still held, so nothing can pop before the frame is back.
    fn requeue(&self, epoch: u64, queue: &OutboundQueue, frame: String) {
        let mut slot = self.slot();
        queue.push_front(frame);
        if slot.epoch == epoch {
            slot.running = false;
        }
    }
}

/// How a delivery loop ended.
#[derive(Debug)]
pub(crate) enum DeliveryOutcome {
    /// `stop()` was called. A frame that was being sent is back at the
    /// head of the queue.
    Stopped,
    /// A write failed; the frame is back at the head of the queue.
    SendFailed(MediatorError),
}

/// Drains `queue` into `conn` until stopped or a write fails.
pub(crate) async fn run_delivery<K: Connection>(
    room_id: RoomId,
    lease: DeliveryLease,
    queue: &OutboundQueue,
    conn: Arc<K>,
    send_timeout: Option<Duration>,
) -> DeliveryOutcome {
    let control = Arc::clone(&lease.control);
    let epoch = lease.epoch();
    let conn_id = conn.id();
    tracing::debug!(%room_id, %conn_id, epoch, "room writer started");

    let outcome = loop {
        let next = tokio::select! {
            biased;
            () = control.stopped(epoch) => None,
            frame = queue.pop() => Some(frame),
        };
        let Some(frame) = next else {
            break DeliveryOutcome::Stopped;
        };

        tracing::trace!(
            %room_id, %conn_id, open = conn.is_open(), %frame,
            "sending to room"
        );

        let sent = tokio::select! {
            biased;
            () = control.stopped(epoch) => None,
            sent = send(conn.as_ref(), &frame, send_timeout) => Some(sent),
        };

        match sent {
            Some(Ok(())) => {}
            Some(Err(e)) => {
                tracing::warn!(
                    %room_id, %conn_id, error = %e,
                    "send to room failed, stopping writer"
                );
                // Back at the head so the next connection sends it first.
                control.requeue(epoch, queue, frame);
                break DeliveryOutcome::SendFailed(MediatorError::SendFailure(e));
            }
            None => {
                tracing::debug!(
                    %room_id, %conn_id,
                    "writer stopped mid-send, requeueing frame"
                );
                control.requeue(epoch, queue, frame);
                break DeliveryOutcome::Stopped;
            }
        }
    };

    tracing::debug!(%room_id, %conn_id, epoch, "room writer stopped");
    drop(lease);
    outcome
}

async fn send<K: Connection>(
    conn: &K,
    frame: &str,
    send_timeout: Option<Duration>,
) -> Result<(), TransportError> {
    match send_timeout {
        Some(limit) => tokio::time::timeout(limit, conn.send_text(frame))
            .await
            .unwrap_or_else(|_| {
                Err(TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::TimedOut,
                    "send timed out",
                )))
            }),
        None => conn.send_text(frame).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use roomlink_transport::ConnectionId;

    use super::*;

    /// Records frames; fails the write whose index equals `fail_at`.
    /// With `stall`, every write hangs forever.
    #[derive(Default)]
    struct RecordingConnection {
        sent: Mutex<Vec<String>>,
        attempts: AtomicUsize,
        fail_at: Option<usize>,
        stall: bool,
    }

    impl Connection for RecordingConnection {
        async fn send_text(&self, text: &str) -> Result<(), TransportError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                std::future::pending::<()>().await;
            }
            if self.fail_at == Some(attempt) {
                return Err(TransportError::ConnectionClosed("test".into()));
            }
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn close(&self) -> Result<(), TransportError> {
            Ok(())
        }

        fn is_open(&self) -> bool {
            true
        }

        fn id(&self) -> ConnectionId {
            ConnectionId::new(1)
        }
    }

    struct Harness {
        queue: Arc<OutboundQueue>,
        control: Arc<DeliveryControl>,
        conn: Arc<RecordingConnection>,
    }

    impl Harness {
        fn new(conn: RecordingConnection) -> Self {
            Self {
                queue: Arc::new(OutboundQueue::new()),
                control: Arc::new(DeliveryControl::default()),
                conn: Arc::new(conn),
            }
        }

        fn spawn(
            &self,
            send_timeout: Option<Duration>,
        ) -> tokio::task::JoinHandle<DeliveryOutcome> {
            let lease = self.control.try_start().expect("slot should be free");
            self.run(lease, Arc::clone(&self.conn), send_timeout)
        }

        fn run(
            &self,
            lease: DeliveryLease,
            conn: Arc<RecordingConnection>,
            send_timeout: Option<Duration>,
        ) -> tokio::task::JoinHandle<DeliveryOutcome> {
            let queue = Arc::clone(&self.queue);
            tokio::spawn(async move {
                run_delivery(RoomId::new("r1"), lease, &queue, conn, send_timeout)
                    .await
            })
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn test_delivers_in_fifo_order() {
        let h = Harness::new(RecordingConnection::default());
        let task = h.spawn(None);

        for i in 0..5 {
            h.queue.push_back(format!("m{i}"));
        }
        settle().await;
        assert_eq!(*h.conn.sent.lock().unwrap(), ["m0", "m1", "m2", "m3", "m4"]);

        h.control.stop();
        let outcome = task.await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Stopped));
        assert!(!h.control.is_running());
    }

    #[tokio::test]
    async fn test_failed_send_goes_back_to_front_and_stops() {
        let h = Harness::new(RecordingConnection {
            fail_at: Some(1),
            ..Default::default()
        });
        h.queue.push_back("a".into());
        h.queue.push_back("b".into());
        h.queue.push_back("c".into());

        let outcome = h.spawn(None).await.unwrap();
        assert!(matches!(
            outcome,
            DeliveryOutcome::SendFailed(MediatorError::SendFailure(_))
        ));
        assert_eq!(*h.conn.sent.lock().unwrap(), ["a"]);
        assert_eq!(h.queue.snapshot(), ["b", "c"]);
        assert!(!h.control.is_running());
        assert!(h.control.try_start().is_some());
    }

    #[tokio::test]
    async fn test_stop_while_idle_exits() {
        let h = Harness::new(RecordingConnection::default());
        let task = h.spawn(None);
        settle().await;
        assert!(!task.is_finished());

        h.control.stop();
        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("loop should exit promptly")
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Stopped));
    }

    #[tokio::test]
    async fn test_stop_mid_send_requeues_frame() {
        let h = Harness::new(RecordingConnection {
            stall: true,
            ..Default::default()
        });
        h.queue.push_back("a".into());
        h.queue.push_back("b".into());
        let task = h.spawn(None);
        settle().await;
        assert_eq!(h.queue.snapshot(), ["b"]);

        h.control.stop();
        let outcome = tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("a stalled send must not pin the loop")
            .unwrap();
        assert!(matches!(outcome, DeliveryOutcome::Stopped));
        assert_eq!(h.queue.snapshot(), ["a", "b"]);
    }

    #[tokio::test]
    async fn test_spurious_wake_keeps_running() {
        let h = Harness::new(RecordingConnection::default());
        let task = h.spawn(None);
        settle().await;

        h.control.nudge();
        settle().await;
        assert!(!task.is_finished());
        assert!(h.control.is_running());

        h.queue.push_back("after".into());
        settle().await;
        assert_eq!(*h.conn.sent.lock().unwrap(), ["after"]);

        h.control.stop();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_only_one_lease_at_a_time() {
        let control = Arc::new(DeliveryControl::default());
        let first = control.try_start().expect("slot should be free");
        assert_eq!(first.epoch(), 1);
        assert!(control.try_start().is_none());

        // Stopped but not yet exited: still taken.
        control.stop();
        assert!(control.try_start().is_none());

        drop(first);
        assert_eq!(control.try_start().map(|l| l.epoch()), Some(2));
    }

    #[tokio::test]
    async fn test_start_waits_for_previous_lease() {
        let control = Arc::new(DeliveryControl::default());
        let first = control.try_start().unwrap();

        // Still running: nothing to wait for, the caller keeps the old loop.
        assert!(control.start().await.is_none());

        control.stop();
        let pending =
            tokio::time::timeout(Duration::from_millis(20), control.start()).await;
        assert!(pending.is_err(), "must not start beside a live lease");

        let waiter = {
            let control = Arc::clone(&control);
            tokio::spawn(async move { control.start().await.map(|l| l.epoch()) })
        };
        settle().await;
        drop(first);
        let epoch = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("start should resume once the lease is released")
            .unwrap();
        assert_eq!(epoch, Some(2));
    }

    #[tokio::test]
    async fn test_wait_idle_tracks_lease() {
        let control = Arc::new(DeliveryControl::default());
        control.wait_idle().await;

        let lease = control.try_start().unwrap();
        let pending =
            tokio::time::timeout(Duration::from_millis(20), control.wait_idle()).await;
        assert!(pending.is_err());

        drop(lease);
        tokio::time::timeout(Duration::from_secs(1), control.wait_idle())
            .await
            .expect("idle once the lease is gone");
    }

    #[tokio::test]
    async fn test_restart_after_stop_sends_requeued_frame_first() {
        let h = Harness::new(RecordingConnection {
            stall: true,
            ..Default::default()
        });
        h.queue.push_back("m1".into());
        let old = h.spawn(None);
        settle().await;

        h.control.stop();
        h.queue.push_back("m2".into());
        let lease = h.control.start().await.expect("slot frees after exit");
        assert!(matches!(old.await.unwrap(), DeliveryOutcome::Stopped));

        let fresh = Arc::new(RecordingConnection::default());
        let new = h.run(lease, Arc::clone(&fresh), None);
        settle().await;
        assert_eq!(*fresh.sent.lock().unwrap(), ["m1", "m2"]);

        h.control.stop();
        new.await.unwrap();
    }

    #[tokio::test]
    async fn test_send_timeout_counts_as_failure() {
        let h = Harness::new(RecordingConnection {
            stall: true,
            ..Default::default()
        });
        h.queue.push_back("stuck".into());

        let outcome = h.spawn(Some(Duration::from_millis(20))).await.unwrap();
        assert!(matches!(outcome, DeliveryOutcome::SendFailed(_)));
        assert_eq!(h.queue.snapshot(), ["stuck"]);
    }
}
