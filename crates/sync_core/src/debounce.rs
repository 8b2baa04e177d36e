//! Coalesces bursts of watcher events into single sync passes.
//!
//! Intent: absorb editor save-storms (several filesystem events within
//! ~100 ms) into one pass over the change planner, rather than re-syncing
//! once per individual notification.

use std::time::Duration;

use crossbeam_channel::{select, Receiver, Sender};

/// Multiple-producer, single-consumer queue of path batches.
///
/// The watcher thread (or threads) push batches through [`EventQueue::sender`]
/// and never block on a full queue - the channel is unbounded, so
/// backpressure comes entirely from the debounce step downstream, not from
/// this queue. Ordering within a batch is preserved; inter-batch ordering is
/// FIFO.
///
/// A second, single-slot channel carries the interrupt [`Orchestrator::stop`]
/// raises: `debounced_deque` blocks in `receiver.recv()` (or sleeps out a
/// debounce window) on a dedicated thread, and nothing about that wait
/// otherwise notices an `AtomicBool` flipped from another thread - the stop
/// channel is what actually wakes it.
///
/// [`Orchestrator::stop`]: crate::Orchestrator::stop
#[derive(Clone)]
pub struct EventQueue {
    sender: Sender<Vec<String>>,
    receiver: Receiver<Vec<String>>,
    stop_sender: Sender<()>,
    stop_receiver: Receiver<()>,
}

impl Default for EventQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl EventQueue {
    pub fn new() -> Self {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let (stop_sender, stop_receiver) = crossbeam_channel::bounded(1);
        Self {
            sender,
            receiver,
            stop_sender,
            stop_receiver,
        }
    }

    /// A cloneable handle watcher threads push batches into.
    pub fn sender(&self) -> Sender<Vec<String>> {
        self.sender.clone()
    }

    /// A cloneable handle to the receiving half, for callers (like the
    /// orchestrator) that need to run the blocking debounce loop on a
    /// dedicated thread.
    pub fn clone_receiver(&self) -> Receiver<Vec<String>> {
        self.receiver.clone()
    }

    /// A cloneable handle to the stop-signal receiving half, passed into
    /// [`debounced_deque`] alongside the event receiver so a blocked wait can
    /// be woken.
    pub fn clone_stop_receiver(&self) -> Receiver<()> {
        self.stop_receiver.clone()
    }

    /// Wakes any thread currently blocked in [`debounced_deque`]. Idempotent:
    /// the channel is single-slot, so a signal already pending is not
    /// duplicated.
    pub fn interrupt(&self) {
        let _ = self.stop_sender.try_send(());
    }

    /// `true` if no batch is currently queued - used at the end of a sync
    /// pass to decide whether to fire the completion callback.
    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }

    /// Blocks until the debouncer has accumulated and quiesced one batch.
    ///
    /// Returns `None` if every sender has been dropped (shutdown) or if
    /// [`EventQueue::interrupt`] fires before any batch has arrived.
    pub fn recv_debounced(&self, debounce: Duration) -> Option<Vec<String>> {
        debounced_deque(&self.receiver, &self.stop_receiver, debounce)
    }
}

/// The debounce algorithm, parameterized over the receiving half so it can
/// be unit-tested against a bare channel:
///
/// 1. Block until one batch arrives (or `stop` fires, or every sender
///    drops); append its elements to the accumulator.
/// 2. Non-blocking drain of any batches already queued.
/// 3. Sleep `debounce`, interruptibly - `stop` firing mid-sleep ends the
///    wait early and returns whatever has accumulated so far.
/// 4. Non-blocking drain again. If nothing was drained in step 4, return the
///    accumulator. Otherwise go to step 3.
///
/// The accumulator may contain duplicates and non-canonical paths;
/// downstream canonicalizes and de-duplicates.
pub fn debounced_deque(
    receiver: &Receiver<Vec<String>>,
    stop: &Receiver<()>,
    debounce: Duration,
) -> Option<Vec<String>> {
    let mut accumulator = select! {
        recv(receiver) -> msg => msg.ok()?,
        recv(stop) -> _ => return None,
    };

    drain_into(receiver, &mut accumulator);

    loop {
        select! {
            recv(stop) -> _ => return Some(accumulator),
            default(debounce) => {}
        }

        let drained = drain_into(receiver, &mut accumulator);
        if drained == 0 {
            return Some(accumulator);
        }
    }
}

fn drain_into(receiver: &Receiver<Vec<String>>, accumulator: &mut Vec<String>) -> usize {
    let mut count = 0;
    while let Ok(batch) = receiver.try_recv() {
        accumulator.extend(batch);
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn coalesces_a_burst_into_one_batch() {
        let queue = EventQueue::new();
        let sender = queue.sender();

        sender.send(vec!["a".to_string()]).unwrap();
        sender.send(vec!["b".to_string(), "c".to_string()]).unwrap();

        let batch = queue.recv_debounced(Duration::from_millis(20)).unwrap();
        assert_eq!(batch, vec!["a", "b", "c"]);
    }

    #[test]
    fn waits_out_a_slow_trickle_before_returning() {
        let queue = EventQueue::new();
        let sender = queue.sender();

        sender.send(vec!["a".to_string()]).unwrap();

        let sender2 = sender.clone();
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(10));
            sender2.send(vec!["b".to_string()]).unwrap();
        });

        let batch = queue.recv_debounced(Duration::from_millis(30)).unwrap();
        assert_eq!(batch, vec!["a", "b"]);
    }

    #[test]
    fn returns_none_once_every_sender_is_dropped() {
        let (sender, receiver) = crossbeam_channel::unbounded::<Vec<String>>();
        let (_stop_sender, stop_receiver) = crossbeam_channel::bounded(1);
        drop(sender);
        assert!(debounced_deque(&receiver, &stop_receiver, Duration::from_millis(1)).is_none());
    }

    #[test]
    fn interrupt_wakes_a_wait_with_no_batch_pending() {
        let queue = EventQueue::new();

        let start = std::time::Instant::now();
        let handle = {
            let receiver = queue.clone_receiver();
            let stop = queue.clone_stop_receiver();
            std::thread::spawn(move || debounced_deque(&receiver, &stop, Duration::from_secs(60)))
        };

        std::thread::sleep(Duration::from_millis(10));
        queue.interrupt();

        let batch = handle.join().unwrap();
        assert!(batch.is_none());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn interrupt_mid_debounce_returns_what_accumulated_so_far() {
        let queue = EventQueue::new();
        let sender = queue.sender();
        sender.send(vec!["a".to_string()]).unwrap();

        let handle = {
            let receiver = queue.clone_receiver();
            let stop = queue.clone_stop_receiver();
            std::thread::spawn(move || debounced_deque(&receiver, &stop, Duration::from_secs(60)))
        };

        std::thread::sleep(Duration::from_millis(10));
        queue.interrupt();

        let batch = handle.join().unwrap();
        assert_eq!(batch, Some(vec!["a".to_string()]));
    }
}
