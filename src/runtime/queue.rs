use crate::error::Error;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

/// One pending unit of work: a callback and its state, captured together.
pub(crate) type WorkItem = Box<dyn FnOnce() + Send + 'static>;

/// A single slot in the work queue's arena.
///
/// The payload is published as a whole record: `None` means the slot is
/// reserved but its write has not completed yet, `Some` means the item is
/// safe to consume. Slots are shared by `Arc` so that a producer holding a
/// reservation and the consumer reading it always observe the same record,
/// even if the arena is regrown in between.
pub(crate) struct WorkSlot {
    payload: Mutex<Option<WorkItem>>,
}

impl WorkSlot {
    fn empty() -> Self {
        Self {
            payload: Mutex::new(None),
        }
    }

    /// Publishes the payload, marking the slot ready.
    fn publish(&self, work: WorkItem) {
        *self.payload.lock().unwrap() = Some(work);
    }

    /// Takes the payload if the slot is ready, clearing it for reuse.
    fn take(&self) -> Option<WorkItem> {
        self.payload.lock().unwrap().take()
    }
}

/// A growable multi-producer, single-consumer queue of pending work.
///
/// Items live in a circular arena of slots addressed by two monotonically
/// increasing counters: a slot's index is its counter value modulo the
/// current capacity, and the occupied count is `enqueue - dequeue`. One slot
/// is always kept free so full and empty states stay distinguishable; when
/// occupancy would reach `capacity - 1` the arena doubles.
///
/// The arena mutex serializes producers, growth, and all counter updates.
/// Payload writes happen outside of it, so two concurrently reserved slots
/// may fill in either order; the per-slot ready gate keeps the consumer from
/// reading a reservation before its write lands. The condition variable
/// parks the consumer while the queue is empty.
pub(crate) struct WorkQueue {
    /// Slot arena. Indexed by counter modulo `slots.len()`.
    slots: Mutex<Vec<Arc<WorkSlot>>>,

    /// Counter of the most recently granted reservation.
    enqueue_index: AtomicU64,

    /// Counter of the most recently consumed reservation.
    dequeue_index: AtomicU64,

    /// Set once the queue has been cancelled.
    cancelled: AtomicBool,

    /// Pairs with `available` to park the consumer while empty.
    sleeper: Mutex<()>,

    /// Signalled on enqueue and on cancellation.
    available: Condvar,
}

impl WorkQueue {
    /// Creates a queue with `capacity` slots.
    ///
    /// `capacity` must be at least 2; one slot is kept free to tell a full
    /// arena from an empty one. The builder enforces this bound.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let slots = (0..capacity).map(|_| Arc::new(WorkSlot::empty())).collect();

        Self {
            slots: Mutex::new(slots),
            enqueue_index: AtomicU64::new(0),
            dequeue_index: AtomicU64::new(0),
            cancelled: AtomicBool::new(false),
            sleeper: Mutex::new(()),
            available: Condvar::new(),
        }
    }

    /// Returns `true` when no reservation is waiting to be consumed.
    pub(crate) fn is_empty(&self) -> bool {
        self.dequeue_index.load(Ordering::Acquire) == self.enqueue_index.load(Ordering::Acquire)
    }

    /// Returns `true` once the queue has been cancelled.
    pub(crate) fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Enqueues one item. Safe to call from any number of threads.
    ///
    /// Reserves the next slot, publishes the payload, and wakes the consumer.
    /// If the reservation would fill the last free slot the arena grows
    /// first. Enqueueing on a cancelled queue is silently ignored; the items
    /// would never run.
    pub(crate) fn enqueue(&self, work: WorkItem) {
        if self.is_cancelled() {
            return;
        }

        let slot = {
            let mut slots = self.slots.lock().unwrap();

            if self.occupancy() >= slots.len() as u64 - 1 {
                self.grow(&mut slots);
            }

            let index = self.enqueue_index.load(Ordering::Acquire) + 1;
            self.enqueue_index.store(index, Ordering::Release);

            slots[(index % slots.len() as u64) as usize].clone()
        };

        // The reservation is visible before this write completes; the
        // consumer's ready gate bridges the gap.
        slot.publish(work);

        let _wake = self.sleeper.lock().unwrap();
        self.available.notify_one();
    }

    /// Dequeues the next item, blocking while the queue is empty.
    ///
    /// Single-consumer operation. Fails with [`Error::Cancelled`] once the
    /// queue has been cancelled, whether or not items are still queued.
    pub(crate) fn dequeue(&self) -> Result<WorkItem, Error> {
        loop {
            {
                let mut parked = self.sleeper.lock().unwrap();
                while self.is_empty() && !self.is_cancelled() {
                    parked = self.available.wait(parked).unwrap();
                }
            }

            if self.is_cancelled() {
                return Err(Error::Cancelled);
            }

            // Claim the next reservation under the arena lock. Emptiness is
            // re-verified there: growth re-homes the counters, so the
            // unlocked check above may have seen a torn pair.
            let claimed = {
                let slots = self.slots.lock().unwrap();
                let dequeue = self.dequeue_index.load(Ordering::Acquire);

                if dequeue == self.enqueue_index.load(Ordering::Acquire) {
                    None
                } else {
                    let index = dequeue + 1;
                    self.dequeue_index.store(index, Ordering::Release);
                    Some(slots[(index % slots.len() as u64) as usize].clone())
                }
            };

            let Some(slot) = claimed else {
                continue;
            };

            // The reservation is granted but its payload write may still be
            // in flight on the producer's thread. Yield until it lands.
            loop {
                if let Some(work) = slot.take() {
                    return Ok(work);
                }
                thread::yield_now();
            }
        }
    }

    /// Cancels the queue and wakes a blocked consumer. Idempotent.
    pub(crate) fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        tracing::debug!("work queue cancelled");

        let _wake = self.sleeper.lock().unwrap();
        self.available.notify_all();
    }

    fn occupancy(&self) -> u64 {
        self.enqueue_index.load(Ordering::Acquire) - self.dequeue_index.load(Ordering::Acquire)
    }

    /// Doubles the arena while holding its lock.
    ///
    /// Both counters are re-homed modulo the old capacity and every pending
    /// slot record is moved to the index its re-homed counter maps to under
    /// the new capacity, preserving arrival order. The records are moved by
    /// `Arc`, so an in-flight producer still publishes into the record the
    /// consumer will eventually read.
    fn grow(&self, slots: &mut Vec<Arc<WorkSlot>>) {
        let old_capacity = slots.len();
        let new_capacity = old_capacity * 2;

        let dequeue = self.dequeue_index.load(Ordering::Acquire);
        let enqueue = self.enqueue_index.load(Ordering::Acquire);
        let pending = enqueue - dequeue;
        let rebased = dequeue % old_capacity as u64;

        let mut grown: Vec<Arc<WorkSlot>> = (0..new_capacity)
            .map(|_| Arc::new(WorkSlot::empty()))
            .collect();

        for offset in 1..=pending {
            let from = ((dequeue + offset) % old_capacity as u64) as usize;
            let to = ((rebased + offset) % new_capacity as u64) as usize;
            grown[to] = slots[from].clone();
        }

        self.dequeue_index.store(rebased, Ordering::Release);
        self.enqueue_index.store(rebased + pending, Ordering::Release);
        *slots = grown;

        tracing::trace!(
            "work queue grown from {} to {} slots",
            old_capacity,
            new_capacity
        );
    }

    #[cfg(test)]
    fn capacity(&self) -> usize {
        self.slots.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn record(log: &Arc<Mutex<Vec<usize>>>, value: usize) -> WorkItem {
        let log = log.clone();
        Box::new(move || log.lock().unwrap().push(value))
    }

    #[test]
    fn test_items_dequeue_in_enqueue_order() {
        let queue = WorkQueue::with_capacity(8);
        let log = Arc::new(Mutex::new(Vec::new()));

        for value in 0..5 {
            queue.enqueue(record(&log, value));
        }
        for _ in 0..5 {
            queue.dequeue().unwrap()();
        }

        assert_eq!(*log.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_growth_preserves_pending_items() {
        let queue = WorkQueue::with_capacity(4);
        let log = Arc::new(Mutex::new(Vec::new()));

        // Interleave so the pending range wraps before the arena doubles.
        queue.enqueue(record(&log, 0));
        queue.enqueue(record(&log, 1));
        queue.dequeue().unwrap()();
        queue.dequeue().unwrap()();

        for value in 2..20 {
            queue.enqueue(record(&log, value));
        }
        assert!(queue.capacity() > 4);

        for _ in 2..20 {
            queue.dequeue().unwrap()();
        }

        assert_eq!(*log.lock().unwrap(), (0..20).collect::<Vec<_>>());
    }

    #[test]
    fn test_cancel_wakes_blocked_consumer() {
        let queue = Arc::new(WorkQueue::with_capacity(4));

        let blocked = queue.clone();
        let consumer = thread::spawn(move || blocked.dequeue());

        // Give the consumer time to park before cancelling.
        thread::sleep(Duration::from_millis(20));
        queue.cancel();
        queue.cancel();

        let result = consumer.join().unwrap();
        assert!(matches!(result, Err(Error::Cancelled)));
    }

    #[test]
    fn test_cancelled_queue_rejects_and_fails_dequeue() {
        let queue = WorkQueue::with_capacity(4);
        queue.cancel();

        queue.enqueue(Box::new(|| {}));

        assert!(queue.is_empty());
        assert!(matches!(queue.dequeue(), Err(Error::Cancelled)));
    }

    #[test]
    fn test_concurrent_producers_deliver_exactly_once_in_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 200;

        let queue = Arc::new(WorkQueue::with_capacity(4));
        let log = Arc::new(Mutex::new(Vec::new()));
        let executed = Arc::new(AtomicUsize::new(0));

        let consumer = {
            let queue = queue.clone();
            let executed = executed.clone();
            thread::spawn(move || {
                for _ in 0..PRODUCERS * PER_PRODUCER {
                    queue.dequeue().unwrap()();
                    executed.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|producer| {
                let queue = queue.clone();
                let log = log.clone();
                thread::spawn(move || {
                    for sequence in 0..PER_PRODUCER {
                        let log = log.clone();
                        queue.enqueue(Box::new(move || {
                            log.lock().unwrap().push((producer, sequence));
                        }));
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        consumer.join().unwrap();

        assert_eq!(executed.load(Ordering::SeqCst), PRODUCERS * PER_PRODUCER);

        // Every item ran exactly once, and each producer's items ran in the
        // order that producer enqueued them.
        let log = log.lock().unwrap();
        assert_eq!(log.len(), PRODUCERS * PER_PRODUCER);
        for producer in 0..PRODUCERS {
            let sequence: Vec<_> = log
                .iter()
                .filter(|(owner, _)| *owner == producer)
                .map(|(_, sequence)| *sequence)
                .collect();
            assert_eq!(sequence, (0..PER_PRODUCER).collect::<Vec<_>>());
        }
    }
}
