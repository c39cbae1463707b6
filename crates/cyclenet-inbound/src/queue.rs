//! A bounded, thread-safe queue of `(sender, message)` pairs.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use cyclenet_transport::ConnectionId;

/// What to do when a full queue receives another message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overflow {
    /// Evict the oldest entry to make room. For latest-wins kinds, where
    /// the old entries would be discarded anyway.
    DropOldest,
    /// Refuse the new entry. For FIFO kinds, where every queued entry is
    /// owed processing in order.
    DropNewest,
}

/// Outcome of one [`InboundQueue::enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Stored,
    /// Stored, and the oldest entry was evicted to make room.
    Evicted,
    /// Not stored; the queue was full.
    Rejected,
}

#[derive(Debug)]
struct Inner<T> {
    items: VecDeque<(ConnectionId, T)>,
    dropped: u64,
}

/// Ordered buffer of inbound messages of one kind.
///
/// Producers (receive tasks) call [`enqueue`](Self::enqueue); the tick loop
/// consumes with one of three reads:
///
/// - [`dequeue`](Self::dequeue): oldest entry, strict FIFO
/// - [`latest`](Self::latest): newest entry, everything older discarded
/// - [`drain`](Self::drain): lazy iterator, oldest first, until empty
#[derive(Debug)]
pub struct InboundQueue<T> {
    name: &'static str,
    capacity: usize,
    overflow: Overflow,
    inner: Mutex<Inner<T>>,
}

impl<T> InboundQueue<T> {
    /// Creates an empty queue. A `capacity` of zero is treated as one.
    pub fn new(name: &'static str, capacity: usize, overflow: Overflow) -> Self {
        let capacity = capacity.max(1);
        Self {
            name,
            capacity,
            overflow,
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity.min(64)),
                dropped: 0,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends a message. O(1).
    pub fn enqueue(&self, sender: ConnectionId, msg: T) -> Enqueued {
        let mut inner = self.lock();
        if inner.items.len() < self.capacity {
            inner.items.push_back((sender, msg));
            return Enqueued::Stored;
        }

        inner.dropped += 1;
        let dropped = inner.dropped;
        match self.overflow {
            Overflow::DropOldest => {
                inner.items.pop_front();
                inner.items.push_back((sender, msg));
                drop(inner);
                tracing::warn!(queue = self.name, %sender, dropped, "queue full, evicted oldest");
                Enqueued::Evicted
            }
            Overflow::DropNewest => {
                drop(inner);
                tracing::warn!(queue = self.name, %sender, dropped, "queue full, rejected message");
                Enqueued::Rejected
            }
        }
    }

    /// Pops the oldest entry.
    pub fn dequeue(&self) -> Option<(ConnectionId, T)> {
        self.lock().items.pop_front()
    }

    /// Returns the newest entry and discards everything older.
    ///
    /// The queue is empty afterwards. On an empty queue this is `None`:
    /// an entry already returned is never handed out twice.
    pub fn latest(&self) -> Option<(ConnectionId, T)> {
        let mut inner = self.lock();
        let newest = inner.items.pop_back();
        inner.items.clear();
        newest
    }

    /// Removes and yields entries oldest first until the queue is empty.
    ///
    /// Lazy: each step pops one entry under the lock, so messages enqueued
    /// while draining are yielded too.
    pub fn drain(&self) -> Drain<'_, T> {
        Drain { queue: self }
    }

    /// Entries currently waiting.
    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    /// True when nothing is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    /// Total messages evicted or rejected because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Label used in overflow logs.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum entries held before the overflow policy applies.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Iterator returned by [`InboundQueue::drain`].
#[derive(Debug)]
pub struct Drain<'a, T> {
    queue: &'a InboundQueue<T>,
}

impl<T> Iterator for Drain<'_, T> {
    type Item = (ConnectionId, T);

    fn next(&mut self) -> Option<Self::Item> {
        self.queue.dequeue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn conn(n: u64) -> ConnectionId {
        ConnectionId::new(n)
    }

    fn fifo(capacity: usize) -> InboundQueue<u32> {
        InboundQueue::new("test", capacity, Overflow::DropNewest)
    }

    // =========================================================================
    // dequeue
    // =========================================================================

    #[test]
    fn test_dequeue_returns_in_enqueue_order() {
        let q = fifo(16);
        q.enqueue(conn(1), 10);
        q.enqueue(conn(2), 20);
        q.enqueue(conn(1), 30);

        assert_eq!(q.dequeue(), Some((conn(1), 10)));
        assert_eq!(q.dequeue(), Some((conn(2), 20)));
        assert_eq!(q.dequeue(), Some((conn(1), 30)));
        assert_eq!(q.dequeue(), None);
    }

    #[test]
    fn test_dequeue_interleaved_with_enqueue_keeps_order() {
        let q = fifo(16);
        q.enqueue(conn(1), 1);
        q.enqueue(conn(1), 2);
        assert_eq!(q.dequeue().map(|(_, m)| m), Some(1));
        q.enqueue(conn(1), 3);
        assert_eq!(q.dequeue().map(|(_, m)| m), Some(2));
        assert_eq!(q.dequeue().map(|(_, m)| m), Some(3));
    }

    // =========================================================================
    // latest
    // =========================================================================

    #[test]
    fn test_latest_returns_newest_and_empties() {
        let q = InboundQueue::new("weather", 16, Overflow::DropOldest);
        q.enqueue(conn(1), "a");
        q.enqueue(conn(1), "b");
        q.enqueue(conn(2), "c");

        assert_eq!(q.latest(), Some((conn(2), "c")));
        assert!(q.is_empty());
        assert_eq!(q.latest(), None);
    }

    #[test]
    fn test_latest_on_empty_queue_is_none() {
        let q = fifo(4);
        assert_eq!(q.latest(), None);
    }

    #[test]
    fn test_latest_then_new_entry_returns_only_new_entry() {
        let q = fifo(4);
        q.enqueue(conn(1), 1);
        q.latest();
        q.enqueue(conn(1), 2);
        assert_eq!(q.latest(), Some((conn(1), 2)));
    }

    // =========================================================================
    // drain
    // =========================================================================

    #[test]
    fn test_drain_yields_all_oldest_first() {
        let q = fifo(16);
        for n in 0..5 {
            q.enqueue(conn(1), n);
        }
        let drained: Vec<u32> = q.drain().map(|(_, m)| m).collect();
        assert_eq!(drained, vec![0, 1, 2, 3, 4]);
        assert!(q.is_empty());
    }

    #[test]
    fn test_drain_is_lazy_and_sees_later_enqueues() {
        let q = fifo(16);
        q.enqueue(conn(1), 1);
        let mut drain = q.drain();
        assert_eq!(drain.next().map(|(_, m)| m), Some(1));
        q.enqueue(conn(1), 2);
        assert_eq!(drain.next().map(|(_, m)| m), Some(2));
        assert_eq!(drain.next(), None);
    }

    #[test]
    fn test_drain_partially_consumed_leaves_rest() {
        let q = fifo(16);
        for n in 0..4 {
            q.enqueue(conn(1), n);
        }
        let first_two: Vec<u32> = q.drain().take(2).map(|(_, m)| m).collect();
        assert_eq!(first_two, vec![0, 1]);
        assert_eq!(q.len(), 2);
    }

    // =========================================================================
    // Overflow
    // =========================================================================

    #[test]
    fn test_enqueue_full_drop_newest_rejects() {
        let q = fifo(2);
        assert_eq!(q.enqueue(conn(1), 1), Enqueued::Stored);
        assert_eq!(q.enqueue(conn(1), 2), Enqueued::Stored);
        assert_eq!(q.enqueue(conn(1), 3), Enqueued::Rejected);

        assert_eq!(q.dropped(), 1);
        let kept: Vec<u32> = q.drain().map(|(_, m)| m).collect();
        assert_eq!(kept, vec![1, 2]);
    }

    #[test]
    fn test_enqueue_full_drop_oldest_evicts_head() {
        let q = InboundQueue::new("latest", 2, Overflow::DropOldest);
        q.enqueue(conn(1), 1);
        q.enqueue(conn(1), 2);
        assert_eq!(q.enqueue(conn(1), 3), Enqueued::Evicted);

        assert_eq!(q.dropped(), 1);
        let kept: Vec<u32> = q.drain().map(|(_, m)| m).collect();
        assert_eq!(kept, vec![2, 3]);
    }

    #[test]
    fn test_new_zero_capacity_holds_one() {
        let q = fifo(0);
        assert_eq!(q.capacity(), 1);
        assert_eq!(q.enqueue(conn(1), 1), Enqueued::Stored);
        assert_eq!(q.enqueue(conn(1), 2), Enqueued::Rejected);
    }

    // =========================================================================
    // Concurrency
    // =========================================================================

    #[test]
    fn test_enqueue_from_many_threads_keeps_per_sender_order() {
        let q = Arc::new(fifo(10_000));
        let handles: Vec<_> = (1..=4u64)
            .map(|sender| {
                let q = Arc::clone(&q);
                std::thread::spawn(move || {
                    for n in 0..500u32 {
                        q.enqueue(conn(sender), n);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut last = [None::<u32>; 5];
        let mut total = 0;
        for (sender, n) in q.drain() {
            let slot = &mut last[sender.into_inner() as usize];
            assert!(slot.is_none_or(|prev| prev < n));
            *slot = Some(n);
            total += 1;
        }
        assert_eq!(total, 2000);
    }
}
