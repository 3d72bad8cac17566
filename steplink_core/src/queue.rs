//! Bounded single-producer/single-consumer queues with explicit overflow
//! policies.
//!
//! Neither side ever blocks on a full or empty queue: overflow is resolved
//! by the queue's policy, and an empty queue reads as `None`.

use crossbeam_channel as xch;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// What a full queue does with the next push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverflowPolicy {
    /// Evict the oldest queued item to admit the new one.
    DropOldest,
    /// Keep what is queued; discard the incoming item.
    DropNewest,
}

/// Result of a single push.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest item.
    DisplacedOldest,
    /// Discarded (full under `DropNewest`).
    Rejected,
}

#[derive(Debug, Default)]
struct Counters {
    pushed: AtomicU64,
    dropped: AtomicU64,
}

pub struct QueueProducer<T> {
    tx: xch::Sender<T>,
    // Lets the producer evict from the head under DropOldest
    evict: xch::Receiver<T>,
    policy: OverflowPolicy,
    counters: Arc<Counters>,
}

pub struct QueueConsumer<T> {
    rx: xch::Receiver<T>,
    counters: Arc<Counters>,
}

/// Create a queue of `capacity` items (min 1) with the given policy.
pub fn bounded<T>(capacity: usize, policy: OverflowPolicy) -> (QueueProducer<T>, QueueConsumer<T>) {
    let (tx, rx) = xch::bounded(capacity.max(1));
    let counters = Arc::new(Counters::default());
    (
        QueueProducer {
            tx,
            evict: rx.clone(),
            policy,
            counters: counters.clone(),
        },
        QueueConsumer { rx, counters },
    )
}

/// Capacity-1 latest-wins slot: a new item replaces any unconsumed one.
pub fn latest_slot<T>() -> (QueueProducer<T>, QueueConsumer<T>) {
    bounded(1, OverflowPolicy::DropOldest)
}

impl<T> QueueProducer<T> {
    pub fn push(&self, item: T) -> PushOutcome {
        let mut item = item;
        let mut displaced = false;
        loop {
            match self.tx.try_send(item) {
                Ok(()) => {
                    self.counters.pushed.fetch_add(1, Ordering::Relaxed);
                    return if displaced {
                        PushOutcome::DisplacedOldest
                    } else {
                        PushOutcome::Queued
                    };
                }
                Err(xch::TrySendError::Full(back)) => match self.policy {
                    OverflowPolicy::DropNewest => {
                        self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                        return PushOutcome::Rejected;
                    }
                    OverflowPolicy::DropOldest => {
                        // The consumer may have emptied the slot meanwhile; either way retry
                        if self.evict.try_recv().is_ok() {
                            self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                            displaced = true;
                        }
                        item = back;
                    }
                },
                Err(xch::TrySendError::Disconnected(_)) => {
                    self.counters.dropped.fetch_add(1, Ordering::Relaxed);
                    return PushOutcome::Rejected;
                }
            }
        }
    }

    pub fn policy(&self) -> OverflowPolicy {
        self.policy
    }

    /// Items lost to overflow so far.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }
}

impl<T> QueueConsumer<T> {
    /// Oldest queued item, if any. Never blocks.
    pub fn try_next(&self) -> Option<T> {
        self.rx.try_recv().ok()
    }

    /// Newest queued item, discarding everything older. Never blocks.
    pub fn latest(&self) -> Option<T> {
        self.rx.try_iter().last()
    }

    /// Everything queued right now, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = T> + '_ {
        self.rx.try_iter()
    }

    /// Wait up to `timeout` for an item. Used by worker loops, not by consumers
    /// on the UI side.
    pub fn next_timeout(&self, timeout: Duration) -> Option<T> {
        self.rx.recv_timeout(timeout).ok()
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Items lost to overflow so far.
    pub fn dropped(&self) -> u64 {
        self.counters.dropped.load(Ordering::Relaxed)
    }

    /// Items accepted so far.
    pub fn pushed(&self) -> u64 {
        self.counters.pushed.load(Ordering::Relaxed)
    }
}
