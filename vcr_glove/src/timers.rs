//! Deadline-ordered timer queue.
//!
//! Every suspension point of the engine is an entry here: "run this event at
//! time D". The engine never sleeps; whoever drives it (the async service or
//! a test stepping a manual clock) pops due events in order.
//!
//! Ordering: earliest deadline first; equal deadlines fire in insertion
//! order.

use crate::scheduler::TaskHandle;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::time::Duration;

/// Deferred work understood by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimerEvent {
    /// Repeating cycle trigger of a stimulation task.
    CycleTick {
        /// Task the tick belongs to; stale handles are ignored.
        handle: TaskHandle,
    },
    /// End of a timed task's countdown.
    Expire {
        /// Task the countdown belongs to; stale handles are ignored.
        handle: TaskHandle,
    },
    /// Staggered single-motor activation within a cyclic-burst cycle.
    BurstOn {
        /// Task the burst belongs to; dropped if the task is gone.
        handle: TaskHandle,
        /// Motor index.
        motor: u8,
        /// Amplitude, percent.
        amplitude: u8,
    },
    /// All-off that ends a burst. Fires even if its task has stopped.
    BurstOff {
        /// Glove position.
        position: String,
    },
    /// Discovery poll while scanning.
    Poll {
        /// Scan session the poll belongs to.
        generation: u64,
    },
    /// One-shot device refresh after a disconnect.
    Refresh,
    /// Refresh plus confirmation buzz after a pair request.
    PairFollowUp {
        /// Device identifier.
        id: String,
        /// Position known when the pair was requested.
        position: Option<String>,
    },
}

#[derive(Debug)]
struct Entry<E> {
    deadline: Duration,
    seq: u64,
    event: E,
}

impl<E> PartialEq for Entry<E> {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl<E> Eq for Entry<E> {}

impl<E> PartialOrd for Entry<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<E> Ord for Entry<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

/// Min-heap of pending events keyed by `(deadline, insertion order)`.
#[derive(Debug)]
pub struct TimerQueue<E = TimerEvent> {
    heap: BinaryHeap<Reverse<Entry<E>>>,
    next_seq: u64,
}

impl<E> TimerQueue<E> {
    /// Empty queue.
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Schedule `event` at `deadline`.
    pub fn schedule(&mut self, deadline: Duration, event: E) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Entry {
            deadline,
            seq,
            event,
        }));
    }

    /// Earliest pending deadline.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.heap.peek().map(|Reverse(e)| e.deadline)
    }

    /// Pop the earliest event if it is due at `now`.
    pub fn pop_due(&mut self, now: Duration) -> Option<(Duration, E)> {
        if self.next_deadline()? > now {
            return None;
        }
        self.heap.pop().map(|Reverse(e)| (e.deadline, e.event))
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

impl<E> Default for TimerQueue<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// Next deadline of a repeating timer, anchored on the previous deadline.
///
/// Anchoring on the deadline rather than the firing time keeps the period
/// free of accumulated lateness. If the loop fell more than one period
/// behind, missed periods are skipped instead of replayed.
pub fn next_periodic_deadline(previous: Duration, period: Duration, now: Duration) -> Duration {
    let next = previous.saturating_add(period);
    if next > now || period.is_zero() {
        return next;
    }
    let behind = (now - previous).as_nanos() / period.as_nanos();
    let steps = u32::try_from(behind + 1).unwrap_or(u32::MAX);
    previous.saturating_add(period.saturating_mul(steps))
}
