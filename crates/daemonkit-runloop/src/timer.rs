//! TimerQueue - pending timed callbacks ordered by deadline.
//!
//! The queue owns no I/O and never sleeps; waiting for the next deadline is
//! the job of the [`Scheduler`](crate::scheduler::Scheduler) and its wait
//! strategy.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::time::{Duration, Instant};

use crate::error::HandlerResult;

/// Longest delay honoured by [`TimerQueue::enter`], about 100 years.
pub const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// Zero-argument action run when a scheduled event fires.
pub type Callback = Box<dyn FnOnce() -> HandlerResult>;

/// Handle identifying a scheduled event, used for cancellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerHandle(u64);

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer#{}", self.0)
    }
}

/// Ordering key of a scheduled event.
///
/// Field order matters: the derived `Ord` compares fire time, then priority
/// (lower first), then insertion sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct EventKey {
    fire_time: Instant,
    priority: i32,
    seq: u64,
}

/// Event popped from the queue, ready to be dispatched.
pub struct ScheduledEvent {
    /// Handle the event was registered under.
    pub handle: TimerHandle,
    /// Time the event was due.
    pub fire_time: Instant,
    /// Tie-break priority.
    pub priority: i32,
    /// The action to run.
    pub callback: Callback,
}

impl fmt::Debug for ScheduledEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScheduledEvent")
            .field("handle", &self.handle)
            .field("fire_time", &self.fire_time)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

/// Ordered collection of pending timed callbacks.
///
/// Cancellation removes the callback immediately; the heap entry left behind
/// is discarded when it reaches the top, or when dead entries outnumber the
/// live ones.
#[derive(Default)]
pub struct TimerQueue {
    heap: BinaryHeap<Reverse<EventKey>>,
    callbacks: HashMap<u64, Callback>,
    next_seq: u64,
}

impl TimerQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an event firing `delay` from now.
    ///
    /// Delays beyond what `Instant` can represent (`Duration::MAX` for
    /// "never") are clamped to [`FAR_FUTURE`] from now.
    pub fn enter(&mut self, delay: Duration, priority: i32, callback: Callback) -> TimerHandle {
        let now = Instant::now();
        let fire_time = now.checked_add(delay.min(FAR_FUTURE)).unwrap_or(now);
        self.enter_at(fire_time, priority, callback)
    }

    /// Insert an event firing at an absolute monotonic time.
    pub fn enter_at(&mut self, fire_time: Instant, priority: i32, callback: Callback) -> TimerHandle {
        let seq = self.next_seq;
        self.next_seq += 1;

        self.heap.push(Reverse(EventKey {
            fire_time,
            priority,
            seq,
        }));
        self.callbacks.insert(seq, callback);
        TimerHandle(seq)
    }

    /// Remove a pending event. Returns false if it already fired or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TimerHandle) -> bool {
        let removed = self.callbacks.remove(&handle.0).is_some();
        if self.callbacks.is_empty() {
            self.heap.clear();
        } else if self.heap.len() > 2 * self.callbacks.len() {
            // Mostly dead entries: rebuild so repeated cancel and re-enter
            // keeps the heap proportional to the pending events.
            let callbacks = &self.callbacks;
            self.heap.retain(|Reverse(key)| callbacks.contains_key(&key.seq));
        }
        removed
    }

    /// Check whether an event is still pending.
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.callbacks.contains_key(&handle.0)
    }

    /// Number of pending events.
    pub fn len(&self) -> usize {
        self.callbacks.len()
    }

    /// Whether no event is pending.
    pub fn is_empty(&self) -> bool {
        self.callbacks.is_empty()
    }

    /// Sequence number the next inserted event will get.
    ///
    /// Used as a horizon: events with a lower sequence existed before it
    /// was read.
    pub fn horizon(&self) -> u64 {
        self.next_seq
    }

    /// Fire time of the earliest pending event.
    pub fn next_deadline(&mut self) -> Option<Instant> {
        self.prune();
        self.heap.peek().map(|Reverse(key)| key.fire_time)
    }

    /// Pop the earliest event if it is due at `now` and older than `horizon`.
    pub fn pop_due(&mut self, now: Instant, horizon: u64) -> Option<ScheduledEvent> {
        self.prune();

        let Reverse(key) = *self.heap.peek()?;
        if key.fire_time > now || key.seq >= horizon {
            return None;
        }

        self.heap.pop();
        let callback = self.callbacks.remove(&key.seq)?;
        Some(ScheduledEvent {
            handle: TimerHandle(key.seq),
            fire_time: key.fire_time,
            priority: key.priority,
            callback,
        })
    }

    /// Drop cancelled entries sitting on top of the heap.
    fn prune(&mut self) {
        while let Some(Reverse(key)) = self.heap.peek() {
            if self.callbacks.contains_key(&key.seq) {
                break;
            }
            self.heap.pop();
        }
    }
}

impl fmt::Debug for TimerQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.callbacks.len())
            .field("next_seq", &self.next_seq)
            .finish()
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
