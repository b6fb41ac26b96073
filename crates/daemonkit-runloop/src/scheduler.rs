//! Scheduler - shared timer queue plus the pluggable wait strategy.
//!
//! [`Scheduler::run_due`] dispatches due events and, when work remains,
//! hands the remaining delay to a [`WaitStrategy`]. The mainloop uses the
//! [`Interleaver`], which turns that wait into exactly one reactor pass and
//! then breaks out so signals get inspected.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::trace;

use crate::error::{HandlerResult, MainloopError, MainloopResult};
use crate::reactor::Reactor;
use crate::timer::{TimerHandle, TimerQueue};

/// What a wait strategy wants the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Keep dispatching.
    Resume,
    /// Stop dispatching and return to the caller.
    Breakout,
}

/// How a [`Scheduler::run_due`] call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDue {
    /// The queue ran empty.
    Drained { fired: usize },
    /// The wait strategy asked to break out.
    BrokeOut { fired: usize },
}

impl RunDue {
    /// Number of callbacks dispatched by the call.
    pub fn fired(&self) -> usize {
        match *self {
            RunDue::Drained { fired } | RunDue::BrokeOut { fired } => fired,
        }
    }

    /// Whether the call ended through a breakout.
    pub fn is_breakout(&self) -> bool {
        matches!(self, RunDue::BrokeOut { .. })
    }
}

/// Blocks until the next event is due, or decides not to.
pub trait WaitStrategy {
    /// Wait for at most `timeout`.
    fn wait(&mut self, timeout: Duration) -> MainloopResult<WaitOutcome>;
}

/// Plain sleep, for schedulers driven without a reactor.
#[derive(Debug, Clone, Copy, Default)]
pub struct SleepWait;

impl WaitStrategy for SleepWait {
    fn wait(&mut self, timeout: Duration) -> MainloopResult<WaitOutcome> {
        if !timeout.is_zero() {
            thread::sleep(timeout);
        }
        Ok(WaitOutcome::Resume)
    }
}

/// Wait strategy that services I/O instead of sleeping.
///
/// Each wait is exactly one reactor pass bounded by the requested timeout,
/// including a zero timeout (non-blocking pass), followed by a breakout.
pub struct Interleaver<'a, R: Reactor + ?Sized> {
    reactor: &'a mut R,
    passes: usize,
}

impl<'a, R: Reactor + ?Sized> Interleaver<'a, R> {
    pub fn new(reactor: &'a mut R) -> Self {
        Self { reactor, passes: 0 }
    }

    /// Reactor passes performed so far.
    pub fn passes(&self) -> usize {
        self.passes
    }
}

impl<R: Reactor + ?Sized> WaitStrategy for Interleaver<'_, R> {
    fn wait(&mut self, timeout: Duration) -> MainloopResult<WaitOutcome> {
        self.reactor.poll_once(Some(timeout))?;
        self.passes += 1;
        Ok(WaitOutcome::Breakout)
    }
}

/// Cloneable handle to a shared [`TimerQueue`].
///
/// Callbacks may hold a clone and enter or cancel events while the queue is
/// being dispatched; no borrow is held while a callback runs.
#[derive(Clone, Default)]
pub struct Scheduler {
    queue: Rc<RefCell<TimerQueue>>,
}

impl Scheduler {
    /// Create a scheduler with an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `callback` to run `delay` from now.
    pub fn enter<F>(&self, delay: Duration, priority: i32, callback: F) -> TimerHandle
    where
        F: FnOnce() -> HandlerResult + 'static,
    {
        let handle = self.queue.borrow_mut().enter(delay, priority, Box::new(callback));
        trace!("Entered {} in {:?}", handle, delay);
        handle
    }

    /// Schedule `callback` to run at an absolute time.
    pub fn enter_at<F>(&self, fire_time: Instant, priority: i32, callback: F) -> TimerHandle
    where
        F: FnOnce() -> HandlerResult + 'static,
    {
        self.queue
            .borrow_mut()
            .enter_at(fire_time, priority, Box::new(callback))
    }

    /// Cancel a pending event. Returns false if it already fired or was
    /// cancelled.
    pub fn cancel(&self, handle: TimerHandle) -> bool {
        let cancelled = self.queue.borrow_mut().cancel(handle);
        if cancelled {
            trace!("Cancelled {}", handle);
        }
        cancelled
    }

    /// Whether an event is still pending.
    pub fn contains(&self, handle: TimerHandle) -> bool {
        self.queue.borrow().contains(handle)
    }

    pub fn is_empty(&self) -> bool {
        self.queue.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Fire time of the earliest pending event.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.queue.borrow_mut().next_deadline()
    }

    /// Dispatch due events, waiting through `wait` while work remains.
    ///
    /// Only events queued before the call (or before the last resumed wait)
    /// are eligible, so a callback that re-enters itself with zero delay
    /// runs once per call. Callback errors end the call immediately.
    pub fn run_due<W: WaitStrategy + ?Sized>(&self, wait: &mut W) -> MainloopResult<RunDue> {
        let mut fired = 0;
        let mut horizon = self.queue.borrow().horizon();

        loop {
            let due = self.queue.borrow_mut().pop_due(Instant::now(), horizon);
            if let Some(event) = due {
                trace!("Firing {}", event.handle);
                (event.callback)().map_err(MainloopError::Handler)?;
                fired += 1;
                continue;
            }

            let Some(deadline) = self.next_deadline() else {
                return Ok(RunDue::Drained { fired });
            };
            let delay = deadline.saturating_duration_since(Instant::now());
            match wait.wait(delay)? {
                WaitOutcome::Breakout => return Ok(RunDue::BrokeOut { fired }),
                WaitOutcome::Resume => horizon = self.queue.borrow().horizon(),
            }
        }
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("pending", &self.len())
            .finish()
    }
}
