//! Mainloop counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::Instant;

use serde::Serialize;

/// Counters maintained by a running mainloop.
#[derive(Debug, Default)]
pub struct LoopStats {
    /// Loop iterations started.
    pub iterations: AtomicU64,

    /// Reactor passes, whether issued by the interleaver or directly.
    pub reactor_passes: AtomicU64,

    /// Timer callbacks dispatched.
    pub timers_fired: AtomicU64,

    /// Breakouts consumed by the loop.
    pub breakouts: AtomicU64,

    /// Latched signals seen at iteration boundaries.
    pub signals_observed: AtomicU64,

    /// Individual `on_signal` calls.
    pub observer_notifications: AtomicU64,

    started: OnceLock<Instant>,
}

impl LoopStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the first start of the loop. Later calls keep the first time.
    pub fn mark_start(&self) {
        let _ = self.started.set(Instant::now());
    }

    /// Seconds since the loop first started.
    pub fn uptime_secs(&self) -> u64 {
        self.started
            .get()
            .map(|t| t.elapsed().as_secs())
            .unwrap_or(0)
    }

    pub fn record_iteration(&self) {
        self.iterations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reactor_passes(&self, count: u64) {
        self.reactor_passes.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_timers_fired(&self, count: u64) {
        self.timers_fired.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_breakout(&self) {
        self.breakouts.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one latched signal and the observers it reached.
    pub fn record_signal(&self, notified: u64) {
        self.signals_observed.fetch_add(1, Ordering::Relaxed);
        self.observer_notifications
            .fetch_add(notified, Ordering::Relaxed);
    }

    /// Get a snapshot of the counters.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.uptime_secs(),
            iterations: self.iterations.load(Ordering::Relaxed),
            reactor_passes: self.reactor_passes.load(Ordering::Relaxed),
            timers_fired: self.timers_fired.load(Ordering::Relaxed),
            breakouts: self.breakouts.load(Ordering::Relaxed),
            signals_observed: self.signals_observed.load(Ordering::Relaxed),
            observer_notifications: self.observer_notifications.load(Ordering::Relaxed),
        }
    }
}

/// Counters at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub iterations: u64,
    pub reactor_passes: u64,
    pub timers_fired: u64,
    pub breakouts: u64,
    pub signals_observed: u64,
    pub observer_notifications: u64,
}

impl StatsSnapshot {
    /// Average timer callbacks per iteration.
    pub fn timers_per_iteration(&self) -> f64 {
        if self.iterations == 0 {
            return 0.0;
        }
        self.timers_fired as f64 / self.iterations as f64
    }
}
