//! The mainloop: timers, I/O and signals on one thread.
//!
//! Each iteration does one unit of work, then inspects the signal latches:
//!
//! 1. stop if `stop_on_empty` is set and no channel is registered;
//! 2. with timers pending, dispatch due timers and spend the wait for the
//!    next one in a single reactor pass (the interleaver breaks out after it);
//! 3. otherwise run one reactor pass with the reactor's idle timeout;
//! 4. notify observers of every latched signal, then clear the latch;
//! 5. return once the termination signal has been observed.

use std::rc::Rc;

use nix::sys::signal::Signal;
use tracing::{debug, info};

use crate::config::MainloopConfig;
use crate::error::{MainloopError, MainloopResult};
use crate::observer::{ObserverId, SignalObserver, SignalObservers};
use crate::reactor::{PollReactor, Reactor, ReactorHandle};
use crate::scheduler::{Interleaver, Scheduler};
use crate::signal::InstalledLatches;
use crate::stats::LoopStats;

/// Why [`Mainloop::run`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunExit {
    /// The termination signal was observed.
    Terminated(Signal),
    /// `stop_on_empty` was set and the last channel went away.
    Drained,
}

/// Single-threaded loop owning a scheduler, a reactor and signal observers.
pub struct Mainloop<R: Reactor = PollReactor> {
    config: MainloopConfig,
    scheduler: Scheduler,
    reactor: R,
    observers: SignalObservers,
    stats: LoopStats,
}

impl Mainloop<PollReactor> {
    /// Create a mainloop over a poll(2) reactor whose idle timeout comes
    /// from the config.
    pub fn new(config: MainloopConfig) -> MainloopResult<Self> {
        let reactor = PollReactor::new(config.idle_timeout());
        Self::with_reactor(config, reactor)
    }

    /// Handle used to register I/O channels.
    pub fn reactor_handle(&self) -> ReactorHandle {
        self.reactor.handle()
    }
}

impl<R: Reactor> Mainloop<R> {
    /// Create a mainloop over a caller-supplied reactor.
    ///
    /// Idle passes use the reactor's own default timeout.
    pub fn with_reactor(config: MainloopConfig, reactor: R) -> MainloopResult<Self> {
        config.validate().map_err(MainloopError::Config)?;
        Ok(Self {
            config,
            scheduler: Scheduler::new(),
            reactor,
            observers: SignalObservers::new(),
            stats: LoopStats::new(),
        })
    }

    /// Handle to the timer queue.
    pub fn scheduler(&self) -> Scheduler {
        self.scheduler.clone()
    }

    pub fn reactor(&self) -> &R {
        &self.reactor
    }

    pub fn reactor_mut(&mut self) -> &mut R {
        &mut self.reactor
    }

    /// Handle to the observer registrations, usable from callbacks.
    pub fn observers(&self) -> SignalObservers {
        self.observers.clone()
    }

    /// Register an observer for every watched signal.
    ///
    /// The loop does not keep the observer alive.
    pub fn register_signal<O: SignalObserver + 'static>(&self, observer: &Rc<O>) -> ObserverId {
        self.observers.register(observer)
    }

    /// Remove an observer registration.
    pub fn unregister_signal(&self, id: ObserverId) -> bool {
        self.observers.unregister(id)
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn config(&self) -> &MainloopConfig {
        &self.config
    }

    /// Run until the termination signal is observed, or until no channel is
    /// left when `stop_on_empty` is set.
    ///
    /// Signal dispositions are installed on entry and restored on every
    /// return path. Handler errors end the run and are returned as is.
    pub fn run(&mut self) -> MainloopResult<RunExit> {
        let latches = InstalledLatches::install(&self.config.signals())?;
        let termination = self.config.termination_signal;
        self.stats.mark_start();
        info!(
            "Mainloop running (terminates on {}, stop_on_empty={})",
            termination, self.config.stop_on_empty
        );

        loop {
            self.stats.record_iteration();

            if self.config.stop_on_empty && self.reactor.is_idle() {
                info!("No channels left, mainloop stopping");
                return Ok(RunExit::Drained);
            }

            if self.scheduler.is_empty() {
                self.reactor.poll_once(None)?;
                self.stats.record_reactor_passes(1);
            } else {
                let mut interleaver = Interleaver::new(&mut self.reactor);
                let result = self.scheduler.run_due(&mut interleaver)?;
                self.stats.record_reactor_passes(interleaver.passes() as u64);
                self.stats.record_timers_fired(result.fired() as u64);
                // The breakout only exists to get back here.
                if result.is_breakout() {
                    self.stats.record_breakout();
                }
            }

            let mut terminated = false;
            for latch in latches.latches() {
                if !latch.is_set() {
                    continue;
                }
                let signal = latch.signal();
                debug!("Observed {}", signal);
                let notified = self.observers.notify(signal)?;
                latch.clear();
                self.stats.record_signal(notified as u64);
                terminated |= signal == termination;
            }

            if terminated {
                info!("Mainloop terminated by {}", termination);
                return Ok(RunExit::Terminated(termination));
            }
        }
    }
}

#[cfg(test)]
#[path = "mainloop_tests.rs"]
mod tests;
