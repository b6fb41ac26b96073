//! # daemonkit RunLoop
//!
//! Single-threaded mainloop for Unix daemons. It interleaves three event
//! sources on one thread:
//!
//! - **Timers**: a deadline-ordered queue of one-shot callbacks
//! - **I/O**: channels serviced by one bounded poll(2) pass at a time
//! - **Signals**: async-signal-safe latches drained between passes
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────── Mainloop::run ───────────────────────────────┐
//! │                                                                               │
//! │   timers pending? ──yes──► Scheduler::run_due(Interleaver)                    │
//! │        │                      │  fire due callbacks                           │
//! │        no                     └► one reactor pass (≤ next deadline) ► break   │
//! │        ▼                                                                      │
//! │   one reactor pass (idle timeout)                                             │
//! │        │                                                                      │
//! │        ▼                                                                      │
//! │   latched signals ──► SignalObservers::notify ──► clear latch                 │
//! │        │                                                                      │
//! │        ▼                                                                      │
//! │   termination signal seen? ──yes──► return                                    │
//! └───────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Key Components
//!
//! - [`Mainloop`]: The loop itself
//! - [`Scheduler`] / [`TimerQueue`]: Timed callbacks
//! - [`Interleaver`]: Wait strategy that services I/O while waiting for timers
//! - [`PollReactor`] / [`Channel`]: I/O readiness dispatch
//! - [`SignalLatch`] / [`SignalObserver`]: Signal delivery
//! - [`FileWatchChannel`]: Inotify watch on a single file (Linux)
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use daemonkit_runloop::{Mainloop, MainloopConfig, RunExit};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut mainloop = Mainloop::new(MainloopConfig::default())?;
//!     mainloop.scheduler().enter(Duration::from_secs(1), 0, || {
//!         tracing::info!("tick");
//!         Ok(())
//!     });
//!
//!     let exit = mainloop.run()?;
//!     assert!(matches!(exit, RunExit::Terminated(_)));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod mainloop;
pub mod observer;
pub mod reactor;
pub mod scheduler;
pub mod signal;
pub mod stats;
pub mod timer;
#[cfg(any(target_os = "linux", target_os = "android"))]
pub mod watcher;

// Re-exports
pub use config::MainloopConfig;
pub use error::{HandlerError, HandlerResult, MainloopError, MainloopResult, WatchError};
pub use mainloop::{Mainloop, RunExit};
pub use observer::{ObserverId, SignalObserver, SignalObservers};
pub use reactor::{
    Channel, ChannelContext, ChannelId, Interest, PollReactor, Reactor, ReactorHandle, Readiness,
    DEFAULT_POLL_TIMEOUT,
};
pub use scheduler::{Interleaver, RunDue, Scheduler, SleepWait, WaitOutcome, WaitStrategy};
pub use signal::{InstalledLatches, SignalLatch};
pub use stats::{LoopStats, StatsSnapshot};
pub use timer::{Callback, ScheduledEvent, TimerHandle, TimerQueue, FAR_FUTURE};
#[cfg(any(target_os = "linux", target_os = "android"))]
pub use watcher::{FileWatch, FileWatchChannel};

// Signal type used throughout the public API.
pub use nix::sys::signal::Signal;
