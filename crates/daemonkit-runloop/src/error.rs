//! Error types for the mainloop.

use std::path::PathBuf;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Error produced by a timer callback, channel handler or signal observer.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result type returned by every user-supplied handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Errors that can occur while running the mainloop.
#[derive(Debug, Error)]
pub enum MainloopError {
    /// A timer callback, channel handler or signal observer failed.
    ///
    /// The loop never swallows these; they end the current `run`.
    #[error("Handler failed: {0}")]
    Handler(#[source] HandlerError),

    /// The reactor's poll(2) call failed with something other than EINTR.
    #[error("Reactor pass failed: {0}")]
    Reactor(#[source] Errno),

    /// Installing or restoring a signal disposition failed.
    #[error("Failed to set up handler for {signal}: {source}")]
    SignalSetup {
        signal: Signal,
        #[source]
        source: Errno,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for mainloop operations.
pub type MainloopResult<T> = Result<T, MainloopError>;

/// Errors raised by the inotify file watch.
#[derive(Debug, Error)]
pub enum WatchError {
    /// Creating the inotify instance failed.
    #[error("Failed to initialize inotify: {0}")]
    Init(#[source] Errno),

    /// Adding the watch for a file failed.
    #[error("Could not add inotify watcher for {path}: {source}")]
    AddWatch {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    /// Removing a previously added watch failed.
    #[error("Could not remove inotify watcher for {path}: {source}")]
    RemoveWatch {
        path: PathBuf,
        #[source]
        source: Errno,
    },

    /// Reading queued events failed.
    #[error("Failed to read inotify events: {0}")]
    Read(#[source] Errno),
}
