//! Bootstrap errors.

use std::path::PathBuf;
use thiserror::Error;

/// Error returned by a daemon's start-condition check or main function.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors that can occur while bringing a daemon up.
#[derive(Debug, Error)]
pub enum BootstrapError {
    /// Command line could not be parsed (also covers --help and --version).
    #[error("{0}")]
    Usage(#[source] clap::Error),

    /// SSL is enabled but the key or certificate path is empty.
    #[error("Need key and certificate to use ssl")]
    SslMissing,

    /// An SSL key or certificate is not a regular file.
    #[error("Need ssl file {0} to run")]
    SslFileMissing(PathBuf),

    /// The daemon's own start-condition check failed.
    #[error("Start condition not met: {0}")]
    Precondition(#[source] BoxError),

    /// A required directory could not be created or given its mode.
    #[error("Cannot set up needed directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A required directory path exists but is something else.
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),

    /// Detaching from the terminal failed.
    #[error("Failed to daemonize: {0}")]
    Fork(String),

    /// PID file names a process that is still alive.
    #[error("Daemon already running (PID file: {path}, PID: {pid})")]
    AlreadyRunning { path: PathBuf, pid: u32 },

    /// Failed to create PID file.
    #[error("Failed to create PID file at {path}: {reason}")]
    PidFileCreation { path: PathBuf, reason: String },

    /// Failed to read PID file.
    #[error("Failed to read PID file at {path}: {reason}")]
    PidFileRead { path: PathBuf, reason: String },

    /// Failed to remove PID file.
    #[error("Failed to remove PID file at {path}: {reason}")]
    PidFileRemoval { path: PathBuf, reason: String },

    /// Log output could not be set up.
    #[error("Failed to set up logging: {0}")]
    Logging(String),

    /// The daemon's main function failed.
    #[error("Daemon exited with error: {0}")]
    Exec(#[source] BoxError),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Profile error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Profile file could not be parsed.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),
}
