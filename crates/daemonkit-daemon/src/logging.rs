//! Log setup for daemons.
//!
//! Logs go to the daemon's log file through a non-blocking writer, and also
//! to stderr while the daemon runs in the foreground.

use std::fs::{File, OpenOptions};
use std::path::PathBuf;

use tracing::{error, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::DaemonProfile;
use crate::error::BootstrapError;
use crate::options::DaemonOptions;

/// How a daemon wants its logs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// File receiving every log line.
    pub log_file: PathBuf,
    /// Default to `debug` instead of `info` when `RUST_LOG` is unset.
    pub debug: bool,
    /// Also log to stderr.
    pub stderr_logging: bool,
    /// Include thread names in log lines.
    pub multithreaded: bool,
}

impl LoggingConfig {
    /// Settings derived from a daemon's profile and parsed options.
    pub fn for_daemon(profile: &DaemonProfile, options: &DaemonOptions) -> Self {
        Self {
            log_file: profile.log_file(),
            debug: options.debug,
            stderr_logging: options.foreground,
            multithreaded: profile.multithreaded,
        }
    }

    fn default_directive(&self) -> &'static str {
        if self.debug {
            "debug"
        } else {
            "info"
        }
    }
}

/// Keeps log output alive; dropping it flushes the file writer.
#[must_use = "dropping the guard stops file logging"]
pub struct LoggingGuard {
    _worker: Option<WorkerGuard>,
    installed: bool,
    file_logging: bool,
}

impl LoggingGuard {
    /// Whether this call installed the global subscriber. False when one was
    /// already set, in which case the existing subscriber keeps receiving
    /// the logs.
    pub fn installed(&self) -> bool {
        self.installed
    }

    /// Whether the log file could be opened.
    pub fn file_logging(&self) -> bool {
        self.file_logging
    }
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard")
            .field("installed", &self.installed)
            .field("file_logging", &self.file_logging)
            .finish()
    }
}

/// Install the global tracing subscriber.
///
/// A log file that cannot be opened is fatal unless stderr logging is on,
/// in which case the failure is reported there and logging continues
/// without the file.
pub fn setup_logging(config: &LoggingConfig) -> Result<LoggingGuard, BootstrapError> {
    let file = match open_log_file(config) {
        Ok(file) => Some(file),
        Err(e) if config.stderr_logging => {
            eprintln!("{}", e);
            None
        }
        Err(e) => return Err(e),
    };
    let file_logging = file.is_some();

    let (file_writer, worker) = match file {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directive()));

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(config.stderr_logging.then(|| {
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_thread_names(config.multithreaded)
        }))
        .with(file_writer.map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(config.debug)
                .with_thread_names(config.multithreaded)
        }))
        .try_init()
        .is_ok();

    if !installed {
        warn!("A global subscriber is already set, keeping it");
    } else if !file_logging {
        error!("Cannot log to file {}", config.log_file.display());
    }

    Ok(LoggingGuard {
        _worker: worker,
        installed,
        file_logging,
    })
}

fn open_log_file(config: &LoggingConfig) -> Result<File, BootstrapError> {
    OpenOptions::new()
        .append(true)
        .create(true)
        .open(&config.log_file)
        .map_err(|e| {
            BootstrapError::Logging(format!(
                "Cannot open log file {}: {}",
                config.log_file.display(),
                e
            ))
        })
}
