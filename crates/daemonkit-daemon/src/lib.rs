//! Bootstrap glue for daemonkit daemons.
//!
//! This crate provides:
//! - Common command-line options (foreground, debug, port, bind, SSL)
//! - Start-up preconditions and required directories
//! - Daemonization (double fork, new session, redirected stdio)
//! - PID file management
//! - Log setup
//! - [`generic_main`], which strings all of the above together

pub mod bootstrap;
pub mod config;
pub mod daemonize;
pub mod directories;
pub mod error;
pub mod logging;
pub mod options;
pub mod pid;

pub use bootstrap::{generic_main, run_generic, EXIT_FAILURE};
pub use config::{default_log_dir, DaemonProfile, SslDefaults};
pub use daemonize::{close_fds, daemonize};
pub use directories::ensure_dirs;
pub use error::{BootstrapError, BoxError};
pub use logging::{setup_logging, LoggingConfig, LoggingGuard};
pub use options::{add_common_options, DaemonOptions, SslOptions};
pub use pid::PidFile;
