//! Shared entry point for daemons.
//!
//! [`generic_main`] runs the fixed start-up sequence around a daemon's own
//! check and main functions:
//!
//! 1. add the common options and parse the command line;
//! 2. verify SSL files when SSL is enabled;
//! 3. run the daemon's start-condition check;
//! 4. create the required directories;
//! 5. detach from the terminal unless `--foreground` was given;
//! 6. write the PID file;
//! 7. set up logging and log the startup;
//! 8. run the daemon, removing the PID file afterwards.

use std::ffi::OsString;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgMatches, Command};
use tracing::{error, info};

use crate::config::DaemonProfile;
use crate::daemonize::{close_fds, daemonize};
use crate::directories::ensure_dirs;
use crate::error::{BootstrapError, BoxError};
use crate::logging::{setup_logging, LoggingConfig};
use crate::options::{add_common_options, DaemonOptions};
use crate::pid::PidFile;

/// Exit status of a daemon that failed to start or failed while running.
pub const EXIT_FAILURE: u8 = 1;

/// Run the start-up sequence with the process arguments and turn the
/// outcome into an exit status.
pub fn generic_main<C, E>(
    profile: &DaemonProfile,
    command: Command,
    dirs: &[(PathBuf, u32)],
    check_fn: C,
    exec_fn: E,
) -> ExitCode
where
    C: FnOnce(&DaemonOptions, &ArgMatches) -> Result<(), BoxError>,
    E: FnOnce(&DaemonOptions, &ArgMatches) -> Result<(), BoxError>,
{
    match run_generic(profile, command, std::env::args_os(), dirs, check_fn, exec_fn) {
        Ok(()) => ExitCode::SUCCESS,
        Err(BootstrapError::Usage(e)) => e.exit(),
        // Already logged by run_generic.
        Err(BootstrapError::Exec(_)) => ExitCode::from(EXIT_FAILURE),
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// The start-up sequence behind [`generic_main`], with explicit arguments.
///
/// Every failure before the daemon is detached is returned without side
/// effects beyond the directories already created.
pub fn run_generic<I, T, C, E>(
    profile: &DaemonProfile,
    command: Command,
    args: I,
    dirs: &[(PathBuf, u32)],
    check_fn: C,
    exec_fn: E,
) -> Result<(), BootstrapError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
    C: FnOnce(&DaemonOptions, &ArgMatches) -> Result<(), BoxError>,
    E: FnOnce(&DaemonOptions, &ArgMatches) -> Result<(), BoxError>,
{
    profile.validate().map_err(BootstrapError::Config)?;

    let matches = add_common_options(command, profile)
        .try_get_matches_from(args)
        .map_err(BootstrapError::Usage)?;
    let options = DaemonOptions::from_matches(&matches, profile);

    options.check_ssl()?;
    check_fn(&options, &matches).map_err(BootstrapError::Precondition)?;
    ensure_dirs(dirs)?;

    if options.fork() {
        close_fds(&[]);
        daemonize(&profile.log_file())?;
    }

    let mut pid_file = PidFile::new(profile.pid_file());
    pid_file.try_acquire()?;

    let _logging = setup_logging(&LoggingConfig::for_daemon(profile, &options))?;
    info!("{} daemon startup", profile.name);

    let result = exec_fn(&options, &matches).map_err(|e| {
        error!("{} daemon failed: {}", profile.name, e);
        BootstrapError::Exec(e)
    });

    // Remove the PID file while the log writer is still alive.
    drop(pid_file);
    result
}
