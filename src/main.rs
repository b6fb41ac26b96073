//! daemonkit - sample daemon built on the daemonkit mainloop.
//!
//! Logs a heartbeat, optionally follows a file through inotify, reaps
//! children on SIGCHLD and stops on SIGTERM.

mod cli;
mod daemon;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::CommandFactory;

use daemonkit_daemon::{generic_main, BootstrapError, DaemonProfile, EXIT_FAILURE};

const DEFAULT_NAME: &str = "daemonkit";

fn main() -> ExitCode {
    let profile = match load_profile(cli::profile_path(std::env::args_os())) {
        Ok(profile) => profile,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    generic_main(
        &profile,
        cli::Cli::command(),
        &required_dirs(&profile),
        daemon::check,
        daemon::exec,
    )
}

fn load_profile(path: Option<PathBuf>) -> Result<DaemonProfile, BootstrapError> {
    match path {
        Some(path) => DaemonProfile::load(&path),
        None => Ok(DaemonProfile::new(DEFAULT_NAME)),
    }
}

/// Directories created before the daemon starts, with their modes.
fn required_dirs(profile: &DaemonProfile) -> Vec<(PathBuf, u32)> {
    let mut dirs = vec![(profile.pid_dir.clone(), 0o755)];
    if let Some(log_dir) = profile.log_file().parent() {
        if log_dir != profile.pid_dir && !log_dir.as_os_str().is_empty() {
            dirs.push((log_dir.to_path_buf(), 0o750));
        }
    }
    dirs
}
