//! Detaching from the controlling terminal.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::sys::resource::{getrlimit, Resource};
use nix::sys::stat::{umask, Mode};
use nix::unistd::{chdir, close, dup2, fork, setsid, ForkResult};
use tracing::debug;

use crate::error::BootstrapError;

/// Descriptor count assumed when the hard limit is unlimited.
const FALLBACK_MAX_FD: RawFd = 1024;

/// Close every inherited descriptor above stderr except those in `keep`.
pub fn close_fds(keep: &[RawFd]) {
    let max_fd = max_fd(getrlimit(Resource::RLIMIT_NOFILE).ok().map(|(_, hard)| hard));
    for fd in 3..max_fd {
        if !keep.contains(&fd) {
            let _ = close(fd);
        }
    }
}

fn max_fd(hard_limit: Option<libc::rlim_t>) -> RawFd {
    match hard_limit {
        Some(limit) if limit != libc::RLIM_INFINITY => {
            RawFd::try_from(limit).unwrap_or(FALLBACK_MAX_FD)
        }
        _ => FALLBACK_MAX_FD,
    }
}

/// Become a daemon: double fork, new session, `/` as working directory,
/// umask 077, stdin from `/dev/null`, stdout and stderr appended to
/// `log_file`.
///
/// Only the grandchild returns; both parents exit with status 0.
pub fn daemonize(log_file: &Path) -> Result<(), BootstrapError> {
    // SAFETY: called during single-threaded start-up, before any thread is
    // spawned.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => return Err(BootstrapError::Fork(e.to_string())),
    }

    setsid().map_err(|e| BootstrapError::Fork(format!("setsid failed: {}", e)))?;

    // Second fork so the session leader goes away and the daemon can never
    // reacquire a controlling terminal.
    // SAFETY: still single-threaded.
    match unsafe { fork() } {
        Ok(ForkResult::Parent { .. }) => std::process::exit(0),
        Ok(ForkResult::Child) => {}
        Err(e) => return Err(BootstrapError::Fork(e.to_string())),
    }

    chdir("/").map_err(|e| BootstrapError::Fork(format!("chdir failed: {}", e)))?;
    umask(Mode::from_bits_truncate(0o077));

    redirect_stdio(log_file)?;
    debug!("Process daemonized (PID: {})", std::process::id());
    Ok(())
}

fn redirect_stdio(log_file: &Path) -> Result<(), BootstrapError> {
    let dev_null = File::open("/dev/null")
        .map_err(|e| BootstrapError::Fork(format!("Failed to open /dev/null: {}", e)))?;
    let log = OpenOptions::new()
        .append(true)
        .create(true)
        .mode(0o600)
        .open(log_file)
        .map_err(|e| {
            BootstrapError::Fork(format!(
                "Failed to open log file {}: {}",
                log_file.display(),
                e
            ))
        })?;

    for (source, target) in [
        (dev_null.as_raw_fd(), libc::STDIN_FILENO),
        (log.as_raw_fd(), libc::STDOUT_FILENO),
        (log.as_raw_fd(), libc::STDERR_FILENO),
    ] {
        dup2(source, target)
            .map_err(|e| BootstrapError::Fork(format!("dup2 failed: {}", e)))?;
    }
    Ok(())
}
