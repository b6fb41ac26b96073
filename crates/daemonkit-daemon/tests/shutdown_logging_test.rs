//! Shutdown logging of a foreground daemon.
//!
//! Kept in its own test binary: it installs the global subscriber.

use std::fs;

use clap::Command;
use daemonkit_daemon::{run_generic, DaemonProfile};
use tempfile::TempDir;

#[test]
fn test_pid_file_removal_reaches_log_file() {
    let dir = TempDir::new().unwrap();
    let log_file = dir.path().join("logd.log");
    let profile = DaemonProfile::new("logd")
        .with_pid_dir(dir.path())
        .with_log_file(&log_file);

    run_generic(
        &profile,
        Command::new("logd"),
        ["logd", "-f"],
        &[],
        |_, _| Ok(()),
        |_, _| Ok(()),
    )
    .unwrap();

    assert!(!profile.pid_file().exists());
    let log = fs::read_to_string(&log_file).unwrap();
    assert!(log.contains("logd daemon startup"));
    assert!(log.contains("PID file removed"));
}
