//! The sample daemon: a heartbeat timer, an optional file watch and a child
//! reaper, all driven by one mainloop.

use std::rc::Rc;
use std::time::Duration;

use clap::{ArgMatches, FromArgMatches};
use nix::errno::Errno;
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use tracing::{debug, info, warn};

use daemonkit_daemon::{BoxError, DaemonOptions};
use daemonkit_runloop::{
    FileWatch, FileWatchChannel, HandlerResult, Mainloop, MainloopConfig, RunExit, Scheduler,
    Signal, SignalObserver,
};

use crate::cli::Cli;

/// Start-up check: a watched file has to exist before the daemon detaches.
pub(crate) fn check(_options: &DaemonOptions, matches: &ArgMatches) -> Result<(), BoxError> {
    let cli = Cli::from_arg_matches(matches)?;
    if let Some(path) = &cli.watch {
        if !path.is_file() {
            return Err(format!("Watched file {} does not exist", path.display()).into());
        }
    }
    Ok(())
}

/// Daemon main: build the mainloop and run it until SIGTERM.
pub(crate) fn exec(_options: &DaemonOptions, matches: &ArgMatches) -> Result<(), BoxError> {
    let cli = Cli::from_arg_matches(matches)?;
    let mut mainloop = Mainloop::new(MainloopConfig::default())?;
    debug!("Mainloop config: {:?}", mainloop.config());

    if cli.heartbeat > 0 {
        schedule_heartbeat(mainloop.scheduler(), Duration::from_secs(cli.heartbeat), 0);
    }

    if let Some(path) = &cli.watch {
        let mut watch = FileWatch::new(path)?;
        watch.enable()?;
        let id = mainloop
            .reactor_handle()
            .register(FileWatchChannel::new(watch, follow_file));
        info!("Watching {} ({})", path.display(), id);
    }

    let reaper = Rc::new(ChildReaper);
    mainloop.register_signal(&reaper);

    let exit = mainloop.run()?;
    match exit {
        RunExit::Terminated(signal) => info!("Received {}, terminating", signal),
        RunExit::Drained => info!("No channels left, terminating"),
    }
    info!(
        "Mainloop stats: {}",
        serde_json::to_string(&mainloop.stats().snapshot())?
    );
    Ok(())
}

/// Log a heartbeat every `interval`, rearming after each one.
fn schedule_heartbeat(scheduler: Scheduler, interval: Duration, beats: u64) {
    let next = scheduler.clone();
    scheduler.enter(interval, 0, move || {
        info!("Heartbeat #{}", beats + 1);
        schedule_heartbeat(next, interval, beats + 1);
        Ok(())
    });
}

/// File watch callback. A replaced file drops the watch, so it is re-added
/// on the new file.
fn follow_file(watch: &mut FileWatch, modified: bool) -> HandlerResult {
    if modified {
        info!("{} was modified", watch.path().display());
        return Ok(());
    }
    warn!("Watch on {} was dropped, re-adding it", watch.path().display());
    watch.enable()?;
    Ok(())
}

/// Collects exited children on SIGCHLD.
struct ChildReaper;

impl SignalObserver for ChildReaper {
    fn on_signal(&self, signal: Signal) -> HandlerResult {
        if signal != Signal::SIGCHLD {
            return Ok(());
        }
        loop {
            match waitpid(None, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::StillAlive) | Err(Errno::ECHILD) => return Ok(()),
                Ok(status) => info!("Reaped child: {:?}", status),
                Err(e) => return Err(e.into()),
            }
        }
    }
}
