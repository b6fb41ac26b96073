//! Single-file inotify watch serviced by the reactor.
//!
//! Files are usually updated by writing a new copy and renaming it over the
//! old one. The watch sits on the inode, so a replacement shows up as
//! `IN_IGNORED` and the watch is gone; the callback gets `false` and may call
//! [`FileWatch::enable`] again to follow the new file. In-place writes show
//! up as `IN_MODIFY` and the callback gets `true`.

use std::os::fd::{AsFd, BorrowedFd};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::inotify::{AddWatchFlags, InitFlags, Inotify, WatchDescriptor};
use tracing::{debug, error};

use crate::error::{HandlerResult, WatchError};
use crate::reactor::{Channel, ChannelContext, Readiness};

/// Inotify watch on one file. `IN_IGNORED` is always reported by the kernel.
pub struct FileWatch {
    inotify: Inotify,
    path: PathBuf,
    handle: Option<WatchDescriptor>,
}

impl FileWatch {
    /// Create a disabled watch for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Result<Self, WatchError> {
        let inotify = Inotify::init(InitFlags::IN_NONBLOCK | InitFlags::IN_CLOEXEC)
            .map_err(WatchError::Init)?;
        Ok(Self {
            inotify,
            path: path.into(),
            handle: None,
        })
    }

    /// Start watching the file. A no-op if already enabled.
    pub fn enable(&mut self) -> Result<(), WatchError> {
        if self.handle.is_none() {
            let handle = self
                .inotify
                .add_watch(self.path.as_path(), AddWatchFlags::IN_MODIFY)
                .map_err(|source| WatchError::AddWatch {
                    path: self.path.clone(),
                    source,
                })?;
            debug!("Watching {}", self.path.display());
            self.handle = Some(handle);
        }
        Ok(())
    }

    /// Stop watching the file. A no-op if not enabled.
    pub fn disable(&mut self) -> Result<(), WatchError> {
        if let Some(handle) = self.handle {
            self.inotify
                .rm_watch(handle)
                .map_err(|source| WatchError::RemoveWatch {
                    path: self.path.clone(),
                    source,
                })?;
            self.handle = None;
        }
        Ok(())
    }

    pub fn is_enabled(&self) -> bool {
        self.handle.is_some()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AsFd for FileWatch {
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.inotify.as_fd()
    }
}

/// Reactor channel delivering [`FileWatch`] events to a callback.
///
/// The callback receives `true` for a modification and `false` once the
/// watch was dropped by the kernel. Its errors are logged and do not stop
/// the daemon.
pub struct FileWatchChannel<F>
where
    F: FnMut(&mut FileWatch, bool) -> HandlerResult,
{
    watch: FileWatch,
    callback: F,
}

impl<F> FileWatchChannel<F>
where
    F: FnMut(&mut FileWatch, bool) -> HandlerResult,
{
    pub fn new(watch: FileWatch, callback: F) -> Self {
        Self { watch, callback }
    }

    pub fn watch(&self) -> &FileWatch {
        &self.watch
    }

    pub fn watch_mut(&mut self) -> &mut FileWatch {
        &mut self.watch
    }

    fn dispatch(&mut self, modified: bool) {
        if let Err(e) = (self.callback)(&mut self.watch, modified) {
            error!(
                "File watch callback for {} failed: {}",
                self.watch.path.display(),
                e
            );
        }
    }
}

impl<F> AsFd for FileWatchChannel<F>
where
    F: FnMut(&mut FileWatch, bool) -> HandlerResult,
{
    fn as_fd(&self) -> BorrowedFd<'_> {
        self.watch.as_fd()
    }
}

impl<F> Channel for FileWatchChannel<F>
where
    F: FnMut(&mut FileWatch, bool) -> HandlerResult,
{
    fn on_ready(&mut self, _readiness: Readiness, _ctx: &ChannelContext<'_>) -> HandlerResult {
        let events = match self.watch.inotify.read_events() {
            Ok(events) => events,
            Err(Errno::EAGAIN) => return Ok(()),
            Err(e) => return Err(Box::new(WatchError::Read(e))),
        };

        for event in events {
            if event.mask.contains(AddWatchFlags::IN_IGNORED) {
                debug!("Received 'ignored' inotify event for {}", self.watch.path.display());
                self.watch.handle = None;
                self.dispatch(false);
            } else if event.mask.contains(AddWatchFlags::IN_MODIFY) {
                debug!("Received 'modify' inotify event for {}", self.watch.path.display());
                self.dispatch(true);
            } else {
                error!("Received unhandled inotify event: {:?}", event.mask);
            }
        }
        Ok(())
    }
}
