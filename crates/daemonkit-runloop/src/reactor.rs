//! I/O reactor: one bounded readiness pass over registered channels.
//!
//! A [`Channel`] is anything with a file descriptor plus readiness hooks.
//! Channels live in a shared registry behind a [`ReactorHandle`], so timer
//! callbacks and channel handlers can register or unregister channels while
//! the loop is running, including a channel removing itself from inside its
//! own handler.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::os::fd::AsFd;
use std::rc::Rc;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};
use tracing::{debug, trace};

use crate::error::{HandlerResult, MainloopError, MainloopResult};

/// Default pass timeout when the caller does not bound it.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_secs(30);

/// Which readiness a channel wants to hear about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interest {
    Readable,
    Writable,
    ReadWrite,
}

impl Interest {
    fn poll_flags(self) -> PollFlags {
        match self {
            Interest::Readable => PollFlags::POLLIN | PollFlags::POLLPRI,
            Interest::Writable => PollFlags::POLLOUT,
            Interest::ReadWrite => PollFlags::POLLIN | PollFlags::POLLPRI | PollFlags::POLLOUT,
        }
    }
}

/// Readiness reported for a channel by one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
    /// Peer hung up.
    pub hangup: bool,
    /// Error condition or invalid descriptor.
    pub error: bool,
}

impl From<PollFlags> for Readiness {
    fn from(flags: PollFlags) -> Self {
        Self {
            readable: flags.intersects(PollFlags::POLLIN | PollFlags::POLLPRI),
            writable: flags.contains(PollFlags::POLLOUT),
            hangup: flags.contains(PollFlags::POLLHUP),
            error: flags.intersects(PollFlags::POLLERR | PollFlags::POLLNVAL),
        }
    }
}

/// Identifier of a registered channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// A readable/writable resource serviced by the reactor.
pub trait Channel: AsFd {
    /// Readiness this channel is currently interested in.
    ///
    /// Re-evaluated before every pass.
    fn interest(&self) -> Interest {
        Interest::Readable
    }

    /// Called at most once per pass when the descriptor is ready.
    fn on_ready(&mut self, readiness: Readiness, ctx: &ChannelContext<'_>) -> HandlerResult;
}

/// Context handed to [`Channel::on_ready`].
pub struct ChannelContext<'a> {
    id: ChannelId,
    reactor: &'a ReactorHandle,
}

impl ChannelContext<'_> {
    /// Id of the channel being serviced.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// The registry the channel belongs to.
    pub fn reactor(&self) -> &ReactorHandle {
        self.reactor
    }

    /// Remove the channel being serviced from the reactor.
    pub fn unregister(&self) -> bool {
        self.reactor.unregister(self.id)
    }
}

type SharedChannel = Rc<RefCell<dyn Channel>>;

#[derive(Default)]
struct Registry {
    channels: BTreeMap<ChannelId, SharedChannel>,
    next_id: u64,
}

/// Cloneable handle to the channel registry.
///
/// The registry keeps a channel alive only while it is registered.
#[derive(Clone, Default)]
pub struct ReactorHandle {
    registry: Rc<RefCell<Registry>>,
}

impl ReactorHandle {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a channel.
    pub fn register<C: Channel + 'static>(&self, channel: C) -> ChannelId {
        self.register_shared(Rc::new(RefCell::new(channel)))
    }

    /// Register a channel the caller keeps a reference to.
    pub fn register_shared(&self, channel: Rc<RefCell<dyn Channel>>) -> ChannelId {
        let mut registry = self.registry.borrow_mut();
        let id = ChannelId(registry.next_id);
        registry.next_id += 1;
        registry.channels.insert(id, channel);
        debug!("Registered {}", id);
        id
    }

    /// Unregister a channel. Returns false if it was not registered.
    pub fn unregister(&self, id: ChannelId) -> bool {
        let removed = self.registry.borrow_mut().channels.remove(&id);
        if removed.is_some() {
            debug!("Unregistered {}", id);
        }
        removed.is_some()
    }

    /// Check whether a channel is registered.
    pub fn contains(&self, id: ChannelId) -> bool {
        self.registry.borrow().channels.contains_key(&id)
    }

    /// Number of registered channels.
    pub fn len(&self) -> usize {
        self.registry.borrow().channels.len()
    }

    /// Whether no channel is registered.
    pub fn is_empty(&self) -> bool {
        self.registry.borrow().channels.is_empty()
    }

    fn snapshot(&self) -> Vec<(ChannelId, SharedChannel)> {
        self.registry
            .borrow()
            .channels
            .iter()
            .map(|(id, channel)| (*id, channel.clone()))
            .collect()
    }

    fn channel(&self, id: ChannelId) -> Option<SharedChannel> {
        self.registry.borrow().channels.get(&id).cloned()
    }
}

impl fmt::Debug for ReactorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReactorHandle")
            .field("channels", &self.len())
            .finish()
    }
}

/// One-pass I/O reactor contract.
pub trait Reactor {
    /// Run one readiness pass, blocking at most `timeout` (the reactor's
    /// default when `None`). Returns the number of channels serviced.
    ///
    /// Being interrupted by a signal is not an error: the pass returns early.
    fn poll_once(&mut self, timeout: Option<Duration>) -> MainloopResult<usize>;

    /// Whether no channel is registered.
    fn is_idle(&self) -> bool;
}

/// Reactor built on poll(2).
#[derive(Debug, Clone)]
pub struct PollReactor {
    handle: ReactorHandle,
    default_timeout: Duration,
}

impl PollReactor {
    /// Create a reactor with an empty registry.
    pub fn new(default_timeout: Duration) -> Self {
        Self {
            handle: ReactorHandle::new(),
            default_timeout,
        }
    }

    /// Handle used to register channels.
    pub fn handle(&self) -> ReactorHandle {
        self.handle.clone()
    }

    /// Timeout used when a pass is not bounded by the caller.
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }

    /// Block in poll(2) and collect the channels that reported readiness.
    fn wait_ready(
        &self,
        snapshot: &[(ChannelId, SharedChannel)],
        timeout: Duration,
    ) -> MainloopResult<Vec<(ChannelId, Readiness)>> {
        let guards: Vec<Ref<'_, dyn Channel>> =
            snapshot.iter().map(|(_, channel)| channel.borrow()).collect();
        let mut fds: Vec<PollFd<'_>> = guards
            .iter()
            .map(|channel| PollFd::new(channel.as_fd(), channel.interest().poll_flags()))
            .collect();

        match poll(&mut fds, to_poll_timeout(timeout)) {
            Ok(0) => return Ok(Vec::new()),
            Ok(_) => {}
            Err(Errno::EINTR) => {
                trace!("Reactor pass interrupted by a signal");
                return Ok(Vec::new());
            }
            Err(e) => return Err(MainloopError::Reactor(e)),
        }

        Ok(fds
            .iter()
            .zip(snapshot)
            .filter_map(|(fd, (id, _))| {
                fd.revents()
                    .filter(|flags| !flags.is_empty())
                    .map(|flags| (*id, Readiness::from(flags)))
            })
            .collect())
    }
}

impl Default for PollReactor {
    fn default() -> Self {
        Self::new(DEFAULT_POLL_TIMEOUT)
    }
}

impl Reactor for PollReactor {
    fn poll_once(&mut self, timeout: Option<Duration>) -> MainloopResult<usize> {
        let snapshot = self.handle.snapshot();
        let timeout = timeout.unwrap_or(self.default_timeout);
        trace!(
            "Reactor pass over {} channels (timeout {:?})",
            snapshot.len(),
            timeout
        );

        let ready = self.wait_ready(&snapshot, timeout)?;
        drop(snapshot);

        let mut serviced = 0;
        for (id, readiness) in ready {
            // Skip channels unregistered by an earlier handler in this pass.
            let Some(channel) = self.handle.channel(id) else {
                continue;
            };
            let ctx = ChannelContext {
                id,
                reactor: &self.handle,
            };
            channel
                .borrow_mut()
                .on_ready(readiness, &ctx)
                .map_err(MainloopError::Handler)?;
            serviced += 1;
        }
        Ok(serviced)
    }

    fn is_idle(&self) -> bool {
        self.handle.is_empty()
    }
}

/// Convert a wait duration to a poll(2) timeout, rounding up to whole
/// milliseconds so a sub-millisecond wait does not turn into a busy loop.
fn to_poll_timeout(timeout: Duration) -> PollTimeout {
    let millis = timeout.as_nanos().div_ceil(1_000_000);
    i32::try_from(millis)
        .ok()
        .and_then(|ms| PollTimeout::try_from(ms).ok())
        .unwrap_or(PollTimeout::MAX)
}

#[cfg(test)]
#[path = "reactor_tests.rs"]
mod tests;
