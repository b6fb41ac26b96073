//! Signal latches.
//!
//! The OS-level handler (`trampoline`) does nothing but store `true` into a
//! process-wide flag for the delivered signal number. Everything else happens
//! synchronously when the mainloop inspects the latches between passes.
//!
//! Several deliveries of the same signal between two inspections are observed
//! once: a latch records that a signal arrived, not how many times.

use std::sync::atomic::{AtomicBool, Ordering};

use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use tracing::{debug, warn};

use crate::error::{MainloopError, MainloopResult};

/// One slot per possible signal number (real-time signals included).
const LATCH_SLOTS: usize = 65;

static LATCHES: [AtomicBool; LATCH_SLOTS] = [const { AtomicBool::new(false) }; LATCH_SLOTS];

/// Signal handler installed for every watched signal.
///
/// Async-signal-safe: no allocation, no locking, a single atomic store.
extern "C" fn trampoline(signum: libc::c_int) {
    if let Some(latch) = usize::try_from(signum).ok().and_then(|slot| LATCHES.get(slot)) {
        latch.store(true, Ordering::SeqCst);
    }
}

/// Process-wide occurrence flag for one signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalLatch {
    signal: Signal,
}

impl SignalLatch {
    /// Latch for the given signal.
    pub fn new(signal: Signal) -> Self {
        Self { signal }
    }

    /// The signal this latch records.
    pub fn signal(&self) -> Signal {
        self.signal
    }

    /// Whether the signal was delivered since the last clear.
    pub fn is_set(&self) -> bool {
        self.slot().is_some_and(|latch| latch.load(Ordering::SeqCst))
    }

    /// Reset the latch.
    pub fn clear(&self) {
        if let Some(latch) = self.slot() {
            latch.store(false, Ordering::SeqCst);
        }
    }

    fn slot(&self) -> Option<&'static AtomicBool> {
        LATCHES.get(self.signal as usize)
    }
}

/// Trampolines installed for a set of signals.
///
/// Dropping the value restores the dispositions that were in place before,
/// on every exit path of the owner.
pub struct InstalledLatches {
    installed: Vec<(SignalLatch, SigAction)>,
}

impl InstalledLatches {
    /// Install the trampoline for each signal, clearing its latch first.
    ///
    /// The handler is installed without `SA_RESTART` so a blocking poll(2)
    /// returns early with EINTR when a signal arrives.
    pub fn install(signals: &[Signal]) -> MainloopResult<Self> {
        let action = SigAction::new(
            SigHandler::Handler(trampoline),
            SaFlags::empty(),
            SigSet::empty(),
        );

        let mut latches = Self {
            installed: Vec::with_capacity(signals.len()),
        };
        for &signal in signals {
            let latch = SignalLatch::new(signal);
            latch.clear();
            // SAFETY: the trampoline only performs an atomic store.
            let previous = unsafe { sigaction(signal, &action) }
                .map_err(|source| MainloopError::SignalSetup { signal, source })?;
            latches.installed.push((latch, previous));
        }

        debug!("Signal latches installed for {:?}", signals);
        Ok(latches)
    }

    /// Installed latches, in installation order.
    pub fn latches(&self) -> impl Iterator<Item = SignalLatch> + '_ {
        self.installed.iter().map(|(latch, _)| *latch)
    }
}

impl std::fmt::Debug for InstalledLatches {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.installed.iter().map(|(latch, _)| latch.signal()))
            .finish()
    }
}

impl Drop for InstalledLatches {
    fn drop(&mut self) {
        for (latch, previous) in self.installed.drain(..).rev() {
            // SAFETY: restores a disposition previously returned by sigaction.
            if let Err(e) = unsafe { sigaction(latch.signal(), &previous) } {
                warn!("Failed to restore handler for {}: {}", latch.signal(), e);
            }
        }
    }
}
