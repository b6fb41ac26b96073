//! Signal observers.
//!
//! Observers are notified synchronously by the mainloop, after the timer and
//! I/O work of an iteration, for every watched signal whose latch was set.
//! Registrations are non-owning: an observer whose last strong reference is
//! dropped is skipped and forgotten.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use nix::sys::signal::Signal;
use tracing::debug;

use crate::error::{HandlerResult, MainloopError, MainloopResult};

/// Capability to be told that a signal arrived.
pub trait SignalObserver {
    /// Called once per observed delivery of `signal`.
    fn on_signal(&self, signal: Signal) -> HandlerResult;
}

/// Identifier of an observer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(u64);

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

#[derive(Default)]
struct Registrations {
    entries: Vec<(ObserverId, Weak<dyn SignalObserver>)>,
    next_id: u64,
}

/// Cloneable handle to the observer registrations of a mainloop.
#[derive(Clone, Default)]
pub struct SignalObservers {
    inner: Rc<RefCell<Registrations>>,
}

impl SignalObservers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer without taking ownership of it.
    pub fn register<O: SignalObserver + 'static>(&self, observer: &Rc<O>) -> ObserverId {
        let weak: Weak<dyn SignalObserver> = Rc::downgrade(observer) as Weak<dyn SignalObserver>;
        let mut inner = self.inner.borrow_mut();
        let id = ObserverId(inner.next_id);
        inner.next_id += 1;
        inner.entries.push((id, weak));
        debug!("Registered {}", id);
        id
    }

    /// Remove a registration. Returns false if it was not registered.
    pub fn unregister(&self, id: ObserverId) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.entries.len();
        inner.entries.retain(|(entry, _)| *entry != id);
        before != inner.entries.len()
    }

    /// Number of registrations whose observer is still alive.
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Call every live observer in registration order.
    ///
    /// Observers registered or unregistered from inside a notification take
    /// effect from the next notification on. Returns how many were called.
    pub fn notify(&self, signal: Signal) -> MainloopResult<usize> {
        let snapshot: Vec<Rc<dyn SignalObserver>> = {
            let mut inner = self.inner.borrow_mut();
            inner.entries.retain(|(_, weak)| weak.strong_count() > 0);
            inner
                .entries
                .iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };

        for observer in &snapshot {
            observer.on_signal(signal).map_err(MainloopError::Handler)?;
        }
        Ok(snapshot.len())
    }
}

impl fmt::Debug for SignalObservers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalObservers")
            .field("registered", &self.inner.borrow().entries.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Recorder {
        name: &'static str,
        log: Rc<RefCell<Vec<(&'static str, Signal)>>>,
    }

    impl SignalObserver for Recorder {
        fn on_signal(&self, signal: Signal) -> HandlerResult {
            self.log.borrow_mut().push((self.name, signal));
            Ok(())
        }
    }

    fn recorder(name: &'static str, log: &Rc<RefCell<Vec<(&'static str, Signal)>>>) -> Rc<Recorder> {
        Rc::new(Recorder {
            name,
            log: log.clone(),
        })
    }

    #[test]
    fn test_notify_in_registration_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observers = SignalObservers::new();
        let first = recorder("first", &log);
        let second = recorder("second", &log);
        observers.register(&first);
        observers.register(&second);

        assert_eq!(observers.notify(Signal::SIGCHLD).unwrap(), 2);
        assert_eq!(
            *log.borrow(),
            vec![("first", Signal::SIGCHLD), ("second", Signal::SIGCHLD)]
        );
    }

    #[test]
    fn test_dropped_observer_is_skipped_and_pruned() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observers = SignalObservers::new();
        let kept = recorder("kept", &log);
        let dropped = recorder("dropped", &log);
        observers.register(&dropped);
        observers.register(&kept);
        drop(dropped);

        assert_eq!(observers.len(), 1);
        assert_eq!(observers.notify(Signal::SIGHUP).unwrap(), 1);
        assert_eq!(*log.borrow(), vec![("kept", Signal::SIGHUP)]);
        assert_eq!(observers.inner.borrow().entries.len(), 1);
    }

    #[test]
    fn test_unregister() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let observers = SignalObservers::new();
        let observer = recorder("gone", &log);
        let id = observers.register(&observer);

        assert!(observers.unregister(id));
        assert!(!observers.unregister(id));
        assert!(observers.is_empty());
        assert_eq!(observers.notify(Signal::SIGTERM).unwrap(), 0);
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_observer_error_propagates() {
        struct Failing;

        impl SignalObserver for Failing {
            fn on_signal(&self, _signal: Signal) -> HandlerResult {
                Err("observer refused".into())
            }
        }

        let observers = SignalObservers::new();
        let failing = Rc::new(Failing);
        observers.register(&failing);

        let err = observers.notify(Signal::SIGTERM).unwrap_err();
        assert!(err.to_string().contains("observer refused"));
    }

    #[test]
    fn test_register_from_inside_notification() {
        struct Registrar {
            observers: SignalObservers,
            late: Rc<Recorder>,
        }

        impl SignalObserver for Registrar {
            fn on_signal(&self, _signal: Signal) -> HandlerResult {
                self.observers.register(&self.late);
                Ok(())
            }
        }

        let log = Rc::new(RefCell::new(Vec::new()));
        let observers = SignalObservers::new();
        let registrar = Rc::new(Registrar {
            observers: observers.clone(),
            late: recorder("late", &log),
        });
        observers.register(&registrar);

        assert_eq!(observers.notify(Signal::SIGUSR1).unwrap(), 1);
        assert!(log.borrow().is_empty());
        assert_eq!(observers.notify(Signal::SIGUSR1).unwrap(), 2);
        assert_eq!(*log.borrow(), vec![("late", Signal::SIGUSR1)]);
    }

    #[test]
    fn test_observer_id_display() {
        let observers = SignalObservers::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let observer = recorder("x", &log);
        assert_eq!(observers.register(&observer).to_string(), "observer#0");
    }
}
