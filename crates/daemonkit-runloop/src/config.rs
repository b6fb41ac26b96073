//! Configuration for the mainloop.

use std::time::Duration;

use nix::sys::signal::Signal;
use serde::{Deserialize, Serialize};

/// Mainloop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MainloopConfig {
    /// Stop once no I/O channel is registered with the reactor.
    #[serde(default)]
    pub stop_on_empty: bool,

    /// Reactor pass timeout used when no timer is pending (milliseconds).
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,

    /// Signal that ends the loop after observers have been notified.
    #[serde(default = "default_termination_signal", with = "signal_name")]
    pub termination_signal: Signal,

    /// Signals whose occurrence is forwarded to registered observers.
    #[serde(default = "default_watched_signals", with = "signal_names")]
    pub watched_signals: Vec<Signal>,
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

fn default_termination_signal() -> Signal {
    Signal::SIGTERM
}

fn default_watched_signals() -> Vec<Signal> {
    vec![Signal::SIGCHLD, Signal::SIGTERM]
}

impl Default for MainloopConfig {
    fn default() -> Self {
        Self {
            stop_on_empty: false,
            idle_timeout_ms: default_idle_timeout_ms(),
            termination_signal: default_termination_signal(),
            watched_signals: default_watched_signals(),
        }
    }
}

impl MainloopConfig {
    /// Create a config that stops once all I/O channels are gone.
    pub fn stop_on_empty() -> Self {
        Self {
            stop_on_empty: true,
            ..Default::default()
        }
    }

    /// Replace the termination signal and the watched set.
    ///
    /// The termination signal is always watched, whether or not it is listed.
    pub fn with_signals(mut self, termination: Signal, watched: Vec<Signal>) -> Self {
        self.termination_signal = termination;
        self.watched_signals = watched;
        self
    }

    /// Set the idle reactor timeout.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Get the idle reactor timeout as a Duration.
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Signals to latch, in inspection order, without duplicates.
    pub fn signals(&self) -> Vec<Signal> {
        let mut signals: Vec<Signal> = Vec::with_capacity(self.watched_signals.len() + 1);
        for &signal in &self.watched_signals {
            if !signals.contains(&signal) {
                signals.push(signal);
            }
        }
        if !signals.contains(&self.termination_signal) {
            signals.push(self.termination_signal);
        }
        signals
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.idle_timeout_ms == 0 {
            return Err("idle_timeout_ms must be > 0".to_string());
        }

        for signal in self.signals() {
            if matches!(signal, Signal::SIGKILL | Signal::SIGSTOP) {
                return Err(format!("{} cannot be caught", signal));
            }
        }

        Ok(())
    }
}

mod signal_name {
    use nix::sys::signal::Signal;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(signal: &Signal, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(signal.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Signal, D::Error> {
        let name = String::deserialize(deserializer)?;
        name.parse()
            .map_err(|_| serde::de::Error::custom(format!("unknown signal: {}", name)))
    }
}

mod signal_names {
    use nix::sys::signal::Signal;
    use serde::ser::SerializeSeq;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(signals: &[Signal], serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(signals.len()))?;
        for signal in signals {
            seq.serialize_element(signal.as_str())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Signal>, D::Error> {
        Vec::<String>::deserialize(deserializer)?
            .into_iter()
            .map(|name| {
                name.parse()
                    .map_err(|_| serde::de::Error::custom(format!("unknown signal: {}", name)))
            })
            .collect()
    }
}
