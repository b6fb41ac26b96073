//! PID file held for the lifetime of a daemon.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::BootstrapError;

/// PID file guard.
///
/// Written by [`PidFile::try_acquire`], removed when the guard is dropped,
/// including while unwinding from a panic.
#[derive(Debug)]
pub struct PidFile {
    path: PathBuf,
    locked: bool,
}

impl PidFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            locked: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Read the PID from the file. A missing file is `None`.
    pub fn read_pid(&self) -> Result<Option<u32>, BootstrapError> {
        match self.read_contents()? {
            Some(contents) => self.parse_pid(&contents).map(Some),
            None => Ok(None),
        }
    }

    fn read_contents(&self) -> Result<Option<String>, BootstrapError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BootstrapError::PidFileRead {
                path: self.path.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn parse_pid(&self, contents: &str) -> Result<u32, BootstrapError> {
        contents
            .trim()
            .parse::<u32>()
            .map_err(|e| BootstrapError::PidFileRead {
                path: self.path.clone(),
                reason: format!("Invalid PID format: {}", e),
            })
    }

    /// Write the current process PID to the file.
    pub fn write_pid(&mut self) -> Result<(), BootstrapError> {
        self.write_pid_value(std::process::id())
    }

    /// Write a specific PID value to the file.
    pub fn write_pid_value(&mut self, pid: u32) -> Result<(), BootstrapError> {
        let creation_error = |reason: String| BootstrapError::PidFileCreation {
            path: self.path.clone(),
            reason,
        };

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&self.path)
            .map_err(|e| creation_error(e.to_string()))?;
        writeln!(file, "{}", pid).map_err(|e| creation_error(e.to_string()))?;

        self.locked = true;
        info!("PID file created: {} (PID: {})", self.path.display(), pid);
        Ok(())
    }

    /// Remove the PID file.
    pub fn remove(&mut self) -> Result<(), BootstrapError> {
        match fs::remove_file(&self.path) {
            Ok(()) => info!("PID file removed: {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(BootstrapError::PidFileRemoval {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        }
        self.locked = false;
        Ok(())
    }

    /// Check if a process with the given PID is alive.
    pub fn is_process_running(pid: u32) -> bool {
        use nix::errno::Errno;
        use nix::sys::signal::kill;
        use nix::unistd::Pid;

        let Ok(raw) = i32::try_from(pid) else {
            return false;
        };
        if raw <= 0 {
            return false;
        }
        // Null signal: existence and permission check only.
        match kill(Pid::from_raw(raw), None) {
            Ok(()) => true,
            Err(Errno::EPERM) => true,
            Err(_) => false,
        }
    }

    /// Write our PID unless the file names a live process.
    ///
    /// A file left behind by a dead process is replaced, and so is one
    /// without a valid PID (a crash between truncating and writing it).
    /// Failing to read the file at all is still an error.
    pub fn try_acquire(&mut self) -> Result<(), BootstrapError> {
        if let Some(contents) = self.read_contents()? {
            match self.parse_pid(&contents) {
                Ok(pid) if Self::is_process_running(pid) => {
                    return Err(BootstrapError::AlreadyRunning {
                        path: self.path.clone(),
                        pid,
                    });
                }
                Ok(pid) => warn!(
                    "Removing stale PID file (PID {} not running): {}",
                    pid,
                    self.path.display()
                ),
                Err(e) => warn!("Replacing unusable PID file: {}", e),
            }
            self.remove()?;
        }

        debug!("Acquiring PID file {}", self.path.display());
        self.write_pid()
    }

    /// Whether this guard wrote the file.
    pub fn is_locked(&self) -> bool {
        self.locked
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        if self.locked {
            if let Err(e) = self.remove() {
                warn!("Failed to remove PID file on drop: {}", e);
            }
        }
    }
}

#[cfg(test)]
#[path = "pid_tests.rs"]
mod tests;
