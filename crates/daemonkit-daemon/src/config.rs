//! Daemon profile: the static facts the bootstrap needs about a daemon.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;

/// Default certificate and key of an SSL-capable daemon.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SslDefaults {
    pub cert: PathBuf,
    pub key: PathBuf,
}

/// Per-daemon profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonProfile {
    /// Daemon name, used for the PID file, the log file and log lines.
    pub name: String,

    /// Default listening port. Networked daemons get `--port`/`--bind`.
    #[serde(default)]
    pub port: Option<u16>,

    /// SSL defaults. SSL daemons get `--no-ssl`/`--ssl-key`/`--ssl-cert`.
    #[serde(default)]
    pub ssl: Option<SslDefaults>,

    /// Log file (defaults to `<log_dir>/<name>.log`).
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Directory holding the PID file.
    #[serde(default = "default_pid_dir")]
    pub pid_dir: PathBuf,

    /// Whether the daemon runs several threads (thread names in log lines).
    #[serde(default)]
    pub multithreaded: bool,
}

fn default_pid_dir() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("daemonkit")
}

/// Directory the default log files live in.
pub fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("daemonkit")
}

impl DaemonProfile {
    /// Profile of a local (not networked, no SSL) daemon.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            port: None,
            ssl: None,
            log_file: None,
            pid_dir: default_pid_dir(),
            multithreaded: false,
        }
    }

    /// Make the daemon networked with the given default port.
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Make the daemon SSL-capable with the given default files.
    pub fn with_ssl(mut self, cert: impl Into<PathBuf>, key: impl Into<PathBuf>) -> Self {
        self.ssl = Some(SslDefaults {
            cert: cert.into(),
            key: key.into(),
        });
        self
    }

    pub fn with_log_file(mut self, log_file: impl Into<PathBuf>) -> Self {
        self.log_file = Some(log_file.into());
        self
    }

    pub fn with_pid_dir(mut self, pid_dir: impl Into<PathBuf>) -> Self {
        self.pid_dir = pid_dir.into();
        self
    }

    pub fn multithreaded(mut self) -> Self {
        self.multithreaded = true;
        self
    }

    /// Whether the daemon takes `--port`/`--bind`.
    pub fn is_networked(&self) -> bool {
        self.port.is_some()
    }

    /// Path of the daemon's PID file.
    pub fn pid_file(&self) -> PathBuf {
        self.pid_dir.join(format!("{}.pid", self.name))
    }

    /// Path of the daemon's log file.
    pub fn log_file(&self) -> PathBuf {
        self.log_file
            .clone()
            .unwrap_or_else(|| default_log_dir().join(format!("{}.log", self.name)))
    }

    /// Load a profile from a TOML file.
    pub fn load(path: &Path) -> Result<Self, BootstrapError> {
        let content = fs::read_to_string(path)?;
        Self::load_str(&content)
    }

    /// Load a profile from a TOML string.
    pub fn load_str(content: &str) -> Result<Self, BootstrapError> {
        let profile: DaemonProfile = toml::from_str(content)?;
        profile.validate().map_err(BootstrapError::Config)?;
        Ok(profile)
    }

    /// Validate the profile.
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err("name must not be empty".to_string());
        }
        if self.name.contains('/') {
            return Err(format!("name must not contain '/': {}", self.name));
        }
        if self.port == Some(0) {
            return Err("port must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_new_profile() {
        let profile = DaemonProfile::new("noded");
        assert_eq!(profile.name, "noded");
        assert!(!profile.is_networked());
        assert!(profile.ssl.is_none());
        assert!(!profile.multithreaded);
        assert!(profile.validate().is_ok());
    }

    #[test]
    fn test_derived_paths() {
        let profile = DaemonProfile::new("noded").with_pid_dir("/run/node");
        assert_eq!(profile.pid_file(), PathBuf::from("/run/node/noded.pid"));
        assert!(profile.log_file().ends_with("noded.log"));

        let profile = profile.with_log_file("/var/log/node/custom.log");
        assert_eq!(profile.log_file(), PathBuf::from("/var/log/node/custom.log"));
    }

    #[test]
    fn test_builders() {
        let profile = DaemonProfile::new("rapi")
            .with_port(5080)
            .with_ssl("/etc/node/cert.pem", "/etc/node/key.pem")
            .multithreaded();
        assert!(profile.is_networked());
        assert_eq!(profile.port, Some(5080));
        assert_eq!(
            profile.ssl,
            Some(SslDefaults {
                cert: PathBuf::from("/etc/node/cert.pem"),
                key: PathBuf::from("/etc/node/key.pem"),
            })
        );
        assert!(profile.multithreaded);
    }

    #[test]
    fn test_validate() {
        assert!(DaemonProfile::new("").validate().is_err());
        assert!(DaemonProfile::new("a/b").validate().is_err());
        assert!(DaemonProfile::new("noded").with_port(0).validate().is_err());
    }

    #[test]
    fn test_load_str_minimal() {
        let profile = DaemonProfile::load_str(r#"name = "confd""#).unwrap();
        assert_eq!(profile.name, "confd");
        assert_eq!(profile.pid_dir, default_pid_dir());
        assert!(profile.port.is_none());
    }

    #[test]
    fn test_load_str_full() {
        let content = r#"
            name = "rapi"
            port = 5080
            log_file = "/var/log/node/rapi.log"
            pid_dir = "/run/node"
            multithreaded = true

            [ssl]
            cert = "/etc/node/rapi.pem"
            key = "/etc/node/rapi.key"
        "#;
        let profile = DaemonProfile::load_str(content).unwrap();
        assert_eq!(profile.port, Some(5080));
        assert_eq!(profile.pid_file(), PathBuf::from("/run/node/rapi.pid"));
        assert_eq!(profile.ssl.unwrap().key, PathBuf::from("/etc/node/rapi.key"));
        assert!(profile.multithreaded);
    }

    #[test]
    fn test_load_str_rejects_invalid() {
        assert!(matches!(
            DaemonProfile::load_str(r#"name = """#),
            Err(BootstrapError::Config(_))
        ));
        assert!(matches!(
            DaemonProfile::load_str("name = "),
            Err(BootstrapError::TomlParse(_))
        ));
    }

    #[test]
    fn test_load_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name = \"watcherd\"").unwrap();
        let profile = DaemonProfile::load(file.path()).unwrap();
        assert_eq!(profile.name, "watcherd");

        assert!(matches!(
            DaemonProfile::load(Path::new("/nonexistent/profile.toml")),
            Err(BootstrapError::Io(_))
        ));
    }
}
