//! Options shared by every daemon.
//!
//! The daemon builds its own `clap::Command`; [`add_common_options`] adds
//! `-f`/`-d` to it, plus the network and SSL options when the profile says
//! the daemon listens or speaks SSL.

use std::path::{Path, PathBuf};

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

use crate::config::DaemonProfile;
use crate::error::BootstrapError;

const FOREGROUND: &str = "foreground";
const DEBUG: &str = "debug";
const PORT: &str = "port";
const BIND: &str = "bind_address";
const NO_SSL: &str = "no_ssl";
const SSL_KEY: &str = "ssl_key";
const SSL_CERT: &str = "ssl_cert";

/// Add the common daemon options to `command`.
pub fn add_common_options(command: Command, profile: &DaemonProfile) -> Command {
    let mut command = command
        .arg(
            Arg::new(FOREGROUND)
                .short('f')
                .long("foreground")
                .action(ArgAction::SetTrue)
                .help("Don't detach from the current terminal"),
        )
        .arg(
            Arg::new(DEBUG)
                .short('d')
                .long("debug")
                .action(ArgAction::SetTrue)
                .help("Enable some debug messages"),
        );

    if let Some(port) = profile.port {
        command = command
            .arg(
                Arg::new(PORT)
                    .short('p')
                    .long("port")
                    .value_parser(value_parser!(u16))
                    .default_value(port.to_string())
                    .help(format!("Network port ({} default)", port)),
            )
            .arg(
                Arg::new(BIND)
                    .short('b')
                    .long("bind")
                    .value_name("ADDRESS")
                    .default_value("")
                    .help("Bind address (empty for all addresses)"),
            );
    }

    if let Some(ssl) = &profile.ssl {
        command = command
            .arg(
                Arg::new(NO_SSL)
                    .long("no-ssl")
                    .action(ArgAction::SetTrue)
                    .help("Do not secure HTTP protocol with SSL"),
            )
            .arg(
                Arg::new(SSL_KEY)
                    .short('K')
                    .long("ssl-key")
                    .value_parser(value_parser!(PathBuf))
                    .default_value(ssl.key.to_string_lossy().into_owned())
                    .help("SSL key"),
            )
            .arg(
                Arg::new(SSL_CERT)
                    .short('C')
                    .long("ssl-cert")
                    .value_parser(value_parser!(PathBuf))
                    .default_value(ssl.cert.to_string_lossy().into_owned())
                    .help("SSL certificate"),
            );
    }

    command
}

/// SSL settings of an SSL-capable daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SslOptions {
    pub enabled: bool,
    pub key: PathBuf,
    pub cert: PathBuf,
}

/// Parsed common options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonOptions {
    /// Stay attached to the terminal.
    pub foreground: bool,
    pub debug: bool,
    /// Listening port, for networked daemons.
    pub port: Option<u16>,
    /// Bind address, for networked daemons. Empty means all addresses.
    pub bind_address: Option<String>,
    /// SSL settings, for SSL-capable daemons.
    pub ssl: Option<SslOptions>,
}

impl DaemonOptions {
    /// Extract the common options from matches produced by a command that
    /// went through [`add_common_options`] with the same profile.
    pub fn from_matches(matches: &ArgMatches, profile: &DaemonProfile) -> Self {
        let networked = profile.is_networked();
        let ssl = profile.ssl.as_ref().map(|defaults| SslOptions {
            enabled: !matches.get_flag(NO_SSL),
            key: matches
                .get_one::<PathBuf>(SSL_KEY)
                .cloned()
                .unwrap_or_else(|| defaults.key.clone()),
            cert: matches
                .get_one::<PathBuf>(SSL_CERT)
                .cloned()
                .unwrap_or_else(|| defaults.cert.clone()),
        });

        Self {
            foreground: matches.get_flag(FOREGROUND),
            debug: matches.get_flag(DEBUG),
            port: if networked {
                matches.get_one::<u16>(PORT).copied().or(profile.port)
            } else {
                None
            },
            bind_address: if networked {
                Some(matches.get_one::<String>(BIND).cloned().unwrap_or_default())
            } else {
                None
            },
            ssl,
        }
    }

    /// Whether the daemon should detach from the terminal.
    pub fn fork(&self) -> bool {
        !self.foreground
    }

    /// Whether SSL is in use.
    pub fn ssl_enabled(&self) -> bool {
        self.ssl.as_ref().is_some_and(|ssl| ssl.enabled)
    }

    /// With SSL enabled, both files must be named and be regular files.
    pub fn check_ssl(&self) -> Result<(), BootstrapError> {
        let Some(ssl) = self.ssl.as_ref().filter(|ssl| ssl.enabled) else {
            return Ok(());
        };

        if is_unset(&ssl.cert) || is_unset(&ssl.key) {
            return Err(BootstrapError::SslMissing);
        }
        for path in [&ssl.cert, &ssl.key] {
            if !path.is_file() {
                return Err(BootstrapError::SslFileMissing(path.clone()));
            }
        }
        Ok(())
    }
}

fn is_unset(path: &Path) -> bool {
    path.as_os_str().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn parse(profile: &DaemonProfile, args: &[&str]) -> DaemonOptions {
        let command = add_common_options(Command::new("testd"), profile);
        let matches = command
            .try_get_matches_from(std::iter::once("testd").chain(args.iter().copied()))
            .unwrap();
        DaemonOptions::from_matches(&matches, profile)
    }

    fn ssl_profile(dir: &TempDir) -> DaemonProfile {
        DaemonProfile::new("rapi")
            .with_port(5080)
            .with_ssl(dir.path().join("cert.pem"), dir.path().join("key.pem"))
    }

    #[test]
    fn test_local_daemon_defaults() {
        let options = parse(&DaemonProfile::new("confd"), &[]);
        assert!(!options.foreground);
        assert!(options.fork());
        assert!(!options.debug);
        assert!(options.port.is_none());
        assert!(options.bind_address.is_none());
        assert!(options.ssl.is_none());
        assert!(options.check_ssl().is_ok());
    }

    #[test]
    fn test_foreground_and_debug() {
        let options = parse(&DaemonProfile::new("confd"), &["-f", "--debug"]);
        assert!(options.foreground);
        assert!(!options.fork());
        assert!(options.debug);
    }

    #[test]
    fn test_local_daemon_rejects_port() {
        let command = add_common_options(Command::new("confd"), &DaemonProfile::new("confd"));
        assert!(command.try_get_matches_from(["confd", "-p", "1"]).is_err());
    }

    #[test]
    fn test_networked_defaults_and_overrides() {
        let profile = DaemonProfile::new("noded").with_port(1811);
        let options = parse(&profile, &[]);
        assert_eq!(options.port, Some(1811));
        assert_eq!(options.bind_address.as_deref(), Some(""));

        let options = parse(&profile, &["-p", "2000", "--bind", "127.0.0.1"]);
        assert_eq!(options.port, Some(2000));
        assert_eq!(options.bind_address.as_deref(), Some("127.0.0.1"));
    }

    #[test]
    fn test_invalid_port_is_usage_error() {
        let profile = DaemonProfile::new("noded").with_port(1811);
        let command = add_common_options(Command::new("noded"), &profile);
        assert!(command
            .try_get_matches_from(["noded", "--port", "http"])
            .is_err());
    }

    #[test]
    fn test_ssl_defaults_from_profile() {
        let dir = TempDir::new().unwrap();
        let options = parse(&ssl_profile(&dir), &[]);
        let ssl = options.ssl.clone().unwrap();
        assert!(ssl.enabled);
        assert!(options.ssl_enabled());
        assert_eq!(ssl.cert, dir.path().join("cert.pem"));
        assert_eq!(ssl.key, dir.path().join("key.pem"));
    }

    #[test]
    fn test_check_ssl_missing_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cert.pem"), "cert").unwrap();
        let options = parse(&ssl_profile(&dir), &[]);

        match options.check_ssl() {
            Err(BootstrapError::SslFileMissing(path)) => {
                assert_eq!(path, dir.path().join("key.pem"))
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_check_ssl_empty_path() {
        let dir = TempDir::new().unwrap();
        let mut options = parse(&ssl_profile(&dir), &[]);
        if let Some(ssl) = options.ssl.as_mut() {
            ssl.key = PathBuf::new();
        }
        assert!(matches!(
            options.check_ssl(),
            Err(BootstrapError::SslMissing)
        ));
    }

    #[test]
    fn test_check_ssl_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("cert.pem"), "cert").unwrap();
        let key_dir = dir.path().join("keys");
        fs::create_dir(&key_dir).unwrap();
        let options = parse(&ssl_profile(&dir), &["--ssl-key", key_dir.to_str().unwrap()]);

        assert!(matches!(
            options.check_ssl(),
            Err(BootstrapError::SslFileMissing(_))
        ));
    }

    #[test]
    fn test_check_ssl_ok_and_disabled() {
        let dir = TempDir::new().unwrap();
        let profile = ssl_profile(&dir);
        assert!(parse(&profile, &["--no-ssl"]).check_ssl().is_ok());
        assert!(!parse(&profile, &["--no-ssl"]).ssl_enabled());

        fs::write(dir.path().join("cert.pem"), "cert").unwrap();
        fs::write(dir.path().join("key.pem"), "key").unwrap();
        assert!(parse(&profile, &[]).check_ssl().is_ok());
    }
}
