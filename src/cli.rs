//! CLI definitions for the daemonkit sample daemon.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;

/// Environment variable naming the daemon profile.
pub(crate) const PROFILE_ENV: &str = "DAEMONKIT_PROFILE";

/// daemonkit sample daemon.
///
/// The common daemon options (`--foreground`, `--debug`, ...) are added on
/// top of these by the bootstrap.
#[derive(Parser, Debug)]
#[command(name = "daemonkit")]
#[command(about = "Sample daemon built on the daemonkit mainloop")]
#[command(version)]
pub(crate) struct Cli {
    /// Daemon profile (TOML)
    #[arg(long, env = PROFILE_ENV)]
    pub profile: Option<PathBuf>,

    /// Heartbeat interval in seconds (0 disables the heartbeat)
    #[arg(long, default_value_t = 60)]
    pub heartbeat: u64,

    /// File to watch for modifications
    #[arg(long)]
    pub watch: Option<PathBuf>,
}

/// Find the profile path ahead of full parsing, since the profile decides
/// which common options exist.
pub(crate) fn profile_path<I>(args: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = OsString>,
{
    let mut args = args.into_iter().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--profile" {
            return args.next().map(PathBuf::from);
        }
        if let Some(value) = arg.to_str().and_then(|a| a.strip_prefix("--profile=")) {
            return Some(PathBuf::from(value));
        }
    }
    std::env::var_os(PROFILE_ENV).map(PathBuf::from)
}
