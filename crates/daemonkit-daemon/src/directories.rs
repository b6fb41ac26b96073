//! Directories a daemon needs before it starts.

use std::fs::{self, DirBuilder, Permissions};
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::BootstrapError;

/// Make sure every `(path, mode)` directory exists with exactly `mode`.
///
/// Parents are not created. The mode is applied even to directories that
/// already existed, and regardless of the process umask.
pub fn ensure_dirs(dirs: &[(PathBuf, u32)]) -> Result<(), BootstrapError> {
    for (path, mode) in dirs {
        ensure_dir(path, *mode)?;
    }
    Ok(())
}

fn ensure_dir(path: &Path, mode: u32) -> Result<(), BootstrapError> {
    let directory_error = |source: io::Error| BootstrapError::Directory {
        path: path.to_path_buf(),
        source,
    };

    match DirBuilder::new().mode(mode).create(path) {
        Ok(()) => debug!("Created directory {} ({:o})", path.display(), mode),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {}
        Err(e) => return Err(directory_error(e)),
    }

    if !path.is_dir() {
        return Err(BootstrapError::NotADirectory(path.to_path_buf()));
    }
    fs::set_permissions(path, Permissions::from_mode(mode)).map_err(directory_error)
}
