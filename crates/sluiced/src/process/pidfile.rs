use std::fs::{self, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};
use tracing::{info, warn};

use super::PROCESS_TARGET;
use crate::errors::ResourceError;

/// Pid file owned by the process that wrote it.
///
/// The file is removed when the guard is released or dropped, but only by
/// the writing process.
#[derive(Debug)]
pub struct PidFile {
    path: Utf8PathBuf,
    pid: u32,
    removed: bool,
}

impl PidFile {
    /// Writes `pid` to `path` with mode `0600`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be created or written.
    pub fn write(path: &Utf8Path, pid: u32) -> Result<Self, ResourceError> {
        let error = |source| ResourceError::PidWrite {
            path: path.to_path_buf(),
            source,
        };
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let mut file = options.open(path).map_err(error)?;
        writeln!(file, "{pid}").map_err(error)?;
        file.sync_all().map_err(error)?;
        info!(
            target: PROCESS_TARGET,
            pid,
            file = %path,
            "pid file written"
        );
        Ok(Self {
            path: path.to_path_buf(),
            pid,
            removed: false,
        })
    }

    /// Location of the pid file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Process id written to the file.
    #[must_use]
    pub const fn pid(&self) -> u32 {
        self.pid
    }

    /// Removes the file if this process wrote it. Returns `true` when the
    /// file was removed by this call.
    pub fn remove(&mut self) -> bool {
        if self.removed || self.pid != std::process::id() {
            return false;
        }
        self.removed = true;
        match fs::remove_file(&self.path) {
            Ok(()) => true,
            Err(error) if error.kind() == io::ErrorKind::NotFound => false,
            Err(error) => {
                warn!(
                    target: PROCESS_TARGET,
                    file = %self.path,
                    error = %error,
                    "failed to remove pid file"
                );
                false
            }
        }
    }
}

impl Drop for PidFile {
    fn drop(&mut self) {
        self.remove();
    }
}
