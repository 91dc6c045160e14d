//! Transaction (XA) log sink.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};

use camino::{Utf8Path, Utf8PathBuf};

use crate::errors::ResourceError;

/// Append-mode transaction log.
#[derive(Debug)]
pub struct TransactionLog {
    path: Utf8PathBuf,
    file: File,
    detailed: bool,
}

impl TransactionLog {
    /// Opens `path` for appending, creating its parent directory.
    ///
    /// # Errors
    ///
    /// Fails when the directory or the file cannot be created.
    pub fn open(path: &Utf8Path, detailed: bool) -> Result<Self, ResourceError> {
        let error = |source| ResourceError::TransactionLog {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent().filter(|parent| !parent.as_str().is_empty()) {
            fs::create_dir_all(parent).map_err(error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(error)?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            detailed,
        })
    }

    /// Location of the log.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns `true` when `log-xa-in-detail` is set.
    #[must_use]
    pub const fn is_detailed(&self) -> bool {
        self.detailed
    }

    /// Flushes and closes the log.
    ///
    /// # Errors
    ///
    /// Fails when the final flush fails.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use tempfile::TempDir;

    use super::*;

    fn temp_path(dir: &TempDir, name: &str) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(dir.path().join(name)).expect("utf-8 temp path")
    }

    #[rstest]
    #[case(false)]
    #[case(true)]
    fn open_creates_parent_and_keeps_detail(#[case] detailed: bool) {
        let dir = TempDir::new().expect("temp dir");
        let path = temp_path(&dir, "logs/xa.log");
        let log = TransactionLog::open(&path, detailed).expect("open xa log");
        assert_eq!(log.is_detailed(), detailed);
        assert_eq!(log.path(), path);
        log.close().expect("close");
        assert!(path.is_file());
    }

    #[rstest]
    fn open_appends_to_an_existing_log() {
        let dir = TempDir::new().expect("temp dir");
        let path = temp_path(&dir, "xa.log");
        fs::write(&path, "xa-commit 6\n").expect("seed xa log");
        TransactionLog::open(&path, false)
            .expect("open xa log")
            .close()
            .expect("close");
        assert_eq!(fs::read_to_string(&path).expect("read xa log"), "xa-commit 6\n");
    }

    #[rstest]
    fn parent_that_is_a_file_is_a_resource_error() {
        let dir = TempDir::new().expect("temp dir");
        let blocker = temp_path(&dir, "logs");
        fs::write(&blocker, "").expect("create blocker");
        let error = TransactionLog::open(&blocker.join("xa.log"), false).expect_err("blocked");
        assert!(matches!(error, ResourceError::TransactionLog { .. }));
    }
}
