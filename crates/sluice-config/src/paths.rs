//! Normalisation of configured paths against the installation base directory.

use std::fs;
use std::path::Path;

use camino::{Utf8Path, Utf8PathBuf};

use crate::catalog::{DEFAULT_CONF_DIR, DEFAULT_PLUGIN_DIR, DEFAULT_XA_LOG_FILE};
use crate::error::PathError;
use crate::raw::RawConfig;

/// Resolves `path` against `base_dir`.
///
/// Absent paths stay absent and absolute paths are returned unchanged, so
/// resolving an already resolved path is a no-op.
#[must_use]
pub fn resolve(base_dir: &Utf8Path, path: Option<&Utf8Path>) -> Option<Utf8PathBuf> {
    path.map(|path| {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    })
}

/// Determines the installation base directory.
///
/// A configured directory must be absolute. Without one, the base directory
/// is the parent of the directory holding `executable`, so
/// `<prefix>/bin/sluiced` yields `<prefix>`.
///
/// # Errors
///
/// Fails for a relative configured directory and for an executable path
/// that is unknown, not UTF-8, or too shallow to have a prefix.
pub fn resolve_base_dir(
    configured: Option<&Utf8Path>,
    executable: Option<&Path>,
) -> Result<Utf8PathBuf, PathError> {
    if let Some(configured) = configured {
        if !configured.is_absolute() {
            return Err(PathError::RelativeBaseDir {
                path: configured.to_path_buf(),
            });
        }
        return Ok(configured.to_path_buf());
    }

    let executable = executable.ok_or(PathError::UnknownExecutable)?;
    let executable = Utf8Path::from_path(executable).ok_or_else(|| {
        PathError::NonUtf8Executable {
            path: executable.to_path_buf(),
        }
    })?;
    executable
        .parent()
        .and_then(Utf8Path::parent)
        .filter(|prefix| !prefix.as_str().is_empty())
        .map(Utf8Path::to_path_buf)
        .ok_or_else(|| PathError::NoInstallPrefix {
            path: executable.to_path_buf(),
        })
}

/// Checks that `base_dir` names an existing directory.
///
/// # Errors
///
/// Fails when the directory cannot be inspected or is something else.
pub fn check_base_dir(base_dir: &Utf8Path) -> Result<(), PathError> {
    let metadata = fs::metadata(base_dir).map_err(|source| PathError::BaseDirUnavailable {
        path: base_dir.to_path_buf(),
        source,
    })?;
    if !metadata.is_dir() {
        return Err(PathError::BaseDirNotADirectory {
            path: base_dir.to_path_buf(),
        });
    }
    Ok(())
}

/// Fills in directory defaults and resolves every configured path of `raw`
/// against `base_dir`.
pub fn resolve_paths(raw: &mut RawConfig, base_dir: &Utf8Path) {
    raw.base_dir = Some(base_dir.to_path_buf());
    if raw.conf_dir.is_none() {
        raw.conf_dir = Some(Utf8PathBuf::from(DEFAULT_CONF_DIR));
    }
    if raw.plugin_dir.is_none() {
        raw.plugin_dir = Some(Utf8PathBuf::from(DEFAULT_PLUGIN_DIR));
    }
    if raw.log_xa_file.is_none() {
        raw.log_xa_file = Some(Utf8PathBuf::from(DEFAULT_XA_LOG_FILE));
    }

    for slot in [
        &mut raw.log_file,
        &mut raw.pid_file,
        &mut raw.plugin_dir,
        &mut raw.conf_dir,
        &mut raw.log_xa_file,
    ] {
        *slot = resolve(base_dir, slot.as_deref());
    }
}
