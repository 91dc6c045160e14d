//! Implements the daemonisation backend for the `sluiced` process.

use std::ffi::OsStr;

use camino::Utf8Path;
use daemonize_me::Daemon;
use nix::unistd::{User, geteuid, setgid, setuid};
use thiserror::Error;
use tracing::{info, warn};

use super::PROCESS_TARGET;
use crate::errors::ResourceError;

/// Abstraction over detaching from the terminal and dropping privileges.
pub trait Daemonizer: Send + Sync {
    /// Detaches the process into the background, working from `work_dir`.
    ///
    /// # Errors
    ///
    /// Fails when the process cannot detach.
    fn daemonize(&self, work_dir: &Utf8Path) -> Result<(), DaemonizeError>;

    /// Switches the process to the account `name`.
    ///
    /// # Errors
    ///
    /// Fails when the account is unknown or the switch is refused.
    fn switch_user(&self, name: &str) -> Result<(), ResourceError>;
}

/// Errors surfaced by the daemonisation backend.
#[derive(Debug, Error)]
pub enum DaemonizeError {
    /// System-level daemonisation failed.
    #[error("{0}")]
    System(#[from] daemonize_me::DaemonError),
}

/// Daemoniser that delegates to `daemonize-me` and `setuid`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDaemonizer;

impl SystemDaemonizer {
    /// Builds a new system daemoniser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Daemonizer for SystemDaemonizer {
    fn daemonize(&self, work_dir: &Utf8Path) -> Result<(), DaemonizeError> {
        info!(
            target: PROCESS_TARGET,
            work_dir = %work_dir,
            "daemonising into background"
        );
        Daemon::new()
            .work_dir(work_dir.as_std_path())
            .name(OsStr::new(env!("CARGO_PKG_NAME")))
            .start()?;
        info!(
            target: PROCESS_TARGET,
            "daemon process detached; continuing in child"
        );
        Ok(())
    }

    fn switch_user(&self, name: &str) -> Result<(), ResourceError> {
        if !geteuid().is_root() {
            warn!(
                target: PROCESS_TARGET,
                user = name,
                "not running as root; ignoring the user option"
            );
            return Ok(());
        }
        let user = User::from_name(name)
            .map_err(|source| ResourceError::SwitchUser {
                name: name.to_owned(),
                source,
            })?
            .ok_or_else(|| ResourceError::UnknownUser {
                name: name.to_owned(),
            })?;
        let switch = |source| ResourceError::SwitchUser {
            name: name.to_owned(),
            source,
        };
        setgid(user.gid).map_err(switch)?;
        setuid(user.uid).map_err(switch)?;
        info!(target: PROCESS_TARGET, user = name, uid = user.uid.as_raw(), "switched user");
        Ok(())
    }
}
