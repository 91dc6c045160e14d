//! Defines the unified error surface for daemon startup and shutdown.

use std::io;

use camino::Utf8PathBuf;
use nix::errno::Errno;
use thiserror::Error;

use sluice_config::{ConfigError, ValidationError};
use sluice_plugins::PluginError;

use crate::process::DaemonizeError;

/// Exit code reported for every startup or runtime failure.
pub const FAILURE_EXIT_CODE: i32 = 1;

/// Errors that end the startup sequence.
#[derive(Debug, Error)]
pub enum StartupError {
    /// Options, the key-file or the remote document were unusable.
    #[error("configuration error: {source}")]
    Config {
        /// Underlying configuration error.
        #[source]
        source: ConfigError,
    },
    /// Settings failed validation.
    #[error("invalid settings: {source}")]
    Validation {
        /// Underlying validation error.
        #[source]
        source: ValidationError,
    },
    /// A file or process resource could not be acquired.
    #[error("resource error: {source}")]
    Resource {
        /// Underlying resource error.
        #[source]
        source: ResourceError,
    },
    /// A plugin failed to load, initialise or start.
    #[error("plugin error: {source}")]
    Plugin {
        /// Underlying plugin error.
        #[source]
        source: PluginError,
    },
    /// The main loop or the background monitor failed.
    #[error("runtime error: {source}")]
    Runtime {
        /// Underlying runtime error.
        #[source]
        source: RuntimeError,
    },
}

impl StartupError {
    /// Process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        FAILURE_EXIT_CODE
    }
}

impl From<ConfigError> for StartupError {
    fn from(source: ConfigError) -> Self {
        Self::Config { source }
    }
}

impl From<ValidationError> for StartupError {
    fn from(source: ValidationError) -> Self {
        Self::Validation { source }
    }
}

impl From<ResourceError> for StartupError {
    fn from(source: ResourceError) -> Self {
        Self::Resource { source }
    }
}

impl From<PluginError> for StartupError {
    fn from(source: PluginError) -> Self {
        Self::Plugin { source }
    }
}

impl From<RuntimeError> for StartupError {
    fn from(source: RuntimeError) -> Self {
        Self::Runtime { source }
    }
}

/// Failures acquiring files, limits and process state.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// The log file could not be opened.
    #[error("failed to open log file '{path}': {source}")]
    LogOpen {
        /// Log file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The log level could not be applied.
    #[error("failed to apply log level: {message}")]
    LogLevel {
        /// Description of the reload failure.
        message: String,
    },
    /// Writing the pid file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// Pid file path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The transaction log could not be opened.
    #[error("failed to open transaction log '{path}': {source}")]
    TransactionLog {
        /// Transaction log path.
        path: Utf8PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The open file limit could not be raised.
    #[error("failed to set max-open-files to {limit}: {source}")]
    FileLimit {
        /// Requested limit.
        limit: u64,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Installing the crash handler failed.
    #[error("failed to install crash handler: {source}")]
    CrashHandler {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Detaching from the terminal failed.
    #[error("failed to daemonise: {source}")]
    Daemonize {
        /// Underlying daemonisation error.
        #[source]
        source: DaemonizeError,
    },
    /// The configured account does not exist.
    #[error("unknown user '{name}'")]
    UnknownUser {
        /// Account name.
        name: String,
    },
    /// Switching to the configured account failed.
    #[error("failed to switch to user '{name}': {source}")]
    SwitchUser {
        /// Account name.
        name: String,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Forking a worker failed.
    #[error("failed to fork worker: {source}")]
    Fork {
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Waiting for the worker failed.
    #[error("failed to wait for worker {pid}: {source}")]
    Wait {
        /// Worker process id.
        pid: i32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Installing signal forwarding failed.
    #[error("failed to install signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing version or help output failed.
    #[error("failed to write to standard output: {source}")]
    Output {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl From<DaemonizeError> for ResourceError {
    fn from(source: DaemonizeError) -> Self {
        Self::Daemonize { source }
    }
}

/// Failures reported by the core runtime.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The runtime could not be constructed.
    #[error("failed to initialise the core runtime: {message}")]
    Init {
        /// Description of the failure.
        message: String,
    },
    /// The background monitor could not start.
    #[error("failed to start the background monitor: {source}")]
    MonitorStart {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The background monitor thread panicked.
    #[error("the background monitor terminated abnormally")]
    MonitorPanicked,
    /// Signal handling for the main loop could not be installed.
    #[error("failed to install main loop signal handlers: {source}")]
    Signals {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// A stage ran before the component it needs was created.
    #[error("{component} is not initialised")]
    NotInitialised {
        /// Missing component.
        component: &'static str,
    },
    /// The main loop reported a failure.
    #[error("main loop failed: {message}")]
    MainLoop {
        /// Description of the failure.
        message: String,
    },
}
