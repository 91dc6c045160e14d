//! Structured reporting of startup stages, resources and teardown steps.

use std::fmt;
use std::sync::Arc;

use crate::errors::StartupError;
use crate::stage::{ExitOutcome, Stage};

const LIFECYCLE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::lifecycle");

/// Resources whose acquisition and release are reported in pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    /// Entries in the option registry.
    RegistryEntry,
    /// The merged frontend configuration.
    FrontendConfig,
    /// The installed fatal signal handler.
    CrashHandler,
    /// Log, slow-query log and transaction log files.
    OpenFile,
    /// The core runtime.
    CoreRuntime,
    /// Loaded plugin handles.
    PluginHandle,
    /// The pid file.
    PidFile,
    /// The background monitor thread.
    MonitorThread,
}

impl ResourceKind {
    /// Stable snake-case name used in telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RegistryEntry => "registry_entry",
            Self::FrontendConfig => "frontend_config",
            Self::CrashHandler => "crash_handler",
            Self::OpenFile => "open_file",
            Self::CoreRuntime => "core_runtime",
            Self::PluginHandle => "plugin_handle",
            Self::PidFile => "pid_file",
            Self::MonitorThread => "monitor_thread",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Teardown steps, always visited in [`TeardownStep::ORDER`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TeardownStep {
    /// Drop the error that ended startup.
    ReleasePendingError,
    /// Set the main loop shutdown flag.
    RequestShutdown,
    /// Stop the background monitor if it is still running.
    StopMonitor,
    /// Destroy plugins in reverse load order and free the core runtime.
    FreeRuntime,
    /// Free the option registry.
    FreeOptionRegistry,
    /// Restore the default fatal signal disposition.
    RestoreCrashHandler,
    /// Remove the pid file this process wrote.
    RemovePidFile,
    /// Log the shutdown tag and close the log.
    CloseLog,
    /// Close the slow-query log.
    CloseSlowQueryLog,
    /// Close the transaction log.
    CloseTransactionLog,
    /// Free the frontend configuration.
    FreeFrontendConfig,
}

impl TeardownStep {
    /// Teardown order: dependents before what they reference.
    pub const ORDER: [Self; 11] = [
        Self::ReleasePendingError,
        Self::RequestShutdown,
        Self::StopMonitor,
        Self::FreeRuntime,
        Self::FreeOptionRegistry,
        Self::RestoreCrashHandler,
        Self::RemovePidFile,
        Self::CloseLog,
        Self::CloseSlowQueryLog,
        Self::CloseTransactionLog,
        Self::FreeFrontendConfig,
    ];

    /// Stable snake-case name used in telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ReleasePendingError => "release_pending_error",
            Self::RequestShutdown => "request_shutdown",
            Self::StopMonitor => "stop_monitor",
            Self::FreeRuntime => "free_runtime",
            Self::FreeOptionRegistry => "free_option_registry",
            Self::RestoreCrashHandler => "restore_crash_handler",
            Self::RemovePidFile => "remove_pid_file",
            Self::CloseLog => "close_log",
            Self::CloseSlowQueryLog => "close_slow_query_log",
            Self::CloseTransactionLog => "close_transaction_log",
            Self::FreeFrontendConfig => "free_frontend_config",
        }
    }
}

impl fmt::Display for TeardownStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observer trait used to surface lifecycle events to telemetry sinks.
pub trait LifecycleReporter: Send + Sync {
    /// Invoked when a stage begins.
    fn stage_entered(&self, stage: Stage);

    /// Invoked when a stage fails; the run then proceeds to shutdown.
    fn stage_failed(&self, stage: Stage, error: &StartupError);

    /// Invoked after `count` resources of `kind` were acquired.
    fn resource_acquired(&self, kind: ResourceKind, count: usize);

    /// Invoked after `count` resources of `kind` were released.
    fn resource_released(&self, kind: ResourceKind, count: usize);

    /// Invoked for every teardown step; `performed` is `false` when there
    /// was nothing to release.
    fn teardown_step(&self, step: TeardownStep, performed: bool);

    /// Invoked once teardown has finished.
    fn shutdown_completed(&self, outcome: &ExitOutcome);
}

impl<T> LifecycleReporter for Arc<T>
where
    T: LifecycleReporter + ?Sized,
{
    fn stage_entered(&self, stage: Stage) {
        (**self).stage_entered(stage);
    }

    fn stage_failed(&self, stage: Stage, error: &StartupError) {
        (**self).stage_failed(stage, error);
    }

    fn resource_acquired(&self, kind: ResourceKind, count: usize) {
        (**self).resource_acquired(kind, count);
    }

    fn resource_released(&self, kind: ResourceKind, count: usize) {
        (**self).resource_released(kind, count);
    }

    fn teardown_step(&self, step: TeardownStep, performed: bool) {
        (**self).teardown_step(step, performed);
    }

    fn shutdown_completed(&self, outcome: &ExitOutcome) {
        (**self).shutdown_completed(outcome);
    }
}

/// Default reporter that records lifecycle events using `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct StructuredLifecycleReporter;

impl StructuredLifecycleReporter {
    /// Builds a new reporter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl LifecycleReporter for StructuredLifecycleReporter {
    fn stage_entered(&self, stage: Stage) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "stage_entered",
            stage = %stage,
            "entering startup stage"
        );
    }

    fn stage_failed(&self, stage: Stage, error: &StartupError) {
        tracing::error!(
            target: LIFECYCLE_TARGET,
            event = "stage_failed",
            stage = %stage,
            error = %error,
            "startup stage failed"
        );
    }

    fn resource_acquired(&self, kind: ResourceKind, count: usize) {
        tracing::trace!(
            target: LIFECYCLE_TARGET,
            event = "resource_acquired",
            resource = %kind,
            count,
            "resource acquired"
        );
    }

    fn resource_released(&self, kind: ResourceKind, count: usize) {
        tracing::trace!(
            target: LIFECYCLE_TARGET,
            event = "resource_released",
            resource = %kind,
            count,
            "resource released"
        );
    }

    fn teardown_step(&self, step: TeardownStep, performed: bool) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "teardown_step",
            step = %step,
            performed,
            "teardown step"
        );
    }

    fn shutdown_completed(&self, outcome: &ExitOutcome) {
        tracing::debug!(
            target: LIFECYCLE_TARGET,
            event = "shutdown_completed",
            exit_code = outcome.code(),
            location = outcome.location().map(Stage::as_str),
            "shutdown completed"
        );
    }
}
