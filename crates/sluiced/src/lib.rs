//! Control plane of the sluice proxy daemon.
//!
//! The daemon owns process setup and the lifecycle around an external
//! proxy engine: it merges configuration from the command line, a key-file
//! and an optional remote document, opens its logs, loads plugins by name,
//! optionally detaches and supervises a worker, writes a pid file, derives
//! the runtime parameters, raises the file limit and runs the main loop
//! beside a background monitor.
//!
//! Startup is a fixed sequence of [`Stage`]s. The first failing stage is
//! recorded in an [`ExitOutcome`] and every run, successful or not, ends in
//! one teardown that releases what was acquired in a fixed order:
//!
//! 1. The shutdown flag is set and the background monitor is joined before
//!    the runtime it references is freed.
//! 2. Plugins are destroyed in reverse load order.
//! 3. The pid file is removed only by the process that wrote it.
//! 4. The log is closed after the shutdown tag is written.
//!
//! Stage, resource and teardown events flow through a [`LifecycleReporter`]
//! so tests can check that every acquisition is matched by a release.

mod builtin;
mod crash;
mod errors;
mod lifecycle;
mod orchestrator;
mod process;
mod runtime;
mod slow_query;
mod stage;
mod supervisor;
mod telemetry;
mod xa_log;

use std::ffi::OsString;
use std::sync::Arc;

pub use builtin::{ADMIN_PLUGIN, builtin_catalog};
pub use crash::{CrashHandler, FaultHandler, HandlerGuard, instrumentation_detected};
pub use errors::{FAILURE_EXIT_CODE, ResourceError, RuntimeError, StartupError};
pub use lifecycle::{
    LifecycleReporter, ResourceKind, StructuredLifecycleReporter, TeardownStep,
};
pub use orchestrator::{Collaborators, Orchestrator};
pub use process::{
    DaemonizeError, Daemonizer, FileLimit, PidFile, SystemDaemonizer, SystemFileLimit,
};
pub use runtime::{
    BackgroundMonitor, CoreRuntime, MONITOR_INTERVAL, MainLoop, RuntimeFactory, ShutdownFlag,
    SignalMainLoop, SystemRuntimeFactory, TickingMonitor,
};
pub use slow_query::{
    SLOW_QUERY_TARGET, SlowQueryLayer, SlowQueryLog, SlowQuerySink, slow_query_path,
};
pub use stage::{ExitOutcome, Stage};
pub use supervisor::{
    ForkSpawner, ProcessSpawner, Role, Spawned, SupervisionOutcome, SupervisorState, WorkerExit,
    supervise,
};
pub use telemetry::{
    LogControl, LogRouter, TelemetryError, TelemetryHandle, install, level_filter,
};
pub use xa_log::TransactionLog;

const DAEMON_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::daemon");

/// Runs the daemon once with the production collaborators.
///
/// `args` starts with the program name. The returned outcome carries the
/// process exit code.
pub fn run_daemon<I>(args: I, log: Arc<dyn LogControl>) -> ExitOutcome
where
    I: IntoIterator<Item = OsString>,
{
    let collab = match Collaborators::system(log) {
        Ok(collab) => collab,
        Err(error) => {
            tracing::error!(
                target: DAEMON_TARGET,
                error = %error,
                "failed to assemble built-in plugins"
            );
            let mut outcome = ExitOutcome::default();
            outcome.fail(Stage::Init, FAILURE_EXIT_CODE);
            return outcome;
        }
    };
    Orchestrator::new(collab).run(args)
}

#[cfg(test)]
mod tests;
