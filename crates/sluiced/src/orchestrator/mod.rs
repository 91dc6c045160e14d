//! Daemon lifecycle orchestration.
//!
//! [`Orchestrator::run`] walks the startup stages in [`Stage::ORDER`],
//! recording the first failure in an [`ExitOutcome`]. Whatever happens,
//! control then reaches a single teardown that releases every acquired
//! resource exactly once, in [`crate::lifecycle::TeardownStep::ORDER`].

mod resources;
mod startup;
mod teardown;

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use sluice_config::{RemoteSource, UrlRemoteSource};
use sluice_plugins::{PluginCatalog, PluginError};

use crate::builtin::builtin_catalog;
use crate::crash::{CrashHandler, FaultHandler};
use crate::errors::StartupError;
use crate::lifecycle::{LifecycleReporter, ResourceKind, StructuredLifecycleReporter};
use crate::process::{Daemonizer, FileLimit, SystemDaemonizer, SystemFileLimit};
use crate::runtime::{RuntimeFactory, SystemRuntimeFactory};
use crate::stage::{ExitOutcome, Stage};
use crate::supervisor::{ForkSpawner, ProcessSpawner};
use crate::telemetry::LogControl;

use self::resources::Resources;

const ORCHESTRATOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::orchestrator");

/// External services the orchestrator drives.
pub struct Collaborators {
    /// Daemon log control.
    pub log: Arc<dyn LogControl>,
    /// Receives stage, resource and teardown events.
    pub reporter: Arc<dyn LifecycleReporter>,
    /// Fetches the remote configuration document.
    pub remote: Box<dyn RemoteSource + Send>,
    /// Plugins that may be named in the `plugins` list.
    pub catalog: PluginCatalog,
    /// Builds the core runtime.
    pub runtime: Box<dyn RuntimeFactory>,
    /// Detaches from the terminal and switches user.
    pub daemonizer: Box<dyn Daemonizer>,
    /// Creates worker processes under `--keepalive`.
    pub spawner: Box<dyn ProcessSpawner>,
    /// Installs the crash handler.
    pub fault_handler: Box<dyn FaultHandler>,
    /// Raises the open file limit.
    pub file_limit: Box<dyn FileLimit>,
    /// Path of the running executable, used to derive the base directory.
    pub executable: Option<PathBuf>,
    /// Destination of version and help text.
    pub output: Box<dyn Write + Send>,
}

impl Collaborators {
    /// Production collaborators writing version and help text to stdout.
    ///
    /// # Errors
    ///
    /// Fails when the built-in plugin catalog cannot be assembled.
    pub fn system(log: Arc<dyn LogControl>) -> Result<Self, PluginError> {
        Ok(Self {
            log,
            reporter: Arc::new(StructuredLifecycleReporter::new()),
            remote: Box::new(UrlRemoteSource::default()),
            catalog: builtin_catalog()?,
            runtime: Box::new(SystemRuntimeFactory::default()),
            daemonizer: Box::new(SystemDaemonizer::new()),
            spawner: Box::new(ForkSpawner),
            fault_handler: Box::new(CrashHandler::from_env()),
            file_limit: Box::new(SystemFileLimit),
            executable: std::env::current_exe().ok(),
            output: Box::new(io::stdout()),
        })
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("catalog", &self.catalog)
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

/// How startup ended when no stage failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Completed,
    HelpPrinted,
    VersionPrinted,
    Supervised { code: i32 },
}

/// A stage failure on its way to the exit outcome.
#[derive(Debug)]
struct Failure {
    stage: Stage,
    error: StartupError,
}

/// Runs the daemon lifecycle once.
pub struct Orchestrator {
    collab: Collaborators,
    resources: Resources,
    outcome: ExitOutcome,
    torn_down: bool,
}

impl Orchestrator {
    /// Creates an orchestrator that has not started.
    #[must_use]
    pub fn new(collab: Collaborators) -> Self {
        Self {
            collab,
            resources: Resources::default(),
            outcome: ExitOutcome::default(),
            torn_down: false,
        }
    }

    /// Runs startup with `args`, whose first item is the program name, then
    /// tears down and returns the outcome.
    ///
    /// A second call only returns the recorded outcome.
    pub fn run<I>(&mut self, args: I) -> ExitOutcome
    where
        I: IntoIterator<Item = OsString>,
    {
        if self.torn_down {
            return self.outcome;
        }
        match self.startup(args.into_iter().collect()) {
            Ok(Flow::Supervised { code }) => self.outcome.forward(code),
            Ok(Flow::Completed | Flow::HelpPrinted | Flow::VersionPrinted) => {}
            Err(Failure { stage, error }) => {
                self.outcome.fail(stage, error.exit_code());
                self.resources.pending_error = Some(error);
            }
        }
        self.shutdown();
        self.outcome
    }

    /// Releases every resource still held. Runs at most once; later calls
    /// and the drop that follows are no-ops.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.teardown();
    }

    /// Outcome recorded so far.
    #[must_use]
    pub const fn outcome(&self) -> ExitOutcome {
        self.outcome
    }

    /// Runs `action` as `stage`, reporting entry and failure.
    fn stage<T>(
        &mut self,
        stage: Stage,
        action: impl FnOnce(&mut Self) -> Result<T, StartupError>,
    ) -> Result<T, Failure> {
        self.collab.reporter.stage_entered(stage);
        action(self).map_err(|error| {
            self.collab.reporter.stage_failed(stage, &error);
            Failure { stage, error }
        })
    }

    fn acquired(&self, kind: ResourceKind, count: usize) {
        if count > 0 {
            self.collab.reporter.resource_acquired(kind, count);
        }
    }

    fn released(&self, kind: ResourceKind, count: usize) {
        if count > 0 {
            self.collab.reporter.resource_released(kind, count);
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("outcome", &self.outcome)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}
