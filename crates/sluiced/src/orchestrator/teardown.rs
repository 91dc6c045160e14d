//! The single teardown path shared by every way a run can end.

use tracing::{error, info, warn};

use super::{ORCHESTRATOR_TARGET, Orchestrator};
use crate::lifecycle::{ResourceKind, TeardownStep};
use crate::stage::Stage;

impl Orchestrator {
    /// Visits every step in [`TeardownStep::ORDER`]. Each step releases its
    /// resource only when the resource is held.
    pub(super) fn teardown(&mut self) {
        self.collab.reporter.stage_entered(Stage::Shutdown);
        for step in TeardownStep::ORDER {
            let performed = self.teardown_step(step);
            self.collab.reporter.teardown_step(step, performed);
        }
        self.collab.reporter.shutdown_completed(&self.outcome);
    }

    fn teardown_step(&mut self, step: TeardownStep) -> bool {
        match step {
            TeardownStep::ReleasePendingError => self.resources.pending_error.take().is_some(),
            TeardownStep::RequestShutdown => {
                let Some(runtime) = self.resources.runtime.as_ref() else {
                    return false;
                };
                runtime.request_shutdown();
                true
            }
            TeardownStep::StopMonitor => match self.stop_monitor() {
                Ok(stopped) => stopped,
                Err(error) => {
                    warn!(
                        target: ORCHESTRATOR_TARGET,
                        error = %error,
                        "background monitor stopped abnormally"
                    );
                    true
                }
            },
            TeardownStep::FreeRuntime => self.free_runtime(),
            TeardownStep::FreeOptionRegistry => {
                let Some(resolver) = self.resources.resolver.take() else {
                    return false;
                };
                self.released(ResourceKind::RegistryEntry, resolver.registry().len());
                true
            }
            TeardownStep::RestoreCrashHandler => {
                let Some(mut guard) = self.resources.crash_guard.take() else {
                    return false;
                };
                guard.restore();
                self.released(ResourceKind::CrashHandler, 1);
                true
            }
            TeardownStep::RemovePidFile => {
                let Some(mut pid_file) = self.resources.pid_file.take() else {
                    return false;
                };
                pid_file.remove();
                self.released(ResourceKind::PidFile, 1);
                true
            }
            TeardownStep::CloseLog => self.close_log(),
            TeardownStep::CloseSlowQueryLog => {
                if !std::mem::take(&mut self.resources.slow_query_open) {
                    return false;
                }
                if let Some(slow_query) = self.collab.log.detach_slow_query() {
                    let path = slow_query.path().to_path_buf();
                    if let Err(error) = slow_query.close() {
                        warn!(
                            target: ORCHESTRATOR_TARGET,
                            file = %path,
                            error = %error,
                            "failed to close slow query log"
                        );
                    }
                }
                self.released(ResourceKind::OpenFile, 1);
                true
            }
            TeardownStep::CloseTransactionLog => {
                let Some(xa_log) = self.resources.xa_log.take() else {
                    return false;
                };
                let path = xa_log.path().to_path_buf();
                if let Err(error) = xa_log.close() {
                    warn!(
                        target: ORCHESTRATOR_TARGET,
                        file = %path,
                        error = %error,
                        "failed to close transaction log"
                    );
                }
                self.released(ResourceKind::OpenFile, 1);
                true
            }
            TeardownStep::FreeFrontendConfig => {
                if self.resources.raw.take().is_none() {
                    return false;
                }
                self.released(ResourceKind::FrontendConfig, 1);
                true
            }
        }
    }

    /// Destroys plugins in reverse load order, then the runtime and the
    /// derived configuration it was started with.
    fn free_runtime(&mut self) -> bool {
        let mut performed = false;
        if let Some(mut plugins) = self.resources.plugins.take() {
            let unloaded = plugins.unload_all();
            self.released(ResourceKind::PluginHandle, unloaded.len());
            performed = true;
        }
        if let Some(runtime) = self.resources.runtime.take() {
            drop(runtime);
            self.released(ResourceKind::CoreRuntime, 1);
            performed = true;
        }
        self.resources.config = None;
        performed
    }

    fn close_log(&mut self) -> bool {
        if !self.resources.log_opened {
            return false;
        }
        if !self.outcome.version_only() {
            let code = self.outcome.code();
            let verbose = self
                .resources
                .raw
                .as_ref()
                .is_some_and(|raw| raw.verbose_shutdown);
            if verbose {
                error!(
                    target: ORCHESTRATOR_TARGET,
                    "shutting down normally, exit code is: {code}"
                );
            } else {
                info!(
                    target: ORCHESTRATOR_TARGET,
                    "shutting down normally, exit code is: {code}"
                );
            }
        }
        self.collab.log.close();
        self.resources.log_opened = false;
        if std::mem::take(&mut self.resources.log_file_open) {
            self.released(ResourceKind::OpenFile, 1);
        }
        true
    }
}
