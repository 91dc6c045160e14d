//! Everything startup acquires, held until teardown releases it.

use std::sync::Arc;

use camino::Utf8PathBuf;
use sluice_config::{ConfigurationResolver, RawConfig, ResolvedConfig};
use sluice_plugins::PluginSet;

use crate::crash::HandlerGuard;
use crate::errors::{RuntimeError, StartupError};
use crate::process::PidFile;
use crate::runtime::CoreRuntime;
use crate::xa_log::TransactionLog;

/// Slots filled as stages succeed. Teardown empties them in
/// [`crate::lifecycle::TeardownStep::ORDER`].
#[derive(Default)]
pub(super) struct Resources {
    pub(super) pending_error: Option<StartupError>,
    pub(super) resolver: Option<ConfigurationResolver>,
    pub(super) raw: Option<RawConfig>,
    pub(super) crash_guard: Option<Box<dyn HandlerGuard>>,
    pub(super) log_opened: bool,
    pub(super) log_file_open: bool,
    pub(super) slow_query_open: bool,
    pub(super) runtime: Option<CoreRuntime>,
    pub(super) plugins: Option<PluginSet>,
    pub(super) pid_file: Option<PidFile>,
    pub(super) config: Option<Arc<ResolvedConfig>>,
    pub(super) xa_log: Option<TransactionLog>,
}

impl Resources {
    pub(super) fn resolver(&mut self) -> Result<&mut ConfigurationResolver, StartupError> {
        self.resolver.as_mut().ok_or_else(|| missing("option registry"))
    }

    pub(super) fn raw(&mut self) -> Result<&mut RawConfig, StartupError> {
        self.raw
            .as_mut()
            .ok_or_else(|| missing("frontend configuration"))
    }

    pub(super) fn base_dir(&mut self) -> Result<Utf8PathBuf, StartupError> {
        self.raw()?
            .base_dir
            .clone()
            .ok_or_else(|| missing("base directory"))
    }

    pub(super) fn runtime(&mut self) -> Result<&mut CoreRuntime, StartupError> {
        self.runtime.as_mut().ok_or_else(|| missing("core runtime"))
    }

    pub(super) fn plugins(&mut self) -> Result<&mut PluginSet, StartupError> {
        self.plugins.as_mut().ok_or_else(|| missing("plugin set"))
    }

    pub(super) fn config(&self) -> Result<Arc<ResolvedConfig>, StartupError> {
        self.config
            .clone()
            .ok_or_else(|| missing("derived configuration"))
    }
}

fn missing(component: &'static str) -> StartupError {
    RuntimeError::NotInitialised { component }.into()
}
