//! The startup stages, in the order [`Orchestrator::startup`] runs them.

use std::ffi::OsString;
use std::io::Write;
use std::sync::Arc;

use sluice_config::{
    ConfigError, ConfigurationResolver, RawConfig, check_base_dir, derive, resolve_base_dir,
    resolve_paths, validate_mode_and_defaults,
};
use sluice_plugins::PluginLoader;
use tracing::{debug, info, warn};

use super::{Failure, Flow, ORCHESTRATOR_TARGET, Orchestrator};
use crate::errors::{ResourceError, StartupError};
use crate::lifecycle::ResourceKind;
use crate::process::PidFile;
use crate::slow_query::SlowQueryLog;
use crate::stage::Stage;
use crate::supervisor::{SupervisionOutcome, supervise};
use crate::xa_log::TransactionLog;

impl Orchestrator {
    pub(super) fn startup(&mut self, args: Vec<OsString>) -> Result<Flow, Failure> {
        self.collab.reporter.stage_entered(Stage::Init);
        self.stage(Stage::ParseBaseOptions, |o| o.parse_base_options(args))?;
        self.stage(Stage::LoadLocalOrRemoteConfig, Self::load_config)?;
        self.stage(Stage::ResolveBaseDir, Self::resolve_base_dir)?;
        self.stage(Stage::InstallCrashHandler, Self::install_crash_handler)?;
        self.stage(Stage::ResolvePaths, Self::resolve_paths)?;
        self.stage(Stage::OpenLog, Self::open_log)?;
        self.stage(Stage::InitCoreRuntime, Self::init_core_runtime)?;
        self.stage(Stage::LoadPlugins, Self::load_plugins)?;
        self.stage(Stage::InitPlugins, Self::init_plugins)?;
        if self.stage(Stage::StrictParseOptions, Self::strict_parse)? {
            return Ok(Flow::HelpPrinted);
        }
        if self.raw_flag(|raw| raw.print_version) {
            self.stage(Stage::PrintVersionAndExit, Self::print_version)?;
            return Ok(Flow::VersionPrinted);
        }
        if self.raw_flag(|raw| raw.daemon || raw.user.is_some()) {
            self.stage(Stage::Daemonize, Self::daemonize)?;
        }
        if self.raw_flag(|raw| raw.keepalive) {
            if let SupervisionOutcome::Stopped { code, .. } =
                self.stage(Stage::Supervise, Self::supervise)?
            {
                return Ok(Flow::Supervised { code });
            }
        }
        self.stage(Stage::WritePidFile, Self::write_pid_file)?;
        self.stage(Stage::ValidateModeAndDefaults, Self::validate)?;
        self.stage(Stage::DeriveParameters, Self::derive_parameters)?;
        self.stage(Stage::OpenTransactionLog, Self::open_transaction_log)?;
        self.stage(Stage::RaiseFileLimit, Self::raise_file_limit)?;
        self.stage(Stage::StartBackgroundMonitor, Self::start_monitor)?;
        self.stage(Stage::RunMainLoop, Self::run_main_loop)?;
        self.stage(Stage::StopBackgroundMonitor, |o| o.stop_monitor().map(drop))?;
        Ok(Flow::Completed)
    }

    fn raw_flag(&self, flag: impl FnOnce(&RawConfig) -> bool) -> bool {
        self.resources.raw.as_ref().is_some_and(flag)
    }

    fn parse_base_options(&mut self, args: Vec<OsString>) -> Result<(), StartupError> {
        let resolver = ConfigurationResolver::new(args)?;
        self.acquired(ResourceKind::RegistryEntry, resolver.registry().len());
        self.resources.resolver.insert(resolver).parse_tolerant()?;
        Ok(())
    }

    fn load_config(&mut self) -> Result<(), StartupError> {
        let resolver = self.resources.resolver()?;
        resolver.load_sources(self.collab.remote.as_ref())?;
        let raw = resolver.raw_config()?;
        self.resources.raw = Some(raw);
        self.acquired(ResourceKind::FrontendConfig, 1);
        Ok(())
    }

    fn resolve_base_dir(&mut self) -> Result<(), StartupError> {
        let executable = self.collab.executable.as_deref();
        let raw = self.resources.raw()?;
        let base_dir =
            resolve_base_dir(raw.base_dir.as_deref(), executable).map_err(ConfigError::from)?;
        debug!(target: ORCHESTRATOR_TARGET, base_dir = %base_dir, "base directory resolved");
        raw.base_dir = Some(base_dir);
        Ok(())
    }

    fn install_crash_handler(&mut self) -> Result<(), StartupError> {
        if let Some(guard) = self.collab.fault_handler.install()? {
            self.resources.crash_guard = Some(guard);
            self.acquired(ResourceKind::CrashHandler, 1);
        }
        Ok(())
    }

    fn resolve_paths(&mut self) -> Result<(), StartupError> {
        let base_dir = self.resources.base_dir()?;
        check_base_dir(&base_dir).map_err(ConfigError::from)?;
        resolve_paths(self.resources.raw()?, &base_dir);
        Ok(())
    }

    fn open_log(&mut self) -> Result<(), StartupError> {
        let raw = self.resources.raw()?;
        let log_file = raw.log_file.clone();
        let level = raw.log_level.unwrap_or_default();

        self.collab.log.open(log_file.as_deref())?;
        self.resources.log_opened = true;
        if log_file.is_some() {
            self.resources.log_file_open = true;
            self.acquired(ResourceKind::OpenFile, 1);
        }
        self.collab.log.set_level(level)?;

        if let Some(path) = log_file {
            match SlowQueryLog::open(&path) {
                Ok(slow_query) => {
                    self.collab.log.attach_slow_query(slow_query);
                    self.resources.slow_query_open = true;
                    self.acquired(ResourceKind::OpenFile, 1);
                }
                Err(error) => warn!(
                    target: ORCHESTRATOR_TARGET,
                    log_file = %path,
                    error = %error,
                    "slow query log unavailable"
                ),
            }
        }
        Ok(())
    }

    fn init_core_runtime(&mut self) -> Result<(), StartupError> {
        let runtime = self.collab.runtime.create(self.resources.raw()?)?;
        self.resources.runtime = Some(runtime);
        self.acquired(ResourceKind::CoreRuntime, 1);
        Ok(())
    }

    fn load_plugins(&mut self) -> Result<(), StartupError> {
        let raw = self.resources.raw()?;
        let set = PluginLoader::new(&self.collab.catalog, raw.plugin_dir.as_deref())
            .load(&raw.plugins)?;
        let count = set.len();
        self.resources.plugins = Some(set);
        self.acquired(ResourceKind::PluginHandle, count);
        Ok(())
    }

    fn init_plugins(&mut self) -> Result<(), StartupError> {
        let descriptors = self.resources.plugins()?.option_descriptors();
        let resolver = self.resources.resolver()?;
        let before = resolver.registry().len();
        let registered = resolver.register_plugin_options(descriptors);
        let added = resolver.registry().len().saturating_sub(before);
        self.acquired(ResourceKind::RegistryEntry, added);
        registered?;
        self.resources.plugins()?.init_all()?;
        Ok(())
    }

    /// Returns `true` when help was printed instead.
    fn strict_parse(&mut self) -> Result<bool, StartupError> {
        if self.resources.raw()?.show_help {
            let help = self.resources.resolver()?.help();
            self.emit(&help)?;
            return Ok(true);
        }

        let resolver = self.resources.resolver()?;
        resolver.parse_strict()?;
        for (origin, key) in resolver.unknown_document_keys() {
            debug!(
                target: ORCHESTRATOR_TARGET,
                origin = %origin,
                key = %key,
                "ignoring unknown configuration key"
            );
        }
        if let (Some(plugins), Some(resolver)) = (
            self.resources.plugins.as_mut(),
            self.resources.resolver.as_ref(),
        ) {
            plugins.capture_options(resolver.registry());
        }
        Ok(false)
    }

    fn print_version(&mut self) -> Result<(), StartupError> {
        let mut text = format!("{} {}\n", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
        for handle in self.resources.plugins()?.iter() {
            text.push_str(&format!("  {}: {}\n", handle.name(), handle.version()));
        }
        self.emit(&text)?;
        self.outcome.mark_version_only();
        Ok(())
    }

    fn emit(&mut self, text: &str) -> Result<(), StartupError> {
        let output = &mut self.collab.output;
        output
            .write_all(text.as_bytes())
            .and_then(|()| output.flush())
            .map_err(|source| ResourceError::Output { source })?;
        Ok(())
    }

    fn daemonize(&mut self) -> Result<(), StartupError> {
        if self.resources.raw()?.daemon {
            let work_dir = self.resources.base_dir()?;
            self.collab
                .daemonizer
                .daemonize(&work_dir)
                .map_err(ResourceError::from)?;
            info!(target: ORCHESTRATOR_TARGET, work_dir = %work_dir, "detached from terminal");
        }
        if let Some(user) = self.resources.raw()?.user.clone() {
            self.collab.daemonizer.switch_user(&user)?;
        }
        Ok(())
    }

    fn supervise(&mut self) -> Result<SupervisionOutcome, StartupError> {
        Ok(supervise(self.collab.spawner.as_ref())?)
    }

    fn write_pid_file(&mut self) -> Result<(), StartupError> {
        let Some(path) = self.resources.raw()?.pid_file.clone() else {
            return Ok(());
        };
        let pid_file = PidFile::write(&path, std::process::id())?;
        self.resources.pid_file = Some(pid_file);
        self.acquired(ResourceKind::PidFile, 1);
        Ok(())
    }

    fn validate(&mut self) -> Result<(), StartupError> {
        validate_mode_and_defaults(self.resources.raw()?)?;
        Ok(())
    }

    fn derive_parameters(&mut self) -> Result<(), StartupError> {
        let config = derive(self.resources.raw()?.clone())?;
        for warning in &config.warnings {
            warn!(target: ORCHESTRATOR_TARGET, warning = %warning, "configuration adjusted");
        }
        self.resources.config = Some(Arc::new(config));
        Ok(())
    }

    fn open_transaction_log(&mut self) -> Result<(), StartupError> {
        let config = self.resources.config()?;
        let Some(path) = config.paths.xa_log_file.as_deref() else {
            return Ok(());
        };
        let xa_log = TransactionLog::open(path, config.features.xa_log_in_detail)?;
        debug!(
            target: ORCHESTRATOR_TARGET,
            file = %xa_log.path(),
            detailed = xa_log.is_detailed(),
            "transaction log opened"
        );
        self.resources.xa_log = Some(xa_log);
        self.acquired(ResourceKind::OpenFile, 1);
        Ok(())
    }

    fn raise_file_limit(&mut self) -> Result<(), StartupError> {
        if let Some(limit) = self.resources.config()?.process.max_open_files {
            self.collab.file_limit.raise(limit)?;
        }
        Ok(())
    }

    fn start_monitor(&mut self) -> Result<(), StartupError> {
        let config = self.resources.config()?;
        self.resources.runtime()?.start_monitor(config)?;
        self.acquired(ResourceKind::MonitorThread, 1);
        Ok(())
    }

    fn run_main_loop(&mut self) -> Result<(), StartupError> {
        let config = self.resources.config()?;
        self.resources.plugins()?.start_all(&config)?;
        info!(target: ORCHESTRATOR_TARGET, "serving");
        let served = self.resources.runtime()?.run_main_loop(self.collab.log.as_ref());
        self.resources.plugins()?.stop_all();
        served?;
        Ok(())
    }

    /// Requests shutdown and stops a running monitor. Returns whether one
    /// was running.
    pub(super) fn stop_monitor(&mut self) -> Result<bool, StartupError> {
        let Some(runtime) = self.resources.runtime.as_mut() else {
            return Ok(false);
        };
        runtime.request_shutdown();
        if !runtime.monitor_running() {
            return Ok(false);
        }
        let stopped = runtime.stop_monitor();
        self.released(ResourceKind::MonitorThread, 1);
        stopped?;
        Ok(true)
    }
}
