//! Test doubles for the orchestrator's collaborators.
//!
//! Every double writes its side effects to a shared [`Journal`] so suites
//! can assert on cross-collaborator ordering.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use camino::Utf8Path;
use nix::errno::Errno;
use nix::unistd::Pid;
use sluice_config::{
    LogLevel, OptionDescriptor, OptionKind, OptionValue, RawConfig, RemoteConfigError,
    RemoteSource, ResolvedConfig,
};
use sluice_plugins::{Plugin, PluginCatalog, PluginContext, PluginError};
use url::Url;

use super::journal::Journal;
use crate::crash::{FaultHandler, HandlerGuard};
use crate::errors::{ResourceError, RuntimeError};
use crate::process::{DaemonizeError, Daemonizer, FileLimit};
use crate::runtime::{BackgroundMonitor, CoreRuntime, MainLoop, RuntimeFactory, ShutdownFlag};
use crate::slow_query::{SLOW_QUERY_TARGET, SlowQueryLog, SlowQuerySink};
use crate::supervisor::{ProcessSpawner, Spawned, WorkerExit};
use crate::telemetry::LogControl;

/// Log control that records calls instead of redirecting output.
#[derive(Debug, Default)]
pub struct RecordingLog {
    journal: Journal,
    fail_open: bool,
    slow_query: SlowQuerySink,
}

impl RecordingLog {
    pub fn new(journal: Journal, fail_open: bool) -> Self {
        Self {
            journal,
            fail_open,
            slow_query: SlowQuerySink::new(),
        }
    }

    /// Attaches slow-query logs to `sink` instead of a private one.
    pub fn with_slow_query(mut self, sink: SlowQuerySink) -> Self {
        self.slow_query = sink;
        self
    }
}

impl LogControl for RecordingLog {
    fn open(&self, path: Option<&Utf8Path>) -> Result<(), ResourceError> {
        let target = path.map_or_else(|| "stderr".to_owned(), ToString::to_string);
        if self.fail_open {
            return Err(ResourceError::LogOpen {
                path: target.into(),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.journal.record(format!("log:open:{target}"));
        Ok(())
    }

    fn reopen(&self) -> Result<(), ResourceError> {
        self.journal.record("log:reopen");
        Ok(())
    }

    fn set_level(&self, level: LogLevel) -> Result<(), ResourceError> {
        self.journal.record(format!("log:level:{level}"));
        Ok(())
    }

    fn close(&self) {
        self.journal.record("log:close");
    }

    fn attach_slow_query(&self, log: SlowQueryLog) {
        self.journal.record(format!("log:slow_query:attach:{}", log.path()));
        drop(self.slow_query.attach(log));
    }

    fn detach_slow_query(&self) -> Option<SlowQueryLog> {
        self.journal.record("log:slow_query:detach");
        self.slow_query.detach()
    }
}

/// Which runtime operations fail.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuntimeFaults {
    pub create: bool,
    pub monitor_start: bool,
    pub monitor_stop: bool,
    pub main_loop: bool,
}

/// Builds runtimes from a recording main loop and monitor.
#[derive(Debug, Default)]
pub struct TestRuntimeFactory {
    journal: Journal,
    faults: RuntimeFaults,
}

impl TestRuntimeFactory {
    pub fn new(journal: Journal, faults: RuntimeFaults) -> Self {
        Self { journal, faults }
    }
}

impl RuntimeFactory for TestRuntimeFactory {
    fn create(&self, _raw: &RawConfig) -> Result<CoreRuntime, RuntimeError> {
        if self.faults.create {
            return Err(RuntimeError::Init {
                message: "engine unavailable".to_owned(),
            });
        }
        self.journal.record("runtime:create");
        Ok(CoreRuntime::new(
            Box::new(RecordingMainLoop {
                journal: self.journal.clone(),
                fail: self.faults.main_loop,
            }),
            Box::new(RecordingMonitor {
                journal: self.journal.clone(),
                fail_start: self.faults.monitor_start,
                fail_stop: self.faults.monitor_stop,
                shutdown: None,
            }),
        ))
    }
}

/// Statement the main loop double reports as slow.
pub const SLOW_QUERY: &str = "SELECT SLEEP(1.5)";

/// Serves until it is run, reports one slow query, then requests shutdown
/// as a signal would.
struct RecordingMainLoop {
    journal: Journal,
    fail: bool,
}

impl MainLoop for RecordingMainLoop {
    fn run(&mut self, shutdown: &ShutdownFlag, log: &dyn LogControl) -> Result<(), RuntimeError> {
        self.journal.record("main_loop:run");
        if self.fail {
            return Err(RuntimeError::MainLoop {
                message: "event base broken".to_owned(),
            });
        }
        log.reopen().map_err(|error| RuntimeError::MainLoop {
            message: error.to_string(),
        })?;
        tracing::warn!(target: SLOW_QUERY_TARGET, elapsed_ms = 1500, "{SLOW_QUERY}");
        shutdown.request();
        self.journal.record("main_loop:exit");
        Ok(())
    }
}

/// Monitor that records whether the flag was set when it was stopped.
struct RecordingMonitor {
    journal: Journal,
    fail_start: bool,
    fail_stop: bool,
    shutdown: Option<ShutdownFlag>,
}

impl BackgroundMonitor for RecordingMonitor {
    fn start(
        &mut self,
        config: Arc<ResolvedConfig>,
        shutdown: ShutdownFlag,
    ) -> Result<(), RuntimeError> {
        if self.fail_start {
            return Err(RuntimeError::MonitorStart {
                source: io::Error::new(io::ErrorKind::WouldBlock, "no threads left"),
            });
        }
        self.journal
            .record(format!("monitor:start:check={}", config.replica_delay.check));
        self.shutdown = Some(shutdown);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RuntimeError> {
        let Some(shutdown) = self.shutdown.take() else {
            return Ok(());
        };
        self.journal
            .record(format!("monitor:stop:flag={}", shutdown.is_requested()));
        if self.fail_stop {
            return Err(RuntimeError::MonitorPanicked);
        }
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.shutdown.is_some()
    }
}

impl Drop for RecordingMonitor {
    fn drop(&mut self) {
        self.journal.record("runtime:free");
    }
}

/// Records detaching and user switches; switching can be made to fail.
#[derive(Debug, Default)]
pub struct RecordingDaemonizer {
    journal: Journal,
    fail_switch: bool,
}

impl RecordingDaemonizer {
    pub fn new(journal: Journal, fail_switch: bool) -> Self {
        Self {
            journal,
            fail_switch,
        }
    }
}

impl Daemonizer for RecordingDaemonizer {
    fn daemonize(&self, work_dir: &Utf8Path) -> Result<(), DaemonizeError> {
        self.journal.record(format!("daemonize:{work_dir}"));
        Ok(())
    }

    fn switch_user(&self, name: &str) -> Result<(), ResourceError> {
        if self.fail_switch {
            return Err(ResourceError::UnknownUser {
                name: name.to_owned(),
            });
        }
        self.journal.record(format!("switch_user:{name}"));
        Ok(())
    }
}

/// What the worker fork produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SpawnScript {
    /// The caller continues as the worker.
    #[default]
    Worker,
    /// The caller is the supervisor and the worker exits with the code.
    Stops(i32),
    /// The fork fails.
    Fails,
}

#[derive(Debug, Default)]
pub struct TestSpawner {
    journal: Journal,
    script: SpawnScript,
}

impl TestSpawner {
    pub fn new(journal: Journal, script: SpawnScript) -> Self {
        Self { journal, script }
    }
}

impl ProcessSpawner for TestSpawner {
    fn spawn(&self) -> Result<Spawned, ResourceError> {
        self.journal.record("spawn");
        match self.script {
            SpawnScript::Worker => Ok(Spawned::Worker),
            SpawnScript::Stops(_) => Ok(Spawned::Supervisor {
                child: Pid::from_raw(4242),
            }),
            SpawnScript::Fails => Err(ResourceError::Fork {
                source: Errno::EAGAIN,
            }),
        }
    }

    fn wait(&self, _child: Pid) -> Result<WorkerExit, ResourceError> {
        match self.script {
            SpawnScript::Stops(code) => Ok(WorkerExit::Exited(code)),
            SpawnScript::Worker | SpawnScript::Fails => Ok(WorkerExit::Exited(0)),
        }
    }
}

#[derive(Debug, Default)]
pub struct RecordingFaultHandler {
    journal: Journal,
    fail: bool,
}

impl RecordingFaultHandler {
    pub fn new(journal: Journal, fail: bool) -> Self {
        Self { journal, fail }
    }
}

impl FaultHandler for RecordingFaultHandler {
    fn install(&self) -> Result<Option<Box<dyn HandlerGuard>>, ResourceError> {
        if self.fail {
            return Err(ResourceError::CrashHandler {
                source: Errno::EINVAL,
            });
        }
        self.journal.record("crash:install");
        Ok(Some(Box::new(RecordingGuard {
            journal: self.journal.clone(),
            restored: false,
        })))
    }
}

struct RecordingGuard {
    journal: Journal,
    restored: bool,
}

impl HandlerGuard for RecordingGuard {
    fn restore(&mut self) -> bool {
        if self.restored {
            return false;
        }
        self.restored = true;
        self.journal.record("crash:restore");
        true
    }
}

#[derive(Debug, Default)]
pub struct RecordingFileLimit {
    journal: Journal,
    fail: bool,
}

impl RecordingFileLimit {
    pub fn new(journal: Journal, fail: bool) -> Self {
        Self { journal, fail }
    }
}

impl FileLimit for RecordingFileLimit {
    fn raise(&self, limit: u64) -> Result<(), ResourceError> {
        if self.fail {
            return Err(ResourceError::FileLimit {
                limit,
                source: Errno::EPERM,
            });
        }
        self.journal.record(format!("limit:{limit}"));
        Ok(())
    }
}

/// Serves a fixed document body for every URL.
#[derive(Debug, Default)]
pub struct ScriptedRemote {
    body: Option<String>,
}

impl ScriptedRemote {
    pub fn new(body: Option<String>) -> Self {
        Self { body }
    }
}

impl RemoteSource for ScriptedRemote {
    fn fetch(&self, url: &Url) -> Result<String, RemoteConfigError> {
        self.body
            .clone()
            .ok_or_else(|| RemoteConfigError::UnsupportedScheme {
                scheme: url.scheme().to_owned(),
            })
    }
}

/// In-memory stand-in for stdout.
#[derive(Debug, Clone, Default)]
pub struct SharedOutput {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl SharedOutput {
    #[must_use]
    pub fn text(&self) -> String {
        let buffer = self.buffer.lock().expect("output mutex poisoned");
        String::from_utf8_lossy(&buffer).into_owned()
    }
}

impl Write for SharedOutput {
    fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
        self.buffer
            .lock()
            .expect("output mutex poisoned")
            .extend_from_slice(bytes);
        Ok(bytes.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Behaviour {
    Succeed,
    FailInit,
    FailStart,
}

/// Plugin recording its lifecycle under `plugin:<event>:<name>`.
struct TestPlugin {
    name: &'static str,
    behaviour: Behaviour,
    journal: Journal,
}

impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        "9.9.9"
    }

    fn options(&self) -> Vec<OptionDescriptor> {
        vec![
            OptionDescriptor::new(
                format!("{}-address", self.name),
                OptionKind::String,
                "listen address",
            )
            .with_default(OptionValue::String(":4040".to_owned())),
        ]
    }

    fn init(&mut self) -> Result<(), PluginError> {
        if self.behaviour == Behaviour::FailInit {
            return Err(PluginError::Init {
                name: self.name.to_owned(),
                message: "bad settings".to_owned(),
            });
        }
        self.journal.record(format!("plugin:init:{}", self.name));
        Ok(())
    }

    fn start(&mut self, context: &PluginContext<'_>) -> Result<(), PluginError> {
        if self.behaviour == Behaviour::FailStart {
            return Err(PluginError::Start {
                name: self.name.to_owned(),
                message: "address in use".to_owned(),
            });
        }
        let address = context
            .options()
            .string(&format!("{}-address", self.name))
            .unwrap_or("unset");
        self.journal
            .record(format!("plugin:start:{}@{address}", self.name));
        Ok(())
    }

    fn stop(&mut self) {
        self.journal.record(format!("plugin:stop:{}", self.name));
    }
}

impl Drop for TestPlugin {
    fn drop(&mut self) {
        self.journal.record(format!("plugin:drop:{}", self.name));
    }
}

/// Catalog of `proxy`, `shard` and `admin`, plus `broken-init` and
/// `broken-start` which fail the named step.
pub fn test_catalog(journal: &Journal) -> PluginCatalog {
    let mut catalog = PluginCatalog::new();
    for (name, behaviour) in [
        ("proxy", Behaviour::Succeed),
        ("shard", Behaviour::Succeed),
        ("admin", Behaviour::Succeed),
        ("broken-init", Behaviour::FailInit),
        ("broken-start", Behaviour::FailStart),
    ] {
        let journal = journal.clone();
        catalog
            .register(name, move || {
                Box::new(TestPlugin {
                    name,
                    behaviour,
                    journal: journal.clone(),
                })
            })
            .expect("register test plugin");
    }
    catalog
}
