//! Builds orchestrators wired to recording doubles inside a scratch
//! installation directory.

use std::ffi::OsString;
use std::fs;
use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::TempDir;

use super::doubles::{
    RecordingDaemonizer, RecordingFaultHandler, RecordingFileLimit, RecordingLog, RuntimeFaults,
    ScriptedRemote, SharedOutput, SpawnScript, TestRuntimeFactory, TestSpawner, test_catalog,
};
use super::journal::Journal;
use super::reporter::RecordingReporter;
use crate::orchestrator::{Collaborators, Orchestrator};
use crate::slow_query::SlowQuerySink;
use crate::stage::ExitOutcome;

/// Log file configured by [`Harness::args`], relative to the base directory.
pub const LOG_FILE: &str = "logs/sluiced.log";
/// Pid file configured by [`Harness::args`], relative to the base directory.
pub const PID_FILE: &str = "sluiced.pid";

/// Collaborator failures to inject.
#[derive(Debug, Clone, Default)]
pub struct Faults {
    pub log_open: bool,
    pub crash_handler: bool,
    pub runtime: RuntimeFaults,
    pub switch_user: bool,
    pub spawn: SpawnScript,
    pub file_limit: bool,
    pub remote_body: Option<String>,
}

pub struct Harness {
    _dir: TempDir,
    base: Utf8PathBuf,
    pub journal: Journal,
    pub reporter: Arc<RecordingReporter>,
    pub output: SharedOutput,
    pub slow_query: SlowQuerySink,
    pub faults: Faults,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_faults(Faults::default())
    }

    pub fn with_faults(faults: Faults) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let base = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).expect("utf-8 temp dir");
        fs::create_dir_all(base.join("logs")).expect("create log directory");
        Self {
            _dir: dir,
            base,
            journal: Journal::default(),
            reporter: Arc::new(RecordingReporter::default()),
            output: SharedOutput::default(),
            slow_query: SlowQuerySink::new(),
            faults,
        }
    }

    pub fn base_dir(&self) -> &Utf8Path {
        &self.base
    }

    pub fn path(&self, relative: &str) -> Utf8PathBuf {
        self.base.join(relative)
    }

    pub fn collaborators(&self) -> Collaborators {
        let journal = &self.journal;
        Collaborators {
            log: Arc::new(
                RecordingLog::new(journal.clone(), self.faults.log_open)
                    .with_slow_query(self.slow_query.clone()),
            ),
            reporter: self.reporter.clone(),
            remote: Box::new(ScriptedRemote::new(self.faults.remote_body.clone())),
            catalog: test_catalog(journal),
            runtime: Box::new(TestRuntimeFactory::new(journal.clone(), self.faults.runtime)),
            daemonizer: Box::new(RecordingDaemonizer::new(
                journal.clone(),
                self.faults.switch_user,
            )),
            spawner: Box::new(TestSpawner::new(journal.clone(), self.faults.spawn)),
            fault_handler: Box::new(RecordingFaultHandler::new(
                journal.clone(),
                self.faults.crash_handler,
            )),
            file_limit: Box::new(RecordingFileLimit::new(journal.clone(), self.faults.file_limit)),
            executable: None,
            output: Box::new(self.output.clone()),
        }
    }

    /// Program name, base directory, username, log file and pid file,
    /// followed by `extra`.
    pub fn args(&self, extra: &[&str]) -> Vec<OsString> {
        let mut args = vec![
            OsString::from("sluiced"),
            OsString::from(format!("--basedir={}", self.base)),
            OsString::from("--default-username=app"),
            OsString::from(format!("--log-file={LOG_FILE}")),
            OsString::from(format!("--pid-file={PID_FILE}")),
        ];
        args.extend(extra.iter().map(OsString::from));
        args
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.collaborators())
    }

    /// Runs a fresh orchestrator with [`Harness::args`].
    pub fn run(&self, extra: &[&str]) -> ExitOutcome {
        self.orchestrator().run(self.args(extra))
    }
}
