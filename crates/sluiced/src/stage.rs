//! Startup stages and the exit outcome they settle.

use std::fmt;

/// Ordered startup stages. Any failure jumps straight to [`Stage::Shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// Process start.
    Init,
    /// Tolerant pass over the command line.
    ParseBaseOptions,
    /// Key-file and remote document merge.
    LoadLocalOrRemoteConfig,
    /// Installation base directory lookup.
    ResolveBaseDir,
    /// Fatal signal handler installation.
    InstallCrashHandler,
    /// Path normalisation.
    ResolvePaths,
    /// Log and slow-query log opening.
    OpenLog,
    /// Core runtime construction.
    InitCoreRuntime,
    /// Plugin instantiation.
    LoadPlugins,
    /// Plugin option registration and initialisation.
    InitPlugins,
    /// Strict pass over the command line.
    StrictParseOptions,
    /// `--version` output.
    PrintVersionAndExit,
    /// Detaching from the terminal.
    Daemonize,
    /// Keepalive supervision.
    Supervise,
    /// Pid file creation.
    WritePidFile,
    /// Plugin mode and mandatory default checks.
    ValidateModeAndDefaults,
    /// Derived parameter computation.
    DeriveParameters,
    /// Transaction log opening.
    OpenTransactionLog,
    /// Open file limit.
    RaiseFileLimit,
    /// Background monitor start.
    StartBackgroundMonitor,
    /// External main loop.
    RunMainLoop,
    /// Background monitor stop.
    StopBackgroundMonitor,
    /// Ordered teardown.
    Shutdown,
}

impl Stage {
    /// Every stage in execution order.
    pub const ORDER: [Self; 23] = [
        Self::Init,
        Self::ParseBaseOptions,
        Self::LoadLocalOrRemoteConfig,
        Self::ResolveBaseDir,
        Self::InstallCrashHandler,
        Self::ResolvePaths,
        Self::OpenLog,
        Self::InitCoreRuntime,
        Self::LoadPlugins,
        Self::InitPlugins,
        Self::StrictParseOptions,
        Self::PrintVersionAndExit,
        Self::Daemonize,
        Self::Supervise,
        Self::WritePidFile,
        Self::ValidateModeAndDefaults,
        Self::DeriveParameters,
        Self::OpenTransactionLog,
        Self::RaiseFileLimit,
        Self::StartBackgroundMonitor,
        Self::RunMainLoop,
        Self::StopBackgroundMonitor,
        Self::Shutdown,
    ];

    /// Stable snake-case name used in telemetry.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::ParseBaseOptions => "parse_base_options",
            Self::LoadLocalOrRemoteConfig => "load_local_or_remote_config",
            Self::ResolveBaseDir => "resolve_base_dir",
            Self::InstallCrashHandler => "install_crash_handler",
            Self::ResolvePaths => "resolve_paths",
            Self::OpenLog => "open_log",
            Self::InitCoreRuntime => "init_core_runtime",
            Self::LoadPlugins => "load_plugins",
            Self::InitPlugins => "init_plugins",
            Self::StrictParseOptions => "strict_parse_options",
            Self::PrintVersionAndExit => "print_version_and_exit",
            Self::Daemonize => "daemonize",
            Self::Supervise => "supervise",
            Self::WritePidFile => "write_pid_file",
            Self::ValidateModeAndDefaults => "validate_mode_and_defaults",
            Self::DeriveParameters => "derive_parameters",
            Self::OpenTransactionLog => "open_transaction_log",
            Self::RaiseFileLimit => "raise_file_limit",
            Self::StartBackgroundMonitor => "start_background_monitor",
            Self::RunMainLoop => "run_main_loop",
            Self::StopBackgroundMonitor => "stop_background_monitor",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit code and failing stage of a daemon run.
///
/// Starts out as success. The first recorded failure wins; later failures
/// and forwarded worker statuses do not overwrite it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExitOutcome {
    code: i32,
    location: Option<Stage>,
    version_only: bool,
}

impl ExitOutcome {
    /// Records a failure at `stage`. Returns `false` when one was already
    /// recorded.
    pub fn fail(&mut self, stage: Stage, code: i32) -> bool {
        if self.location.is_some() {
            return false;
        }
        self.location = Some(stage);
        self.code = code;
        true
    }

    /// Adopts the exit status of a worker that stopped deliberately.
    pub fn forward(&mut self, code: i32) {
        if self.location.is_none() {
            self.code = code;
        }
    }

    /// Marks a run that only printed version information.
    pub fn mark_version_only(&mut self) {
        self.version_only = true;
    }

    /// Exit code of the run.
    #[must_use]
    pub const fn code(&self) -> i32 {
        self.code
    }

    /// Stage that failed, if any.
    #[must_use]
    pub const fn location(&self) -> Option<Stage> {
        self.location
    }

    /// Returns `true` when the run only printed version information.
    #[must_use]
    pub const fn version_only(&self) -> bool {
        self.version_only
    }

    /// Returns `true` when no stage failed and the exit code is zero.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.location.is_none() && self.code == 0
    }

    /// Exit status for [`std::process::ExitCode`]; codes outside `0..=255`
    /// become `1`.
    #[must_use]
    pub fn exit_status(&self) -> u8 {
        u8::try_from(self.code).unwrap_or(1)
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    fn first_failure_wins() {
        let mut outcome = ExitOutcome::default();
        assert!(outcome.fail(Stage::OpenLog, 1));
        assert!(!outcome.fail(Stage::RunMainLoop, 2));
        assert_eq!(outcome.location(), Some(Stage::OpenLog));
        assert_eq!(outcome.code(), 1);
    }

    #[rstest]
    fn forwarded_status_does_not_mask_failure() {
        let mut outcome = ExitOutcome::default();
        outcome.forward(3);
        assert_eq!(outcome.code(), 3);
        assert!(outcome.location().is_none());

        outcome.fail(Stage::Supervise, 1);
        outcome.forward(0);
        assert_eq!(outcome.code(), 1);
    }

    #[rstest]
    #[case(0, 0)]
    #[case(7, 7)]
    #[case(-1, 1)]
    #[case(300, 1)]
    fn exit_status_fits_a_byte(#[case] code: i32, #[case] expected: u8) {
        let mut outcome = ExitOutcome::default();
        outcome.forward(code);
        assert_eq!(outcome.exit_status(), expected);
    }

    #[rstest]
    fn stages_render_in_snake_case() {
        assert_eq!(Stage::LoadLocalOrRemoteConfig.to_string(), "load_local_or_remote_config");
        assert_eq!(Stage::ORDER.first(), Some(&Stage::Init));
        assert_eq!(Stage::ORDER.last(), Some(&Stage::Shutdown));
    }
}
