//! Keepalive supervision: a supervisor process restarting a crashed worker.
//!
//! The supervisor and the worker share nothing but the process exit status.
//! A worker that exits through `exit` asked to stop and is not restarted; a
//! worker killed by a signal crashed and is restarted at once, with no
//! backoff and no limit.

use std::ffi::c_int;
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::{Signal, kill};
use nix::sys::wait::{WaitPidFlag, WaitStatus, waitpid};
use nix::unistd::{ForkResult, Pid, fork};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};
use tracing::{info, warn};

use crate::errors::ResourceError;

const SUPERVISOR_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::supervisor");
const WAIT_POLL_INTERVAL: Duration = Duration::from_millis(100);
const FORWARDED_SIGNALS: [c_int; 4] = [SIGTERM, SIGINT, SIGQUIT, SIGHUP];

/// Which side of a fork the caller is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spawned {
    /// The caller is the new worker.
    Worker,
    /// The caller is the supervisor of `child`.
    Supervisor {
        /// Worker process id.
        child: Pid,
    },
}

/// How a worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The worker called `exit` with this status: a deliberate stop.
    Exited(i32),
    /// The worker was killed by this signal: a crash.
    Signaled(i32),
}

impl WorkerExit {
    /// Returns `true` when the worker stopped on purpose.
    #[must_use]
    pub const fn is_deliberate_stop(self) -> bool {
        matches!(self, Self::Exited(_))
    }
}

/// Role taken by the current process under keepalive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// Forks and watches workers.
    Supervisor,
    /// Runs the daemon.
    Worker,
}

/// What the supervisor knows about its worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorState {
    role: Role,
    child: Option<Pid>,
    last_exit: Option<WorkerExit>,
    restarts: u64,
}

impl SupervisorState {
    const fn new() -> Self {
        Self {
            role: Role::Supervisor,
            child: None,
            last_exit: None,
            restarts: 0,
        }
    }

    /// Current role.
    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    /// Most recent worker.
    #[must_use]
    pub const fn child(&self) -> Option<Pid> {
        self.child
    }

    /// Exit of the most recent worker.
    #[must_use]
    pub const fn last_exit(&self) -> Option<WorkerExit> {
        self.last_exit
    }

    /// Number of workers restarted after a crash.
    #[must_use]
    pub const fn restarts(&self) -> u64 {
        self.restarts
    }
}

/// Result of [`supervise`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// The caller is a worker and should continue starting the daemon.
    Worker,
    /// The worker stopped deliberately; the supervisor exits with `code`.
    Stopped {
        /// Forwarded worker exit status.
        code: i32,
        /// Final supervisor state.
        state: SupervisorState,
    },
}

/// Process creation and exit observation.
pub trait ProcessSpawner: Send + Sync {
    /// Creates a worker process.
    ///
    /// # Errors
    ///
    /// Fails when the worker cannot be created.
    fn spawn(&self) -> Result<Spawned, ResourceError>;

    /// Blocks until `child` ends, forwarding termination signals to it.
    ///
    /// # Errors
    ///
    /// Fails when the worker cannot be waited for.
    fn wait(&self, child: Pid) -> Result<WorkerExit, ResourceError>;
}

/// Runs the supervisor loop until a worker stops deliberately.
///
/// Returns [`SupervisionOutcome::Worker`] in every worker process.
///
/// # Errors
///
/// Propagates spawn and wait failures.
pub fn supervise(spawner: &dyn ProcessSpawner) -> Result<SupervisionOutcome, ResourceError> {
    let mut state = SupervisorState::new();
    loop {
        let child = match spawner.spawn()? {
            Spawned::Worker => return Ok(SupervisionOutcome::Worker),
            Spawned::Supervisor { child } => child,
        };
        state.child = Some(child);
        info!(target: SUPERVISOR_TARGET, pid = child.as_raw(), "worker started");

        let exit = spawner.wait(child)?;
        state.last_exit = Some(exit);
        match exit {
            WorkerExit::Exited(code) => {
                info!(
                    target: SUPERVISOR_TARGET,
                    pid = child.as_raw(),
                    code,
                    "worker stopped; supervisor exiting"
                );
                return Ok(SupervisionOutcome::Stopped { code, state });
            }
            WorkerExit::Signaled(signal) => {
                state.restarts += 1;
                warn!(
                    target: SUPERVISOR_TARGET,
                    pid = child.as_raw(),
                    signal,
                    restarts = state.restarts,
                    "worker crashed; restarting"
                );
            }
        }
    }
}

/// Spawner built on `fork` and `waitpid`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ForkSpawner;

impl ForkSpawner {
    /// Builds a new spawner.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ProcessSpawner for ForkSpawner {
    fn spawn(&self) -> Result<Spawned, ResourceError> {
        // SAFETY: the supervisor forks before the monitor thread or the main
        // loop exist, so the child starts single-threaded.
        match unsafe { fork() }.map_err(|source| ResourceError::Fork { source })? {
            ForkResult::Child => Ok(Spawned::Worker),
            ForkResult::Parent { child } => Ok(Spawned::Supervisor { child }),
        }
    }

    fn wait(&self, child: Pid) -> Result<WorkerExit, ResourceError> {
        let mut forwarded = ForwardedSignals::register()?;
        loop {
            for raw in forwarded.signals.pending() {
                forward(child, raw);
            }
            match waitpid(child, Some(WaitPidFlag::WNOHANG)) {
                Ok(WaitStatus::Exited(_, code)) => return Ok(WorkerExit::Exited(code)),
                Ok(WaitStatus::Signaled(_, signal, _)) => {
                    return Ok(WorkerExit::Signaled(signal as i32));
                }
                Ok(_) | Err(Errno::EINTR) => thread::sleep(WAIT_POLL_INTERVAL),
                Err(source) => {
                    return Err(ResourceError::Wait {
                        pid: child.as_raw(),
                        source,
                    });
                }
            }
        }
    }
}

/// Signal registration held for one `wait`; dropping it unregisters.
struct ForwardedSignals {
    signals: Signals,
    handle: Handle,
}

impl ForwardedSignals {
    fn register() -> Result<Self, ResourceError> {
        let signals =
            Signals::new(FORWARDED_SIGNALS).map_err(|source| ResourceError::Signals { source })?;
        let handle = signals.handle();
        Ok(Self { signals, handle })
    }
}

impl Drop for ForwardedSignals {
    fn drop(&mut self) {
        self.handle.close();
    }
}

fn forward(child: Pid, raw: c_int) {
    let Ok(signal) = Signal::try_from(raw) else {
        return;
    };
    info!(
        target: SUPERVISOR_TARGET,
        pid = child.as_raw(),
        signal = %signal,
        "forwarding signal to worker"
    );
    if let Err(error) = kill(child, signal) {
        warn!(
            target: SUPERVISOR_TARGET,
            pid = child.as_raw(),
            error = %error,
            "failed to forward signal"
        );
    }
}
