use std::thread;
use std::time::Duration;

use nix::sys::signal::{SigHandler, Signal, signal};
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::Signals;
use tracing::{info, warn};

use super::{MainLoop, RUNTIME_TARGET, ShutdownFlag};
use crate::errors::RuntimeError;
use crate::telemetry::LogControl;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Main loop driven by process signals.
///
/// SIGTERM, SIGINT and SIGQUIT request shutdown; SIGHUP reopens the log
/// file for rotation. SIGPIPE is ignored while serving.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalMainLoop;

impl SignalMainLoop {
    /// Builds a new main loop.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl MainLoop for SignalMainLoop {
    fn run(&mut self, shutdown: &ShutdownFlag, log: &dyn LogControl) -> Result<(), RuntimeError> {
        // SAFETY: installs the ignore disposition; no handler code runs.
        if let Err(error) = unsafe { signal(Signal::SIGPIPE, SigHandler::SigIgn) } {
            warn!(target: RUNTIME_TARGET, error = %error, "failed to ignore SIGPIPE");
        }
        let mut signals = Signals::new([SIGTERM, SIGINT, SIGQUIT, SIGHUP])
            .map_err(|source| RuntimeError::Signals { source })?;
        info!(target: RUNTIME_TARGET, "main loop running");
        while !shutdown.is_requested() {
            for received in signals.pending() {
                if received == SIGHUP {
                    info!(target: RUNTIME_TARGET, "reopening log file");
                    if let Err(error) = log.reopen() {
                        warn!(target: RUNTIME_TARGET, error = %error, "failed to reopen log file");
                    }
                } else {
                    info!(target: RUNTIME_TARGET, signal = received, "shutdown signal received");
                    shutdown.request();
                }
            }
            if !shutdown.is_requested() {
                thread::sleep(POLL_INTERVAL);
            }
        }
        signals.handle().close();
        info!(target: RUNTIME_TARGET, "main loop finished");
        Ok(())
    }
}
