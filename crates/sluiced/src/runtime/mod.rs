//! Seams around the external engine: the core runtime, its main loop and
//! its background monitor.
//!
//! The monitor keeps firing until it observes the [`ShutdownFlag`], so the
//! flag must be set before anything the monitor references is released.

mod main_loop;
mod monitor;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use sluice_config::{RawConfig, ResolvedConfig};

use crate::errors::RuntimeError;
use crate::telemetry::LogControl;

pub use main_loop::SignalMainLoop;
pub use monitor::TickingMonitor;

pub(crate) const RUNTIME_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::runtime");

/// Interval between background monitor ticks.
pub const MONITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Cloneable flag telling the main loop and the monitor to stop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag(Arc<AtomicBool>);

impl ShutdownFlag {
    /// Creates an unset flag.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the flag. Returns `true` when it was not already set.
    pub fn request(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    /// Returns `true` once shutdown was requested.
    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// The external event loop.
pub trait MainLoop: Send {
    /// Serves until `shutdown` is set.
    ///
    /// # Errors
    ///
    /// Fails when the loop cannot run.
    fn run(&mut self, shutdown: &ShutdownFlag, log: &dyn LogControl) -> Result<(), RuntimeError>;
}

/// Periodic work running beside the main loop.
pub trait BackgroundMonitor: Send {
    /// Starts the monitor.
    ///
    /// # Errors
    ///
    /// Fails when the monitor cannot start.
    fn start(
        &mut self,
        config: Arc<ResolvedConfig>,
        shutdown: ShutdownFlag,
    ) -> Result<(), RuntimeError>;

    /// Waits for the monitor to observe the shutdown flag and finish.
    ///
    /// # Errors
    ///
    /// Fails when the monitor terminated abnormally.
    fn stop(&mut self) -> Result<(), RuntimeError>;

    /// Returns `true` between a successful start and stop.
    fn is_running(&self) -> bool;
}

/// Builds the core runtime from the merged options.
pub trait RuntimeFactory: Send + Sync {
    /// Creates the runtime.
    ///
    /// # Errors
    ///
    /// Fails when the runtime cannot be constructed.
    fn create(&self, raw: &RawConfig) -> Result<CoreRuntime, RuntimeError>;
}

/// The main loop, its monitor and the flag they share.
pub struct CoreRuntime {
    shutdown: ShutdownFlag,
    main_loop: Box<dyn MainLoop>,
    monitor: Box<dyn BackgroundMonitor>,
}

impl CoreRuntime {
    /// Bundles a main loop and a monitor behind a fresh shutdown flag.
    #[must_use]
    pub fn new(main_loop: Box<dyn MainLoop>, monitor: Box<dyn BackgroundMonitor>) -> Self {
        Self {
            shutdown: ShutdownFlag::new(),
            main_loop,
            monitor,
        }
    }

    /// The flag shared with the main loop and the monitor.
    #[must_use]
    pub const fn shutdown_flag(&self) -> &ShutdownFlag {
        &self.shutdown
    }

    /// Sets the shutdown flag.
    pub fn request_shutdown(&self) -> bool {
        self.shutdown.request()
    }

    /// Starts the background monitor.
    ///
    /// # Errors
    ///
    /// Propagates the monitor's start failure.
    pub fn start_monitor(&mut self, config: Arc<ResolvedConfig>) -> Result<(), RuntimeError> {
        self.monitor.start(config, self.shutdown.clone())
    }

    /// Runs the main loop until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Propagates the main loop's failure.
    pub fn run_main_loop(&mut self, log: &dyn LogControl) -> Result<(), RuntimeError> {
        self.main_loop.run(&self.shutdown, log)
    }

    /// Returns `true` while the monitor runs.
    #[must_use]
    pub fn monitor_running(&self) -> bool {
        self.monitor.is_running()
    }

    /// Sets the shutdown flag and stops the monitor if it runs. Returns
    /// whether a running monitor was stopped.
    ///
    /// # Errors
    ///
    /// Propagates the monitor's stop failure.
    pub fn stop_monitor(&mut self) -> Result<bool, RuntimeError> {
        if !self.monitor.is_running() {
            return Ok(false);
        }
        self.shutdown.request();
        self.monitor.stop()?;
        Ok(true)
    }
}

impl std::fmt::Debug for CoreRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreRuntime")
            .field("shutdown", &self.shutdown.is_requested())
            .field("monitor_running", &self.monitor.is_running())
            .finish_non_exhaustive()
    }
}

/// Factory for the production main loop and monitor.
#[derive(Debug, Clone, Copy)]
pub struct SystemRuntimeFactory {
    interval: Duration,
}

impl SystemRuntimeFactory {
    /// Builds a factory whose monitor ticks every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Default for SystemRuntimeFactory {
    fn default() -> Self {
        Self::new(MONITOR_INTERVAL)
    }
}

impl RuntimeFactory for SystemRuntimeFactory {
    fn create(&self, raw: &RawConfig) -> Result<CoreRuntime, RuntimeError> {
        tracing::debug!(
            target: RUNTIME_TARGET,
            disable_threads = raw.disable_threads,
            interval_ms = self.interval.as_millis(),
            "creating core runtime"
        );
        Ok(CoreRuntime::new(
            Box::new(SignalMainLoop::new()),
            Box::new(TickingMonitor::new(self.interval)),
        ))
    }
}
