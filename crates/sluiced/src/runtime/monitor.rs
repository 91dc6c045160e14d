use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use sluice_config::ResolvedConfig;
use tracing::debug;

use super::{BackgroundMonitor, RUNTIME_TARGET, ShutdownFlag};
use crate::errors::RuntimeError;

const SLICE: Duration = Duration::from_millis(20);

/// Monitor thread that ticks at a fixed interval until shutdown.
#[derive(Debug)]
pub struct TickingMonitor {
    interval: Duration,
    handle: Option<JoinHandle<u64>>,
    ticks: u64,
}

impl TickingMonitor {
    /// Builds a monitor ticking every `interval`.
    #[must_use]
    pub const fn new(interval: Duration) -> Self {
        Self {
            interval,
            handle: None,
            ticks: 0,
        }
    }

    /// Ticks completed by the last stopped run.
    #[must_use]
    pub const fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl BackgroundMonitor for TickingMonitor {
    fn start(
        &mut self,
        config: Arc<ResolvedConfig>,
        shutdown: ShutdownFlag,
    ) -> Result<(), RuntimeError> {
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("sluiced-monitor".to_owned())
            .spawn(move || run(&config, &shutdown, interval))
            .map_err(|source| RuntimeError::MonitorStart { source })?;
        self.handle = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RuntimeError> {
        let Some(handle) = self.handle.take() else {
            return Ok(());
        };
        self.ticks = handle.join().map_err(|_| RuntimeError::MonitorPanicked)?;
        debug!(target: RUNTIME_TARGET, ticks = self.ticks, "background monitor stopped");
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.handle.is_some()
    }
}

fn run(config: &ResolvedConfig, shutdown: &ShutdownFlag, interval: Duration) -> u64 {
    let mut ticks = 0;
    let mut next = Instant::now() + interval;
    while !shutdown.is_requested() {
        if Instant::now() >= next {
            ticks += 1;
            next += interval;
            if config.replica_delay.check {
                debug!(
                    target: RUNTIME_TARGET,
                    down_secs = config.replica_delay.down_secs,
                    recover_secs = config.replica_delay.recover_secs,
                    "replica lag check due"
                );
            }
        }
        thread::sleep(SLICE.min(interval));
    }
    ticks
}
