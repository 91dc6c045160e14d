//! Test harness utilities for the lifecycle suites.

mod doubles;
mod harness;
mod journal;
mod reporter;

pub use doubles::{RecordingLog, RuntimeFaults, SLOW_QUERY, SpawnScript};
pub use harness::{Faults, Harness, LOG_FILE, PID_FILE};
pub use journal::Journal;
