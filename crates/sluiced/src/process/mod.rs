//! Process plumbing: daemonisation, account switching, pid file and limits.

mod daemonizer;
mod limits;
mod pidfile;

pub use daemonizer::{DaemonizeError, Daemonizer, SystemDaemonizer};
pub use limits::{FileLimit, SystemFileLimit};
pub use pidfile::PidFile;

pub(crate) const PROCESS_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::process");
