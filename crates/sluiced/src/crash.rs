//! Fatal signal handler that logs a bounded call stack before aborting.
//!
//! The handler captures at most [`MAX_FRAMES`] instruction pointers into a
//! stack array, formats each frame into a stack buffer and writes it with a
//! raw `write(2)` to the descriptor published through [`report_to`]. The
//! fault path takes no lock and does not allocate. Installation is skipped
//! when the process runs under a memory instrumentation tool, which installs
//! its own handler.

use std::ffi::{OsStr, OsString, c_int};
use std::fmt::{self, Write as _};
use std::os::fd::{BorrowedFd, RawFd};
use std::sync::atomic::{AtomicI32, Ordering};

use nix::libc::STDERR_FILENO;
use nix::sys::signal::{SaFlags, SigAction, SigHandler, SigSet, Signal, sigaction};
use nix::unistd;
use tracing::{info, warn};

use crate::errors::ResourceError;

const CRASH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::crash");

/// Deepest call stack logged on a crash.
pub const MAX_FRAMES: usize = 16;

/// Signal the handler is installed for.
pub const FATAL_SIGNAL: Signal = Signal::SIGSEGV;

const INSTRUMENTATION_MARKERS: [&str; 6] = [
    "vgpreload",
    "libasan",
    "libtsan",
    "libmsan",
    "liblsan",
    "libubsan",
];

const CRASH_HEADER: &[u8] = b"sluiced: fatal signal received, aborting\n";
const STACK_HEADER: &[u8] = b"sluiced: call stack follows\n";

static REPORT_FD: AtomicI32 = AtomicI32::new(STDERR_FILENO);

/// Directs crash reports to `fd`.
///
/// The descriptor must stay open until it is replaced by a later call or by
/// [`report_to_stderr`].
pub fn report_to(fd: RawFd) {
    REPORT_FD.store(fd, Ordering::Release);
}

/// Directs crash reports back to standard error.
pub fn report_to_stderr() {
    report_to(STDERR_FILENO);
}

/// Installed handler state; restoring it reinstates the previous
/// disposition exactly once.
pub trait HandlerGuard: Send {
    /// Restores the previous disposition. Returns `false` when it was
    /// already restored.
    fn restore(&mut self) -> bool;
}

/// Installs the fatal signal handler.
pub trait FaultHandler: Send + Sync {
    /// Installs the handler, returning `None` when installation is skipped.
    ///
    /// # Errors
    ///
    /// Fails when the signal disposition cannot be changed.
    fn install(&self) -> Result<Option<Box<dyn HandlerGuard>>, ResourceError>;
}

/// Returns `true` when `LD_PRELOAD` names valgrind or a sanitizer runtime.
#[must_use]
pub fn instrumentation_detected(ld_preload: Option<&OsStr>) -> bool {
    ld_preload
        .map(OsStr::to_string_lossy)
        .is_some_and(|preload| {
            INSTRUMENTATION_MARKERS
                .iter()
                .any(|marker| preload.contains(marker))
        })
}

/// Production handler for [`FATAL_SIGNAL`].
#[derive(Debug, Clone, Default)]
pub struct CrashHandler {
    ld_preload: Option<OsString>,
}

impl CrashHandler {
    /// Builds a handler that inspects the current `LD_PRELOAD`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("LD_PRELOAD"))
    }

    /// Builds a handler for an explicit `LD_PRELOAD` value.
    #[must_use]
    pub const fn new(ld_preload: Option<OsString>) -> Self {
        Self { ld_preload }
    }
}

impl FaultHandler for CrashHandler {
    fn install(&self) -> Result<Option<Box<dyn HandlerGuard>>, ResourceError> {
        if instrumentation_detected(self.ld_preload.as_deref()) {
            info!(
                target: CRASH_TARGET,
                "memory instrumentation detected; crash handler not installed"
            );
            return Ok(None);
        }
        let action = SigAction::new(
            SigHandler::Handler(on_fatal_signal),
            SaFlags::empty(),
            SigSet::empty(),
        );
        // SAFETY: the handler only walks the stack into fixed-size buffers,
        // writes them with write(2) and aborts.
        let previous = unsafe { sigaction(FATAL_SIGNAL, &action) }
            .map_err(|source| ResourceError::CrashHandler { source })?;
        info!(
            target: CRASH_TARGET,
            signal = %FATAL_SIGNAL,
            "crash handler installed"
        );
        Ok(Some(Box::new(CrashGuard {
            previous: Some(previous),
        })))
    }
}

/// Restores the disposition that preceded [`CrashHandler::install`].
#[derive(Debug)]
pub struct CrashGuard {
    previous: Option<SigAction>,
}

impl HandlerGuard for CrashGuard {
    fn restore(&mut self) -> bool {
        let Some(previous) = self.previous.take() else {
            return false;
        };
        // SAFETY: reinstates the disposition returned by the earlier call.
        if let Err(error) = unsafe { sigaction(FATAL_SIGNAL, &previous) } {
            warn!(
                target: CRASH_TARGET,
                error = %error,
                "failed to restore default crash disposition"
            );
        }
        true
    }
}

impl Drop for CrashGuard {
    fn drop(&mut self) {
        self.restore();
    }
}

/// Fixed-capacity line buffer for one stack frame.
struct FrameLine {
    buf: [u8; 48],
    len: usize,
}

impl FrameLine {
    const fn new() -> Self {
        Self {
            buf: [0; 48],
            len: 0,
        }
    }

    fn as_bytes(&self) -> &[u8] {
        self.buf.get(..self.len).unwrap_or_default()
    }

    fn as_str(&self) -> &str {
        std::str::from_utf8(self.as_bytes()).unwrap_or("")
    }
}

impl fmt::Write for FrameLine {
    fn write_str(&mut self, text: &str) -> fmt::Result {
        let end = self.len + text.len();
        let slot = self.buf.get_mut(self.len..end).ok_or(fmt::Error)?;
        slot.copy_from_slice(text.as_bytes());
        self.len = end;
        Ok(())
    }
}

fn format_frame(line: &mut FrameLine, index: usize, address: usize) -> fmt::Result {
    writeln!(line, "#{index:02} {address:#018x}")
}

fn emit(fd: BorrowedFd<'_>, bytes: &[u8]) {
    // Nothing is left to report a failed write to.
    let _ = unistd::write(fd, bytes);
}

/// Writes the crash header followed by one line per frame.
fn write_report(fd: BorrowedFd<'_>, frames: &[usize]) {
    emit(fd, CRASH_HEADER);
    emit(fd, STACK_HEADER);
    for (index, address) in frames.iter().enumerate() {
        let mut line = FrameLine::new();
        if format_frame(&mut line, index, *address).is_ok() {
            emit(fd, line.as_bytes());
        }
    }
}

extern "C" fn on_fatal_signal(_signal: c_int) {
    // SAFETY: `report_to` callers keep the published descriptor open.
    let fd = unsafe { BorrowedFd::borrow_raw(REPORT_FD.load(Ordering::Acquire)) };
    let mut frames = [0_usize; MAX_FRAMES];
    let mut depth = 0;
    // SAFETY: the process is about to abort; no other thread is expected to
    // unwind concurrently.
    unsafe {
        backtrace::trace_unsynchronized(|frame| match frames.get_mut(depth) {
            Some(slot) => {
                *slot = frame.ip() as usize;
                depth += 1;
                depth < MAX_FRAMES
            }
            None => false,
        });
    }
    write_report(fd, frames.get(..depth).unwrap_or_default());
    std::process::abort();
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Seek, SeekFrom};
    use std::os::fd::AsFd;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(None, false)]
    #[case(Some(""), false)]
    #[case(Some("/usr/lib/libjemalloc.so"), false)]
    #[case(Some("/usr/lib/valgrind/vgpreload_memcheck-amd64-linux.so"), true)]
    #[case(Some("/usr/lib/x86_64-linux-gnu/libasan.so.8"), true)]
    #[case(Some("libfoo.so:/usr/lib/libtsan.so.2"), true)]
    fn instrumentation_is_detected_from_preload(
        #[case] preload: Option<&str>,
        #[case] expected: bool,
    ) {
        assert_eq!(instrumentation_detected(preload.map(OsStr::new)), expected);
    }

    #[rstest]
    fn instrumented_process_skips_installation() {
        let handler = CrashHandler::new(Some(OsString::from("vgpreload_memcheck.so")));
        let guard = handler.install().expect("install");
        assert!(guard.is_none());
    }

    #[rstest]
    fn guard_restores_exactly_once() {
        let mut guard = CrashHandler::new(None)
            .install()
            .expect("install")
            .expect("handler installed");
        assert!(guard.restore());
        assert!(!guard.restore());
    }

    #[rstest]
    fn frames_are_formatted_without_allocating() {
        let mut line = FrameLine::new();
        format_frame(&mut line, 3, 0x7f00_dead_beef).expect("format frame");
        assert_eq!(line.as_str(), "#03 0x00007f00deadbeef\n");
    }

    fn report(frames: &[usize]) -> String {
        let mut file = tempfile::tempfile().expect("temp file");
        write_report(file.as_fd(), frames);
        let mut text = String::new();
        file.seek(SeekFrom::Start(0)).expect("rewind");
        file.read_to_string(&mut text).expect("read report");
        text
    }

    #[rstest]
    fn report_lists_every_frame_after_the_header() {
        let text = report(&[0x1000, 0x2000]);
        assert_eq!(
            text,
            "sluiced: fatal signal received, aborting\n\
             sluiced: call stack follows\n\
             #00 0x0000000000001000\n\
             #01 0x0000000000002000\n"
        );
    }

    #[rstest]
    fn empty_stack_still_writes_both_headers() {
        assert_eq!(
            report(&[]),
            "sluiced: fatal signal received, aborting\n\
             sluiced: call stack follows\n"
        );
    }

    #[rstest]
    fn overlong_frames_are_rejected() {
        let mut line = FrameLine::new();
        let long = "x".repeat(64);
        assert!(line.write_str(&long).is_err());
        assert_eq!(line.as_str(), "");
    }
}
