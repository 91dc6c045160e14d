//! Structured telemetry initialisation for the daemon.
//!
//! The subscriber is installed once by the binary. Its writer is a
//! [`LogRouter`] that sends output to stderr until the configured log file is
//! opened, and its level filter sits behind a reload layer so `log-level`
//! can take effect after the key-file has been read. Slow-query events skip
//! the level filter and go only to the slow-query log.

use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal, Write};
use std::os::fd::AsRawFd;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use once_cell::sync::OnceCell;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::{FilterExt, filter_fn};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Registry, fmt, reload};

use sluice_config::LogLevel;

use crate::crash;
use crate::errors::ResourceError;
use crate::slow_query::{SLOW_QUERY_TARGET, SlowQueryLayer, SlowQueryLog, SlowQuerySink};

static TELEMETRY: OnceCell<TelemetryHandle> = OnceCell::new();

/// Level used while options are parsed and plugins are loaded.
pub const STARTUP_LEVEL: LevelFilter = LevelFilter::INFO;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Control surface over the daemon log used by the orchestrator and the
/// main loop.
pub trait LogControl: Send + Sync {
    /// Directs output to `path`, or keeps it on stderr when `None`.
    ///
    /// # Errors
    ///
    /// Fails when the log file cannot be opened for appending.
    fn open(&self, path: Option<&Utf8Path>) -> Result<(), ResourceError>;

    /// Reopens the current log file after rotation.
    ///
    /// # Errors
    ///
    /// Fails when the log file cannot be reopened.
    fn reopen(&self) -> Result<(), ResourceError>;

    /// Applies the configured severity threshold.
    ///
    /// # Errors
    ///
    /// Fails when the filter cannot be swapped.
    fn set_level(&self, level: LogLevel) -> Result<(), ResourceError>;

    /// Flushes and closes the log file, returning output to stderr.
    fn close(&self);

    /// Routes slow-query events to `log` until it is detached.
    fn attach_slow_query(&self, log: SlowQueryLog);

    /// Stops routing slow-query events and hands back the attached log.
    fn detach_slow_query(&self) -> Option<SlowQueryLog>;
}

/// Maps a configured log level onto a `tracing` filter.
#[must_use]
pub const fn level_filter(level: LogLevel) -> LevelFilter {
    match level {
        LogLevel::Error | LogLevel::Critical => LevelFilter::ERROR,
        LogLevel::Warning => LevelFilter::WARN,
        LogLevel::Message | LogLevel::Info => LevelFilter::INFO,
        LogLevel::Debug => LevelFilter::DEBUG,
    }
}

#[derive(Debug, Default)]
enum Sink {
    #[default]
    Stderr,
    File {
        path: Utf8PathBuf,
        file: File,
    },
}

/// Switchable log destination implementing [`MakeWriter`].
///
/// The descriptor of the open log file is also where crash reports go.
#[derive(Debug, Clone, Default)]
pub struct LogRouter {
    sink: Arc<Mutex<Sink>>,
}

impl LogRouter {
    /// Creates a router writing to stderr.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Sink> {
        self.sink.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Appends to `path` from now on.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened.
    pub fn open_file(&self, path: &Utf8Path) -> Result<(), ResourceError> {
        let file = append(path)?;
        let mut sink = self.lock();
        crash::report_to(file.as_raw_fd());
        *sink = Sink::File {
            path: path.to_path_buf(),
            file,
        };
        Ok(())
    }

    /// Reopens the current file, leaving stderr untouched.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be reopened.
    pub fn reopen(&self) -> Result<(), ResourceError> {
        let mut sink = self.lock();
        if let Sink::File { path, file } = &mut *sink {
            let reopened = append(path)?;
            crash::report_to(reopened.as_raw_fd());
            *file = reopened;
        }
        Ok(())
    }

    /// Flushes the file and returns output to stderr.
    pub fn close(&self) {
        let mut sink = self.lock();
        if let Sink::File { file, .. } = &mut *sink {
            let _ = file.flush();
        }
        crash::report_to_stderr();
        *sink = Sink::Stderr;
    }

    /// Current log file, if output is not on stderr.
    #[must_use]
    pub fn path(&self) -> Option<Utf8PathBuf> {
        match &*self.lock() {
            Sink::Stderr => None,
            Sink::File { path, .. } => Some(path.clone()),
        }
    }
}

fn append(path: &Utf8Path) -> Result<File, ResourceError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| ResourceError::LogOpen {
            path: path.to_path_buf(),
            source,
        })
}

/// Writer handed out by [`LogRouter`] for a single event.
#[derive(Debug)]
pub struct RouterWriter {
    sink: Arc<Mutex<Sink>>,
}

impl Write for RouterWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *sink {
            Sink::Stderr => io::stderr().write(buf),
            Sink::File { file, .. } => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut sink = self.sink.lock().unwrap_or_else(PoisonError::into_inner);
        match &mut *sink {
            Sink::Stderr => io::stderr().flush(),
            Sink::File { file, .. } => file.flush(),
        }
    }
}

impl<'a> MakeWriter<'a> for LogRouter {
    type Writer = RouterWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RouterWriter {
            sink: Arc::clone(&self.sink),
        }
    }
}

/// Handle to the installed subscriber.
#[derive(Debug, Clone)]
pub struct TelemetryHandle {
    router: LogRouter,
    slow_query: SlowQuerySink,
    filter: reload::Handle<LevelFilter, Registry>,
}

impl TelemetryHandle {
    /// The router feeding the subscriber.
    #[must_use]
    pub const fn router(&self) -> &LogRouter {
        &self.router
    }

    /// The sink receiving slow-query events.
    #[must_use]
    pub const fn slow_query(&self) -> &SlowQuerySink {
        &self.slow_query
    }
}

impl LogControl for TelemetryHandle {
    fn open(&self, path: Option<&Utf8Path>) -> Result<(), ResourceError> {
        match path {
            Some(path) => self.router.open_file(path),
            None => Ok(()),
        }
    }

    fn reopen(&self) -> Result<(), ResourceError> {
        self.router.reopen()
    }

    fn set_level(&self, level: LogLevel) -> Result<(), ResourceError> {
        self.filter
            .modify(|filter| *filter = level_filter(level))
            .map_err(|error| ResourceError::LogLevel {
                message: error.to_string(),
            })
    }

    fn close(&self) {
        self.router.close();
    }

    fn attach_slow_query(&self, log: SlowQueryLog) {
        drop(self.slow_query.attach(log));
    }

    fn detach_slow_query(&self) -> Option<SlowQueryLog> {
        self.slow_query.detach()
    }
}

/// Installs the global subscriber on first use.
///
/// Repeated calls return a handle to the subscriber installed by the first.
///
/// # Errors
///
/// Fails when another global subscriber is already installed.
pub fn install() -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY.get_or_try_init(install_subscriber).cloned()
}

fn install_subscriber() -> Result<TelemetryHandle, TelemetryError> {
    let router = LogRouter::new();
    let slow_query = SlowQuerySink::new();
    let (level, handle) = reload::Layer::new(STARTUP_LEVEL);
    let main_log = level.and(filter_fn(|metadata| metadata.target() != SLOW_QUERY_TARGET));
    let output = fmt::layer()
        .with_writer(router.clone())
        .with_target(true)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        // Colour only on an interactive stderr; log files stay plain.
        .with_ansi(io::stderr().is_terminal())
        .with_timer(UtcTime::rfc_3339())
        .with_filter(main_log);
    tracing_subscriber::registry()
        .with(output)
        .with(SlowQueryLayer::new(slow_query.clone()))
        .try_init()?;
    Ok(TelemetryHandle {
        router,
        slow_query,
        filter: handle,
    })
}
