//! Slow-query log sink written next to the main log file.
//!
//! Events emitted on [`SLOW_QUERY_TARGET`] are routed by [`SlowQueryLayer`]
//! into whichever [`SlowQueryLog`] is attached to its [`SlowQuerySink`], and
//! are kept out of the main log.

use std::fmt::{self, Write as _};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use camino::{Utf8Path, Utf8PathBuf};
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, Layer};

/// Target whose events are written to the slow-query log.
pub const SLOW_QUERY_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::slow_query");

const SLOW_QUERY_SUFFIX: &str = ".slowquery.log";

/// Derives `<log-file>.slowquery.log`.
#[must_use]
pub fn slow_query_path(log_file: &Utf8Path) -> Utf8PathBuf {
    Utf8PathBuf::from(format!("{log_file}{SLOW_QUERY_SUFFIX}"))
}

/// Append-only slow-query log.
#[derive(Debug)]
pub struct SlowQueryLog {
    path: Utf8PathBuf,
    file: File,
    offset: UtcOffset,
}

impl SlowQueryLog {
    /// Opens the slow-query log belonging to `log_file`.
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be opened for appending.
    pub fn open(log_file: &Utf8Path) -> io::Result<Self> {
        let path = slow_query_path(log_file);
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
        Ok(Self { path, file, offset })
    }

    /// Location of the log.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Appends `entry` prefixed with the current local time.
    ///
    /// # Errors
    ///
    /// Fails when the entry cannot be written.
    pub fn record(&mut self, entry: &str) -> io::Result<()> {
        let now = OffsetDateTime::now_utc().to_offset(self.offset);
        self.record_at(now, entry)
    }

    fn record_at(&mut self, at: OffsetDateTime, entry: &str) -> io::Result<()> {
        let stamp = at
            .format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .map_err(io::Error::other)?;
        writeln!(self.file, "{stamp} {entry}")
    }

    /// Flushes buffered entries and closes the file.
    ///
    /// # Errors
    ///
    /// Fails when the final flush fails.
    pub fn close(mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// Shared slot holding the slow-query log currently in use.
#[derive(Debug, Clone, Default)]
pub struct SlowQuerySink {
    log: Arc<Mutex<Option<SlowQueryLog>>>,
}

impl SlowQuerySink {
    /// Creates an empty sink; events are dropped until a log is attached.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Option<SlowQueryLog>> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Routes entries to `log`, returning the log it replaces.
    pub fn attach(&self, log: SlowQueryLog) -> Option<SlowQueryLog> {
        self.lock().replace(log)
    }

    /// Stops routing entries and hands back the attached log.
    pub fn detach(&self) -> Option<SlowQueryLog> {
        self.lock().take()
    }

    /// Appends `entry` to the attached log. Returns `false` when no log is
    /// attached.
    ///
    /// # Errors
    ///
    /// Fails when the entry cannot be written.
    pub fn record(&self, entry: &str) -> io::Result<bool> {
        match self.lock().as_mut() {
            Some(log) => log.record(entry).map(|()| true),
            None => Ok(false),
        }
    }
}

/// Layer writing events on [`SLOW_QUERY_TARGET`] to a [`SlowQuerySink`].
#[derive(Debug, Clone)]
pub struct SlowQueryLayer {
    sink: SlowQuerySink,
}

impl SlowQueryLayer {
    /// Forwards slow-query events to `sink`.
    #[must_use]
    pub const fn new(sink: SlowQuerySink) -> Self {
        Self { sink }
    }
}

impl<S: Subscriber> Layer<S> for SlowQueryLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if event.metadata().target() != SLOW_QUERY_TARGET {
            return;
        }
        let mut entry = EntryVisitor::default();
        event.record(&mut entry);
        // A failed write must not emit another event from inside dispatch.
        let _ = self.sink.record(&entry.finish());
    }
}

/// Renders the message followed by `key=value` pairs.
#[derive(Default)]
struct EntryVisitor {
    message: String,
    fields: String,
}

impl EntryVisitor {
    fn finish(self) -> String {
        if self.fields.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.fields.trim_start().to_owned()
        } else {
            format!("{}{}", self.message, self.fields)
        }
    }
}

impl Visit for EntryVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={value}", field.name());
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{value:?}");
        } else {
            let _ = write!(self.fields, " {}={value:?}", field.name());
        }
    }
}
