//! Log record layout and the append-only journal in front of storage.
//!
//! Every record renders as one comma-separated line:
//!
//! ```text
//! <elapsed s>, <range mm>, <temperature C>, <outside hPa>, <inside psi>
//! ```
//!
//! The baseline record is prefixed by a header block naming the columns.
//! Disabled channels render as [`NO_DATA`] and faulted ones as [`FAULTED`].

use core::fmt::{self, Write};

use heapless::{Deque, String};

use crate::sampling::{Reading, SensorSample};

/// Placeholder for a channel that was switched off.
pub const NO_DATA: &str = "--";
/// Placeholder for a channel whose read failed.
pub const FAULTED: &str = "ERR";

pub const HEADER_TITLE: &str = "Payload mission data";
pub const COLUMN_HEADER: &str =
    "Time (s),Distance (mm),Temperature (C),Pressure Outside (hPa),Pressure Inside (psi)";

/// Capacity of a rendered record, header included.
pub const MAX_RECORD_TEXT: usize = 256;

pub type RecordText = String<MAX_RECORD_TEXT>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RecordKind {
    /// Captured once on entry to the active phase.
    Baseline,
    /// Emitted on the decimated cadence.
    Periodic,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LogRecord {
    pub kind: RecordKind,
    pub sample: SensorSample,
}

impl LogRecord {
    #[must_use]
    pub const fn baseline(sample: SensorSample) -> Self {
        Self {
            kind: RecordKind::Baseline,
            sample,
        }
    }

    #[must_use]
    pub const fn periodic(sample: SensorSample) -> Self {
        Self {
            kind: RecordKind::Periodic,
            sample,
        }
    }

    /// Writes the record (and header, for a baseline) to `out`.
    ///
    /// # Errors
    ///
    /// Propagates the writer's [`fmt::Error`].
    pub fn write_to<W: Write + ?Sized>(&self, out: &mut W) -> fmt::Result {
        if self.kind == RecordKind::Baseline {
            write!(out, "\n\n{HEADER_TITLE}\n\n{COLUMN_HEADER}\n")?;
        }

        let sample = &self.sample;
        write!(out, "{:.3}, ", sample.timestamp.as_secs_f64())?;
        write_field(out, &sample.range_mm, |out, mm| write!(out, "{mm}"))?;
        out.write_str(", ")?;
        write_field(out, &sample.temperature_c, |out, c| write!(out, "{c:.2}"))?;
        out.write_str(", ")?;
        write_field(out, &sample.pressure_outside_hpa, |out, hpa| {
            write!(out, "{hpa:.2}")
        })?;
        out.write_str(", ")?;
        write_field(out, &sample.pressure_inside_psi, |out, psi| {
            write!(out, "{psi:.3}")
        })?;
        out.write_char('\n')
    }

    /// Renders into a fixed-capacity buffer.
    ///
    /// # Errors
    ///
    /// Returns [`fmt::Error`] if the text exceeds [`MAX_RECORD_TEXT`].
    pub fn render(&self) -> Result<RecordText, fmt::Error> {
        let mut text = RecordText::new();
        self.write_to(&mut text)?;
        Ok(text)
    }
}

fn write_field<W, T>(
    out: &mut W,
    reading: &Reading<T>,
    value: impl FnOnce(&mut W, &T) -> fmt::Result,
) -> fmt::Result
where
    W: Write + ?Sized,
{
    match reading {
        Reading::Value(inner) => value(out, inner),
        Reading::Disabled => out.write_str(NO_DATA),
        Reading::Faulted(_) => out.write_str(FAULTED),
    }
}

/// Durable storage failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StorageWriteError {
    /// Low-level write or sync failed.
    Io,
    /// The medium or file has no room left.
    Full,
    /// The medium is not mounted or the file is not open.
    NotReady,
}

impl fmt::Display for StorageWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Append-only durable sink. Records land in call order and are never read back.
pub trait RecordSink {
    /// Appends one record.
    ///
    /// # Errors
    ///
    /// Returns [`StorageWriteError`] when the record could not be persisted.
    fn append_record(&mut self, record: &LogRecord) -> Result<(), StorageWriteError>;
}

impl<W: RecordSink + ?Sized> RecordSink for &mut W {
    fn append_record(&mut self, record: &LogRecord) -> Result<(), StorageWriteError> {
        (**self).append_record(record)
    }
}

/// What happened to a record handed to [`RecordJournal::append`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum AppendOutcome {
    Written,
    /// Held in the backlog for a later retry. `displaced` is set when the
    /// oldest backlog entry had to be dropped to make room.
    Deferred {
        error: StorageWriteError,
        displaced: bool,
    },
    /// No backlog space at all; the record is gone.
    Dropped(StorageWriteError),
}

/// Default number of records held while storage is failing.
pub const DEFAULT_BACKLOG: usize = 8;

/// Ordered front-end to a [`RecordSink`] with a bounded retry backlog.
///
/// Deferred records are always flushed before anything newer, so the sink
/// sees records in the order they were appended even across outages.
#[derive(Debug)]
pub struct RecordJournal<W, const BACKLOG: usize = DEFAULT_BACKLOG> {
    sink: W,
    backlog: Deque<LogRecord, BACKLOG>,
    written: u32,
    lost: u32,
}

impl<W: RecordSink, const BACKLOG: usize> RecordJournal<W, BACKLOG> {
    #[must_use]
    pub const fn new(sink: W) -> Self {
        Self {
            sink,
            backlog: Deque::new(),
            written: 0,
            lost: 0,
        }
    }

    /// Records accepted by the sink.
    #[must_use]
    pub const fn written(&self) -> u32 {
        self.written
    }

    /// Records discarded because the backlog overflowed.
    #[must_use]
    pub const fn lost(&self) -> u32 {
        self.lost
    }

    /// Records waiting for storage to recover.
    #[must_use]
    pub fn backlog_len(&self) -> usize {
        self.backlog.len()
    }

    #[must_use]
    pub const fn sink(&self) -> &W {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn into_sink(self) -> W {
        self.sink
    }

    /// Retries deferred records oldest-first.
    ///
    /// # Errors
    ///
    /// Stops at, and returns, the first failure; the failing record stays queued.
    pub fn flush_backlog(&mut self) -> Result<(), StorageWriteError> {
        while let Some(front) = self.backlog.front() {
            self.sink.append_record(front)?;
            self.backlog.pop_front();
            self.written = self.written.saturating_add(1);
        }
        Ok(())
    }

    /// Appends `record` behind any backlog.
    pub fn append(&mut self, record: LogRecord) -> AppendOutcome {
        if let Err(error) = self.flush_backlog() {
            return self.defer(record, error);
        }
        match self.sink.append_record(&record) {
            Ok(()) => {
                self.written = self.written.saturating_add(1);
                AppendOutcome::Written
            }
            Err(error) => self.defer(record, error),
        }
    }

    fn defer(&mut self, record: LogRecord, error: StorageWriteError) -> AppendOutcome {
        let displaced = self.backlog.is_full() && self.backlog.pop_front().is_some();
        if displaced {
            self.lost = self.lost.saturating_add(1);
        }
        match self.backlog.push_back(record) {
            Ok(()) => AppendOutcome::Deferred { error, displaced },
            Err(_) => {
                self.lost = self.lost.saturating_add(1);
                AppendOutcome::Dropped(error)
            }
        }
    }
}
