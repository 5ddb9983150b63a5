//! Parser for scripted flight timelines.
//!
//! One entry per line:
//!
//! ```text
//! # comment
//! 120s   coast-start
//! 302.5s coast-end   window=750ms
//! ```
//!
//! Durations take an `s` or `ms` suffix with up to three fractional digits.
//! Entries must be listed in non-decreasing time order.

use core::fmt;
use core::time::Duration;

use heapless::Vec;
use winnow::ascii::{digit1, space0, space1};
use winnow::combinator::{alt, opt, preceded};
use winnow::error::{ContextError, ErrMode};
use winnow::prelude::*;
use winnow::token::take_while;

use super::EventCode;
use super::scripted::{DEFAULT_EVENT_WINDOW, TimelineEntry};

/// Upper bound on scripted entries; a flight only has a handful of events.
pub const MAX_TIMELINE_ENTRIES: usize = 16;

/// Bounded, time-ordered list of scripted events.
pub type Timeline = Vec<TimelineEntry, MAX_TIMELINE_ENTRIES>;

type ParseResult<T> = Result<T, ErrMode<ContextError>>;

/// Why a timeline was rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimelineErrorKind {
    /// The line does not match `<duration> <event> [window=<duration>]`.
    Syntax,
    /// A valid entry was followed by unexpected text.
    TrailingInput,
    /// The entry fires earlier than the one before it.
    OutOfOrder,
    /// More than [`MAX_TIMELINE_ENTRIES`] entries.
    TooManyEntries,
}

/// Timeline rejection with the 1-based line (or entry) number.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimelineError {
    pub line: usize,
    pub kind: TimelineErrorKind,
}

impl TimelineError {
    #[must_use]
    pub const fn new(line: usize, kind: TimelineErrorKind) -> Self {
        Self { line, kind }
    }
}

impl fmt::Display for TimelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timeline line {}: {:?}", self.line, self.kind)
    }
}

/// Parses a complete timeline document.
///
/// # Errors
///
/// Returns the first offending line.
pub fn parse_timeline(text: &str) -> Result<Timeline, TimelineError> {
    let mut timeline = Timeline::new();
    for (index, raw) in text.lines().enumerate() {
        let line = raw.split_once('#').map_or(raw, |(body, _)| body).trim();
        if line.is_empty() {
            continue;
        }

        let entry = parse_entry(line).map_err(|kind| TimelineError::new(index + 1, kind))?;
        push_entry(&mut timeline, entry).map_err(|kind| TimelineError::new(index + 1, kind))?;
    }
    Ok(timeline)
}

/// Builds a timeline from in-memory entries, enforcing the same rules as the parser.
///
/// # Errors
///
/// Reports the 1-based position of the first entry that is out of order or over capacity.
pub fn build_timeline(entries: &[TimelineEntry]) -> Result<Timeline, TimelineError> {
    let mut timeline = Timeline::new();
    for (index, entry) in entries.iter().enumerate() {
        push_entry(&mut timeline, *entry).map_err(|kind| TimelineError::new(index + 1, kind))?;
    }
    Ok(timeline)
}

/// Parses a single non-empty, comment-free line.
///
/// # Errors
///
/// Returns [`TimelineErrorKind::Syntax`] or [`TimelineErrorKind::TrailingInput`].
pub fn parse_entry(line: &str) -> Result<TimelineEntry, TimelineErrorKind> {
    let mut input = line;
    match entry.parse_next(&mut input) {
        Ok(parsed) if input.is_empty() => Ok(parsed),
        Ok(_) => Err(TimelineErrorKind::TrailingInput),
        Err(_) => Err(TimelineErrorKind::Syntax),
    }
}

fn push_entry(timeline: &mut Timeline, entry: TimelineEntry) -> Result<(), TimelineErrorKind> {
    if timeline.last().is_some_and(|previous| entry.at < previous.at) {
        return Err(TimelineErrorKind::OutOfOrder);
    }
    timeline
        .push(entry)
        .map_err(|_| TimelineErrorKind::TooManyEntries)
}

fn entry(input: &mut &str) -> ParseResult<TimelineEntry> {
    (
        preceded(space0, duration),
        preceded(space1, event_code),
        opt(preceded((space1, "window="), duration)),
        space0,
    )
        .map(|(at, event, window, _)| {
            TimelineEntry::new(at, event).with_window(window.unwrap_or(DEFAULT_EVENT_WINDOW))
        })
        .parse_next(input)
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum TimeUnit {
    Seconds,
    Millis,
}

fn duration(input: &mut &str) -> ParseResult<Duration> {
    (
        digit1.verify_map(|digits: &str| digits.parse::<u64>().ok()),
        opt(preceded('.', take_while(1..=3, |c: char| c.is_ascii_digit()))),
        alt(("ms".value(TimeUnit::Millis), "s".value(TimeUnit::Seconds))),
    )
        .verify_map(|(whole, fraction, unit)| scale_duration(whole, fraction, unit))
        .parse_next(input)
}

fn event_code(input: &mut &str) -> ParseResult<EventCode> {
    take_while(1.., |c: char| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        .verify_map(EventCode::from_name)
        .parse_next(input)
}

fn scale_duration(whole: u64, fraction: Option<&str>, unit: TimeUnit) -> Option<Duration> {
    // Fraction is 0..=999 thousandths of the unit.
    let thousandths = match fraction {
        Some(digits) => {
            let value = digits.parse::<u64>().ok()?;
            let missing = 3 - u32::try_from(digits.len()).ok()?;
            value * 10u64.pow(missing)
        }
        None => 0,
    };

    match unit {
        TimeUnit::Seconds => {
            Duration::from_secs(whole).checked_add(Duration::from_millis(thousandths))
        }
        TimeUnit::Millis => {
            Duration::from_millis(whole).checked_add(Duration::from_micros(thousandths))
        }
    }
}
