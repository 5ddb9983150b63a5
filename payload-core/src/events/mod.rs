//! Flight-event feed abstractions.
//!
//! The sequencer polls an [`EventSource`] exactly once at the start of every
//! tick. Event codes are not sticky: a source reports each event once and
//! returns [`EventCode::None`] on every later poll until something new arrives.

use core::{convert::TryFrom, fmt, time::Duration};

pub mod scripted;
pub mod timeline;

pub use scripted::{DEFAULT_EVENT_WINDOW, ScriptedEventSource, TimelineEntry};
pub use timeline::{MAX_TIMELINE_ENTRIES, Timeline, TimelineError, TimelineErrorKind};

/// Event codes delivered by the flight-event source.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum EventCode {
    #[default]
    None,
    CoastStart,
    CoastEnd,
}

impl EventCode {
    const NONE_CODE: u8 = 0x00;
    const COAST_START_CODE: u8 = 0x01;
    const COAST_END_CODE: u8 = 0x02;

    /// Wire discriminant for the event.
    #[must_use]
    pub const fn to_raw(self) -> u8 {
        match self {
            EventCode::None => Self::NONE_CODE,
            EventCode::CoastStart => Self::COAST_START_CODE,
            EventCode::CoastEnd => Self::COAST_END_CODE,
        }
    }

    /// Lenient decode: unknown discriminants read as [`EventCode::None`].
    #[must_use]
    pub const fn from_raw(code: u8) -> Self {
        match code {
            Self::COAST_START_CODE => EventCode::CoastStart,
            Self::COAST_END_CODE => EventCode::CoastEnd,
            _ => EventCode::None,
        }
    }

    /// Returns `true` for anything other than [`EventCode::None`].
    #[must_use]
    pub const fn is_some(self) -> bool {
        !matches!(self, EventCode::None)
    }

    /// Case-insensitive lookup by the names used in timeline files.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        [EventCode::None, EventCode::CoastStart, EventCode::CoastEnd]
            .into_iter()
            .find(|code| code.name().eq_ignore_ascii_case(name))
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EventCode::None => "none",
            EventCode::CoastStart => "coast-start",
            EventCode::CoastEnd => "coast-end",
        }
    }
}

/// Strict decode used by transports that must flag corrupt bytes.
impl TryFrom<u8> for EventCode {
    type Error = EventSourceError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            Self::NONE_CODE | Self::COAST_START_CODE | Self::COAST_END_CODE => {
                Ok(Self::from_raw(code))
            }
            _ => Err(EventSourceError::Malformed),
        }
    }
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Failure reported by an event source. Never fatal to the mission.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EventSourceError {
    /// The transport is down or was never brought up.
    Disconnected,
    /// Bytes arrived that do not decode to a known event.
    Malformed,
}

impl fmt::Display for EventSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Non-blocking flight-event feed plus the mission clock it is timed against.
pub trait EventSource {
    /// Returns the newest event since the previous poll, or [`EventCode::None`].
    ///
    /// # Errors
    ///
    /// Returns [`EventSourceError`] when the feed is unavailable or corrupt.
    fn poll(&mut self) -> Result<EventCode, EventSourceError>;

    /// Monotonic elapsed mission time.
    fn elapsed(&self) -> Duration;
}

impl<E: EventSource + ?Sized> EventSource for &mut E {
    fn poll(&mut self) -> Result<EventCode, EventSourceError> {
        (**self).poll()
    }

    fn elapsed(&self) -> Duration {
        (**self).elapsed()
    }
}
