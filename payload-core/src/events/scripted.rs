//! Timeline-driven event source for tests and the host emulator.
//!
//! Each entry is visible for a short window after it fires, the same way the
//! flight simulator's event stream goes stale after 1.5 s of silence. A poll
//! that lands inside the window reports the event once; a poll that only
//! happens after the window closed (because the loop was stuck in a hold)
//! misses it for good.

use core::time::Duration;

use super::{EventCode, EventSource, EventSourceError, Timeline};
use crate::clock::MissionClock;

/// How long an event stays observable after it fires.
pub const DEFAULT_EVENT_WINDOW: Duration = Duration::from_millis(1_500);

/// One scripted event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimelineEntry {
    pub at: Duration,
    pub event: EventCode,
    pub window: Duration,
}

impl TimelineEntry {
    /// Entry using [`DEFAULT_EVENT_WINDOW`].
    #[must_use]
    pub const fn new(at: Duration, event: EventCode) -> Self {
        Self {
            at,
            event,
            window: DEFAULT_EVENT_WINDOW,
        }
    }

    #[must_use]
    pub const fn with_window(mut self, window: Duration) -> Self {
        self.window = window;
        self
    }

    /// Returns `true` while `now` sits inside `[at, at + window)`.
    #[must_use]
    pub fn visible_at(&self, now: Duration) -> bool {
        now >= self.at && now < self.at.saturating_add(self.window)
    }
}

/// Replays a [`Timeline`] against a [`MissionClock`].
#[derive(Debug)]
pub struct ScriptedEventSource<C> {
    clock: C,
    timeline: Timeline,
    cursor: usize,
    delivered: usize,
    missed: usize,
    polls: u32,
    fail_polls: u32,
}

impl<C: MissionClock> ScriptedEventSource<C> {
    #[must_use]
    pub fn new(clock: C, timeline: Timeline) -> Self {
        Self {
            clock,
            timeline,
            cursor: 0,
            delivered: 0,
            missed: 0,
            polls: 0,
            fail_polls: 0,
        }
    }

    /// Source that never reports an event.
    #[must_use]
    pub fn silent(clock: C) -> Self {
        Self::new(clock, Timeline::new())
    }

    /// Makes the next `count` polls fail with [`EventSourceError::Disconnected`].
    #[must_use]
    pub fn with_failed_polls(mut self, count: u32) -> Self {
        self.fail_polls = count;
        self
    }

    /// Entries reported to the caller.
    #[must_use]
    pub const fn delivered(&self) -> usize {
        self.delivered
    }

    /// Entries whose window closed before any poll observed them.
    #[must_use]
    pub const fn missed(&self) -> usize {
        self.missed
    }

    /// Number of polls issued so far, including failed ones.
    #[must_use]
    pub const fn polls(&self) -> u32 {
        self.polls
    }

    /// Entries not yet delivered or missed.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.timeline.len() - self.cursor
    }
}

impl<C: MissionClock> EventSource for ScriptedEventSource<C> {
    fn poll(&mut self) -> Result<EventCode, EventSourceError> {
        self.polls = self.polls.saturating_add(1);
        if self.fail_polls > 0 {
            self.fail_polls -= 1;
            return Err(EventSourceError::Disconnected);
        }

        let now = self.clock.now();
        while let Some(entry) = self.timeline.get(self.cursor) {
            if now < entry.at {
                break;
            }
            self.cursor += 1;
            if entry.visible_at(now) {
                self.delivered += 1;
                return Ok(entry.event);
            }
            self.missed += 1;
        }

        Ok(EventCode::None)
    }

    fn elapsed(&self) -> Duration {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::events::timeline::build_timeline;

    fn source<'a>(
        clock: &'a ManualClock,
        entries: &[TimelineEntry],
    ) -> ScriptedEventSource<&'a ManualClock> {
        ScriptedEventSource::new(clock, build_timeline(entries).expect("timeline"))
    }

    #[test]
    fn reports_event_once_inside_window() {
        let clock = ManualClock::new();
        let mut events = source(
            &clock,
            &[TimelineEntry::new(Duration::from_secs(2), EventCode::CoastStart)],
        );

        assert_eq!(events.poll(), Ok(EventCode::None));
        clock.advance(Duration::from_millis(2_200));
        assert_eq!(events.poll(), Ok(EventCode::CoastStart));
        assert_eq!(events.poll(), Ok(EventCode::None));
        assert_eq!(events.delivered(), 1);
        assert_eq!(events.remaining(), 0);
    }

    #[test]
    fn event_expires_when_poll_arrives_late() {
        let clock = ManualClock::new();
        let mut events = source(
            &clock,
            &[TimelineEntry::new(Duration::from_secs(2), EventCode::CoastEnd)],
        );

        clock.advance(Duration::from_secs(18));
        assert_eq!(events.poll(), Ok(EventCode::None));
        assert_eq!(events.missed(), 1);
        assert_eq!(events.delivered(), 0);
    }

    #[test]
    fn simultaneous_entries_surface_on_consecutive_polls() {
        let clock = ManualClock::new();
        let mut events = source(
            &clock,
            &[
                TimelineEntry::new(Duration::from_secs(1), EventCode::CoastStart),
                TimelineEntry::new(Duration::from_secs(1), EventCode::CoastEnd)
                    .with_window(Duration::from_secs(5)),
            ],
        );

        clock.advance(Duration::from_secs(1));
        assert_eq!(events.poll(), Ok(EventCode::CoastStart));
        clock.advance(Duration::from_secs(2));
        assert_eq!(events.poll(), Ok(EventCode::CoastEnd));
    }

    #[test]
    fn injected_failures_precede_normal_polling() {
        let clock = ManualClock::new();
        let mut events = ScriptedEventSource::silent(&clock).with_failed_polls(2);

        assert_eq!(events.poll(), Err(EventSourceError::Disconnected));
        assert_eq!(events.poll(), Err(EventSourceError::Disconnected));
        assert_eq!(events.poll(), Ok(EventCode::None));
        assert_eq!(events.polls(), 3);
    }
}
