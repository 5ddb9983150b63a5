//! Flight-event intake between the UART task and the mission task.
//!
//! The UART side decodes every received byte strictly and pushes meaningful
//! codes into [`EventQueue`]. The mission task drains one code per tick through
//! [`QueuedEventSource`], so events that land while a sequence is holding the
//! mission task wait in the queue instead of being overwritten.

use core::time::Duration;

use embassy_sync::channel::{Channel, Receiver, Sender, TryReceiveError};
#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;
use payload_core::clock::MissionClock;
use payload_core::events::{EventCode, EventSource, EventSourceError};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

/// Depth of the queue between the UART task and the mission task.
pub const EVENT_QUEUE_DEPTH: usize = 8;

#[cfg(target_os = "none")]
type EventMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
type EventMutex = NoopRawMutex;

pub type EventQueue = Channel<EventMutex, EventCode, EVENT_QUEUE_DEPTH>;
pub type EventSender<'a> = Sender<'a, EventMutex, EventCode, EVENT_QUEUE_DEPTH>;
pub type EventReceiver<'a> = Receiver<'a, EventMutex, EventCode, EVENT_QUEUE_DEPTH>;

/// Counters shared by the intake task and the mission task.
pub struct IntakeCounters {
    dropped: AtomicU32,
    malformed: AtomicU32,
    link_fault: AtomicBool,
}

impl IntakeCounters {
    pub const fn new() -> Self {
        Self {
            dropped: AtomicU32::new(0),
            malformed: AtomicU32::new(0),
            link_fault: AtomicBool::new(false),
        }
    }

    /// Events discarded because the queue was full.
    pub fn dropped(&self) -> u32 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Bytes that did not decode to a known event code.
    pub fn malformed(&self) -> u32 {
        self.malformed.load(Ordering::Relaxed)
    }

    /// Flags a transport failure for the mission task to report.
    pub fn raise_link_fault(&self) {
        self.link_fault.store(true, Ordering::Relaxed);
    }

    /// Returns and clears the pending transport failure.
    pub fn take_fault(&self) -> bool {
        self.link_fault.swap(false, Ordering::Relaxed)
    }
}

impl Default for IntakeCounters {
    fn default() -> Self {
        Self::new()
    }
}

/// Decodes a chunk of received bytes. Returns how many events were queued.
pub fn ingest(bytes: &[u8], sender: &EventSender<'_>, counters: &IntakeCounters) -> usize {
    let mut queued = 0;
    for byte in bytes {
        match EventCode::try_from(*byte) {
            Ok(EventCode::None) => {}
            Ok(code) => {
                if sender.try_send(code).is_ok() {
                    queued += 1;
                } else {
                    counters.dropped.fetch_add(1, Ordering::Relaxed);
                }
            }
            Err(_) => {
                counters.malformed.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
    queued
}

/// [`EventSource`] over the intake queue, timed against a mission clock.
pub struct QueuedEventSource<'a, C> {
    receiver: EventReceiver<'a>,
    counters: &'a IntakeCounters,
    clock: C,
}

impl<'a, C: MissionClock> QueuedEventSource<'a, C> {
    pub fn new(receiver: EventReceiver<'a>, counters: &'a IntakeCounters, clock: C) -> Self {
        Self {
            receiver,
            counters,
            clock,
        }
    }
}

impl<C: MissionClock> EventSource for QueuedEventSource<'_, C> {
    fn poll(&mut self) -> Result<EventCode, EventSourceError> {
        if self.counters.take_fault() {
            return Err(EventSourceError::Disconnected);
        }
        match self.receiver.try_receive() {
            Ok(code) => Ok(code),
            Err(TryReceiveError::Empty) => Ok(EventCode::None),
        }
    }

    fn elapsed(&self) -> Duration {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payload_core::clock::ManualClock;

    #[test]
    fn bytes_decode_strictly_and_skip_idle() {
        let queue = EventQueue::new();
        let counters = IntakeCounters::new();

        let queued = ingest(&[0x00, 0x01, 0x7F, 0x02, 0x00], &queue.sender(), &counters);
        assert_eq!(queued, 2);
        assert_eq!(counters.malformed(), 1);

        let clock = ManualClock::new();
        let mut source = QueuedEventSource::new(queue.receiver(), &counters, &clock);
        assert_eq!(source.poll(), Ok(EventCode::CoastStart));
        assert_eq!(source.poll(), Ok(EventCode::CoastEnd));
        assert_eq!(source.poll(), Ok(EventCode::None));
    }

    #[test]
    fn full_queue_counts_drops() {
        let queue = EventQueue::new();
        let counters = IntakeCounters::new();
        let burst = [0x01; EVENT_QUEUE_DEPTH + 3];

        assert_eq!(
            ingest(&burst, &queue.sender(), &counters),
            EVENT_QUEUE_DEPTH
        );
        assert_eq!(counters.dropped(), 3);
    }

    #[test]
    fn link_fault_surfaces_once_then_queue_resumes() {
        let queue = EventQueue::new();
        let counters = IntakeCounters::new();
        ingest(&[0x02], &queue.sender(), &counters);
        counters.raise_link_fault();

        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(1_250));
        let mut source = QueuedEventSource::new(queue.receiver(), &counters, &clock);
        assert_eq!(source.poll(), Err(EventSourceError::Disconnected));
        assert_eq!(source.poll(), Ok(EventCode::CoastEnd));
        assert_eq!(source.elapsed(), Duration::from_millis(1_250));
    }
}
