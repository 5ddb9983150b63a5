//! Telemetry event catalog and fixed-capacity history ring.
//!
//! The sequencer records every phase change, output write, sequence outcome,
//! and collaborator fault here instead of logging directly. Firmware drains
//! the ring into defmt; the emulator prints it to the console. Event kinds
//! encode to compact numeric codes so they can cross a diagnostics link.

use core::{fmt, time::Duration};

use heapless::HistoryBuf;

use crate::actuation::SequenceOutcome;
use crate::events::EventSourceError;
use crate::records::StorageWriteError;
use crate::sampling::{SensorChannel, SensorReadError};
use crate::sequencer::{MissionPhase, TransitionCause};
use crate::sequences::{ActuationKind, ActuatorId, OutputLevel};

/// Identifier used when tracking emitted telemetry events.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 128;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    PhaseEntered(MissionPhase),
    ActuatorDriven(ActuatorId, OutputLevel),
    SequenceStarted(ActuationKind),
    SequenceFinished(ActuationKind),
    SequenceAborted(ActuationKind),
    /// A request was refused because the slot was already busy.
    SequenceSkipped(ActuationKind),
    SensorFault(SensorChannel),
    StorageFault,
    RecordsDropped,
    EventSourceFault,
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::PhaseEntered(phase) => write!(f, "phase-entered {phase}"),
            TelemetryEventKind::ActuatorDriven(id, level) => {
                write!(f, "actuator-driven {id}={level}")
            }
            TelemetryEventKind::SequenceStarted(kind) => write!(f, "sequence-started {kind}"),
            TelemetryEventKind::SequenceFinished(kind) => write!(f, "sequence-finished {kind}"),
            TelemetryEventKind::SequenceAborted(kind) => write!(f, "sequence-aborted {kind}"),
            TelemetryEventKind::SequenceSkipped(kind) => write!(f, "sequence-skipped {kind}"),
            TelemetryEventKind::SensorFault(channel) => write!(f, "sensor-fault {channel}"),
            TelemetryEventKind::StorageFault => f.write_str("storage-fault"),
            TelemetryEventKind::RecordsDropped => f.write_str("records-dropped"),
            TelemetryEventKind::EventSourceFault => f.write_str("event-source-fault"),
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const PHASE_BASE: u16 = 0x0000;
    const ACTUATOR_BASE: u16 = 0x0010;
    const SEQUENCE_STARTED_BASE: u16 = 0x0020;
    const SEQUENCE_FINISHED_BASE: u16 = 0x0024;
    const SEQUENCE_ABORTED_BASE: u16 = 0x0028;
    const SEQUENCE_SKIPPED_BASE: u16 = 0x002C;
    const SENSOR_FAULT_BASE: u16 = 0x0030;
    const STORAGE_FAULT_CODE: u16 = 0x0040;
    const RECORDS_DROPPED_CODE: u16 = 0x0041;
    const EVENT_SOURCE_FAULT_CODE: u16 = 0x0042;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::PhaseEntered(phase) => Self::PHASE_BASE + phase.as_index(),
            TelemetryEventKind::ActuatorDriven(id, level) => {
                // Five outputs, two levels each: 0x10..0x1A.
                Self::ACTUATOR_BASE + (id.as_index() as u16) * 2 + level.as_bit()
            }
            TelemetryEventKind::SequenceStarted(kind) => {
                Self::SEQUENCE_STARTED_BASE + kind.as_index()
            }
            TelemetryEventKind::SequenceFinished(kind) => {
                Self::SEQUENCE_FINISHED_BASE + kind.as_index()
            }
            TelemetryEventKind::SequenceAborted(kind) => {
                Self::SEQUENCE_ABORTED_BASE + kind.as_index()
            }
            TelemetryEventKind::SequenceSkipped(kind) => {
                Self::SEQUENCE_SKIPPED_BASE + kind.as_index()
            }
            TelemetryEventKind::SensorFault(channel) => {
                Self::SENSOR_FAULT_BASE + channel.as_index()
            }
            TelemetryEventKind::StorageFault => Self::STORAGE_FAULT_CODE,
            TelemetryEventKind::RecordsDropped => Self::RECORDS_DROPPED_CODE,
            TelemetryEventKind::EventSourceFault => Self::EVENT_SOURCE_FAULT_CODE,
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        let decoded = match code {
            Self::STORAGE_FAULT_CODE => Some(TelemetryEventKind::StorageFault),
            Self::RECORDS_DROPPED_CODE => Some(TelemetryEventKind::RecordsDropped),
            Self::EVENT_SOURCE_FAULT_CODE => Some(TelemetryEventKind::EventSourceFault),
            value if (Self::PHASE_BASE..Self::ACTUATOR_BASE).contains(&value) => {
                MissionPhase::from_index(value - Self::PHASE_BASE)
                    .map(TelemetryEventKind::PhaseEntered)
            }
            value if (Self::ACTUATOR_BASE..Self::SEQUENCE_STARTED_BASE).contains(&value) => {
                let offset = value - Self::ACTUATOR_BASE;
                ActuatorId::from_index(usize::from(offset / 2)).map(|id| {
                    TelemetryEventKind::ActuatorDriven(id, OutputLevel::from_bool(offset % 2 == 1))
                })
            }
            value
                if (Self::SEQUENCE_STARTED_BASE..Self::SEQUENCE_FINISHED_BASE).contains(&value) =>
            {
                ActuationKind::from_index(value - Self::SEQUENCE_STARTED_BASE)
                    .map(TelemetryEventKind::SequenceStarted)
            }
            value
                if (Self::SEQUENCE_FINISHED_BASE..Self::SEQUENCE_ABORTED_BASE).contains(&value) =>
            {
                ActuationKind::from_index(value - Self::SEQUENCE_FINISHED_BASE)
                    .map(TelemetryEventKind::SequenceFinished)
            }
            value
                if (Self::SEQUENCE_ABORTED_BASE..Self::SEQUENCE_SKIPPED_BASE).contains(&value) =>
            {
                ActuationKind::from_index(value - Self::SEQUENCE_ABORTED_BASE)
                    .map(TelemetryEventKind::SequenceAborted)
            }
            value if (Self::SEQUENCE_SKIPPED_BASE..Self::SENSOR_FAULT_BASE).contains(&value) => {
                ActuationKind::from_index(value - Self::SEQUENCE_SKIPPED_BASE)
                    .map(TelemetryEventKind::SequenceSkipped)
            }
            value if (Self::SENSOR_FAULT_BASE..Self::STORAGE_FAULT_CODE).contains(&value) => {
                SensorChannel::from_index(value - Self::SENSOR_FAULT_BASE)
                    .map(TelemetryEventKind::SensorFault)
            }
            _ => None,
        };
        decoded.unwrap_or(TelemetryEventKind::Custom(code))
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Why a phase transition fired.
    Transition(TransitionCause),
    /// Position of an output write within its sequence.
    Step(StepTelemetry),
    /// Summary of a finished or aborted sequence.
    Sequence(SequenceTelemetry),
    Sensor(SensorReadError),
    Storage(StorageTelemetry),
    EventSource(EventSourceError),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StepTelemetry {
    /// Hold time accumulated before this write.
    pub offset: Duration,
}

impl StepTelemetry {
    #[must_use]
    pub const fn new(offset: Duration) -> Self {
        Self { offset }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SequenceTelemetry {
    pub outcome: SequenceOutcome,
    pub duration: Duration,
}

impl SequenceTelemetry {
    #[must_use]
    pub const fn new(outcome: SequenceOutcome, duration: Duration) -> Self {
        Self { outcome, duration }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct StorageTelemetry {
    pub error: StorageWriteError,
    /// Records waiting in the journal backlog after this failure.
    pub backlog: u8,
    /// Total records lost so far.
    pub lost: u32,
}

impl StorageTelemetry {
    #[must_use]
    pub fn new(error: StorageWriteError, backlog: usize, lost: u32) -> Self {
        Self {
            error,
            backlog: truncate_depth(backlog),
            lost,
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    /// Mission time the event occurred.
    pub timestamp: Duration,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.ring.oldest_ordered()
    }

    /// Records with an id at or after `cursor`, oldest first.
    ///
    /// Callers keep [`TelemetryRecorder::next_event_id`] as the cursor to
    /// drain only what is new since their last visit.
    pub fn since(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> + '_ {
        self.oldest_first().filter(move |record| record.id >= cursor)
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Id the next recorded event will receive.
    pub const fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Counts stored records matching `event`.
    pub fn count(&self, event: TelemetryEventKind) -> usize {
        self.oldest_first()
            .filter(|record| record.event == event)
            .count()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: Duration,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

fn truncate_depth(depth: usize) -> u8 {
    u8::try_from(depth).unwrap_or(u8::MAX)
}
