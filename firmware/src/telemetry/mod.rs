//! Mirrors the sequencer's telemetry ring to defmt / stdout.
//!
//! The ring lives inside the sequencer; this side only remembers how far it
//! has printed so each record is emitted once per boot.

use payload_core::telemetry::{EventId, TelemetryPayload, TelemetryRecord, TelemetryRecorder};

/// Console cursor over a [`TelemetryRecorder`].
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Prints every record recorded since the last drain. Returns how many
    /// were printed.
    pub fn drain<const N: usize>(&mut self, recorder: &TelemetryRecorder<N>) -> usize {
        let mut emitted = 0;
        for record in recorder.since(self.cursor) {
            emit_record(record);
            emitted += 1;
        }
        self.cursor = recorder.next_event_id();
        emitted
    }

    pub const fn cursor(&self) -> EventId {
        self.cursor
    }
}

impl Default for TelemetryMirror {
    fn default() -> Self {
        Self::new()
    }
}

fn timestamp_ms(record: &TelemetryRecord) -> u64 {
    u64::try_from(record.timestamp.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(target_os = "none")]
fn emit_record(record: &TelemetryRecord) {
    use defmt::Display2Format;

    match record.details {
        TelemetryPayload::Storage(storage) => defmt::warn!(
            "telemetry:{} t={}ms {} backlog={} lost={}",
            record.id,
            timestamp_ms(record),
            Display2Format(&record.event),
            storage.backlog,
            storage.lost
        ),
        TelemetryPayload::Sensor(_) | TelemetryPayload::EventSource(_) => defmt::warn!(
            "telemetry:{} t={}ms {}",
            record.id,
            timestamp_ms(record),
            Display2Format(&record.event)
        ),
        _ => defmt::info!(
            "telemetry:{} t={}ms {}",
            record.id,
            timestamp_ms(record),
            Display2Format(&record.event)
        ),
    }
}

#[cfg(not(target_os = "none"))]
fn emit_record(record: &TelemetryRecord) {
    if let TelemetryPayload::Storage(storage) = record.details {
        println!(
            "telemetry:{} t={}ms {} backlog={} lost={}",
            record.id,
            timestamp_ms(record),
            record.event,
            storage.backlog,
            storage.lost
        );
    } else {
        println!(
            "telemetry:{} t={}ms {}",
            record.id,
            timestamp_ms(record),
            record.event
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use payload_core::telemetry::TelemetryEventKind;

    #[test]
    fn drain_emits_each_record_once() {
        let mut recorder: TelemetryRecorder<4> = TelemetryRecorder::new();
        let mut mirror = TelemetryMirror::new();

        recorder.record(
            TelemetryEventKind::StorageFault,
            TelemetryPayload::None,
            Duration::from_millis(5),
        );
        recorder.record(
            TelemetryEventKind::RecordsDropped,
            TelemetryPayload::None,
            Duration::from_millis(6),
        );
        assert_eq!(mirror.drain(&recorder), 2);
        assert_eq!(mirror.drain(&recorder), 0);

        recorder.record(
            TelemetryEventKind::Custom(7),
            TelemetryPayload::None,
            Duration::from_millis(9),
        );
        assert_eq!(mirror.drain(&recorder), 1);
        assert_eq!(mirror.cursor(), 3);
    }

    #[test]
    fn overwritten_records_are_skipped() {
        let mut recorder: TelemetryRecorder<2> = TelemetryRecorder::new();
        let mut mirror = TelemetryMirror::new();
        for code in 0..5 {
            recorder.record(
                TelemetryEventKind::Custom(code),
                TelemetryPayload::None,
                Duration::ZERO,
            );
        }
        // Only the two newest survive in the ring.
        assert_eq!(mirror.drain(&recorder), 2);
        assert_eq!(mirror.cursor(), 5);
    }
}
