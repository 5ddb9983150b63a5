#![allow(dead_code)]

use core::time::Duration;

use payload_core::actuation::{ActuatorBank, ActuatorWriteError, LedId};
use payload_core::clock::{ManualClock, ManualHold};
use payload_core::events::{ScriptedEventSource, TimelineEntry, timeline::build_timeline};
use payload_core::records::{LogRecord, RecordSink, StorageWriteError};
use payload_core::sampling::{SensorBank, SensorChannel, SensorReadError};
use payload_core::sequencer::{MissionProfile, MissionSequencer};
use payload_core::sequences::{ActuatorId, OutputLevel};

pub const TICK: Duration = Duration::from_millis(100);

pub type Mission<'a> = MissionSequencer<
    ScriptedEventSource<&'a ManualClock>,
    FakeSensors,
    RecordingActuators,
    ManualHold<'a>,
    MemorySink,
>;

pub fn secs(seconds: u64) -> Duration {
    Duration::from_secs(seconds)
}

pub fn mission<'a>(
    clock: &'a ManualClock,
    profile: MissionProfile,
    entries: &[TimelineEntry],
) -> Mission<'a> {
    let timeline = build_timeline(entries).expect("timeline fits");
    MissionSequencer::new(
        profile,
        ScriptedEventSource::new(clock, timeline),
        FakeSensors::default(),
        RecordingActuators::default(),
        ManualHold::new(clock),
        MemorySink::default(),
    )
    .expect("valid profile")
}

/// Fixed readings with per-channel fault injection.
#[derive(Debug)]
pub struct FakeSensors {
    pub range_mm: u16,
    pub temperature_c: f32,
    pub pressure_outside_hpa: f32,
    pub pressure_inside_raw: u16,
    pub faulted: Option<(SensorChannel, SensorReadError)>,
    pub reads: u32,
}

impl Default for FakeSensors {
    fn default() -> Self {
        Self {
            range_mm: 120,
            temperature_c: 21.5,
            pressure_outside_hpa: 1_013.25,
            pressure_inside_raw: 6_029,
            faulted: None,
            reads: 0,
        }
    }
}

impl FakeSensors {
    fn read<T>(&mut self, channel: SensorChannel, value: T) -> Result<T, SensorReadError> {
        self.reads += 1;
        match self.faulted {
            Some((faulted, error)) if faulted == channel => Err(error),
            _ => Ok(value),
        }
    }
}

impl SensorBank for FakeSensors {
    fn read_range(&mut self) -> Result<u16, SensorReadError> {
        self.read(SensorChannel::Range, self.range_mm)
    }

    fn read_temperature(&mut self) -> Result<f32, SensorReadError> {
        self.read(SensorChannel::Temperature, self.temperature_c)
    }

    fn read_pressure_outside(&mut self) -> Result<f32, SensorReadError> {
        self.read(SensorChannel::PressureOutside, self.pressure_outside_hpa)
    }

    fn read_pressure_inside_raw(&mut self) -> Result<u16, SensorReadError> {
        self.read(SensorChannel::PressureInside, self.pressure_inside_raw)
    }
}

/// Remembers every successful write and the level each output was left at.
#[derive(Debug, Default)]
pub struct RecordingActuators {
    pub writes: Vec<(ActuatorId, OutputLevel)>,
    pub fail_on: Option<(ActuatorId, OutputLevel)>,
}

impl RecordingActuators {
    pub fn level(&self, output: ActuatorId) -> Option<OutputLevel> {
        self.writes
            .iter()
            .rev()
            .find(|(id, _)| *id == output)
            .map(|(_, level)| *level)
    }

    pub fn count(&self, output: ActuatorId, level: OutputLevel) -> usize {
        self.writes
            .iter()
            .filter(|write| **write == (output, level))
            .count()
    }

    fn write(&mut self, output: ActuatorId, high: bool) -> Result<(), ActuatorWriteError> {
        let level = OutputLevel::from_bool(high);
        if self.fail_on == Some((output, level)) {
            return Err(ActuatorWriteError::Bus);
        }
        self.writes.push((output, level));
        Ok(())
    }
}

impl ActuatorBank for RecordingActuators {
    fn set_solenoid(&mut self, open: bool) -> Result<(), ActuatorWriteError> {
        self.write(ActuatorId::Solenoid, open)
    }

    fn set_motor(&mut self, running: bool) -> Result<(), ActuatorWriteError> {
        self.write(ActuatorId::Motor, running)
    }

    fn set_led(&mut self, led: LedId, on: bool) -> Result<(), ActuatorWriteError> {
        let output = match led {
            LedId::Primary => ActuatorId::LedPrimary,
            LedId::Secondary => ActuatorId::LedSecondary,
        };
        self.write(output, on)
    }

    fn set_camera_trigger(&mut self, high: bool) -> Result<(), ActuatorWriteError> {
        self.write(ActuatorId::CameraTrigger, high)
    }
}

/// In-memory sink that can be told to fail its next few appends.
#[derive(Debug, Default)]
pub struct MemorySink {
    pub records: Vec<LogRecord>,
    pub fail_next: u32,
    pub attempts: u32,
}

impl MemorySink {
    pub fn timestamps(&self) -> Vec<Duration> {
        self.records
            .iter()
            .map(|record| record.sample.timestamp)
            .collect()
    }
}

impl RecordSink for MemorySink {
    fn append_record(&mut self, record: &LogRecord) -> Result<(), StorageWriteError> {
        self.attempts += 1;
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(StorageWriteError::Io);
        }
        self.records.push(*record);
        Ok(())
    }
}
