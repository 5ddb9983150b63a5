use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::num::NonZeroU32;
use std::path::Path;
use std::time::{Duration, Instant as HostInstant};

use crossterm::style::Stylize;
use payload_core::actuation::{ActuatorBank, ActuatorWriteError, LedId};
use payload_core::clock::{Hold, MissionClock};
use payload_core::events::timeline::build_timeline;
use payload_core::events::{EventCode, ScriptedEventSource, Timeline, TimelineEntry};
use payload_core::records::{LogRecord, RecordSink, StorageWriteError};
use payload_core::sampling::{SensorBank, SensorReadError, raw_for_psi};
use payload_core::sequencer::{MissionPhase, MissionProfile, MissionSequencer};
use payload_core::sequences::{ALL_ACTUATORS, ActuatorId, OutputLevel};
use payload_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

/// Matches the firmware loop delay.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Upper bound on ticks for one run; well past both fallback thresholds.
pub const MAX_TICKS: u32 = 10_000;

/// Coast start and end delivered on time.
pub fn nominal_timeline() -> Timeline {
    build_timeline(&[
        TimelineEntry::new(Duration::from_secs(50), EventCode::CoastStart),
        TimelineEntry::new(Duration::from_secs(120), EventCode::CoastEnd),
    ])
    .unwrap_or_default()
}

/// Coast end lands while the motor sequence is holding, so only the
/// fallback threshold ends the window.
pub fn missed_event_timeline() -> Timeline {
    build_timeline(&[
        TimelineEntry::new(Duration::from_secs(50), EventCode::CoastStart),
        TimelineEntry::new(Duration::from_secs(58), EventCode::CoastEnd),
    ])
    .unwrap_or_default()
}

pub struct RunConfig {
    pub profile: MissionProfile,
    pub timeline: Timeline,
    /// Fail every Nth sensor read across all channels.
    pub fail_every: Option<NonZeroU32>,
    pub max_ticks: u32,
    /// Style telemetry lines for a terminal.
    pub color: bool,
}

impl RunConfig {
    pub fn new(profile: MissionProfile, timeline: Timeline) -> Self {
        Self {
            profile,
            timeline,
            fail_every: None,
            max_ticks: MAX_TICKS,
            color: false,
        }
    }
}

#[derive(Debug)]
pub struct RunSummary {
    pub ticks: u32,
    pub phase: MissionPhase,
    pub written: u32,
    pub lost: u32,
    pub backlog: usize,
    pub events_delivered: usize,
    pub events_missed: usize,
    pub sensor_faults: u32,
}

/// Runs one mission to completion, printing telemetry as it is recorded.
pub fn run_mission<C, H, O>(
    config: &RunConfig,
    clock: &C,
    hold: H,
    sink: FileSink,
    out: &mut O,
) -> io::Result<RunSummary>
where
    C: MissionClock,
    H: Hold,
    O: Write,
{
    let events = ScriptedEventSource::new(clock, config.timeline.clone());
    let sensors = SimulatedSensors::new(clock, config.fail_every);
    let mut mission = MissionSequencer::new(
        config.profile,
        events,
        sensors,
        SimulatedActuators::new(),
        hold,
        sink,
    )
    .map_err(|error| io::Error::new(io::ErrorKind::InvalidInput, error.to_string()))?;

    let mut cursor = 0;
    let mut ticks = 0;
    while ticks < config.max_ticks && !mission.phase().is_terminal() {
        ticks += mission.run_until_complete(1, TICK_PERIOD);
        cursor = print_telemetry(out, mission.telemetry(), cursor, config.color)?;
    }

    let journal = mission.journal();
    Ok(RunSummary {
        ticks,
        phase: mission.phase(),
        written: journal.written(),
        lost: journal.lost(),
        backlog: journal.backlog_len(),
        events_delivered: mission.events().delivered(),
        events_missed: mission.events().missed(),
        sensor_faults: mission.sensors().faults,
    })
}

/// Writes records newer than `cursor`; returns the next cursor.
pub fn print_telemetry<O: Write>(
    out: &mut O,
    recorder: &TelemetryRecorder,
    cursor: EventId,
    color: bool,
) -> io::Result<EventId> {
    for record in recorder.since(cursor) {
        let line = describe(record);
        if color {
            writeln!(out, "{}", paint(record.event, line))?;
        } else {
            writeln!(out, "{line}")?;
        }
    }
    Ok(recorder.next_event_id())
}

fn describe(record: &TelemetryRecord) -> String {
    let head = format!(
        "[{:>9.3}s] #{:<4} {}",
        record.timestamp.as_secs_f64(),
        record.id,
        record.event
    );
    match record.details {
        TelemetryPayload::Transition(cause) => format!("{head} ({cause:?})"),
        TelemetryPayload::Sequence(sequence) => format!(
            "{head} {:?} in {}ms",
            sequence.outcome,
            sequence.duration.as_millis()
        ),
        TelemetryPayload::Sensor(error) => format!("{head} {error}"),
        TelemetryPayload::Storage(storage) => format!(
            "{head} {} backlog={} lost={}",
            storage.error, storage.backlog, storage.lost
        ),
        TelemetryPayload::EventSource(error) => format!("{head} {error}"),
        TelemetryPayload::Step(_) | TelemetryPayload::None => head,
    }
}

fn paint(event: TelemetryEventKind, line: String) -> String {
    match event {
        TelemetryEventKind::PhaseEntered(_) => line.green().bold().to_string(),
        TelemetryEventKind::SequenceAborted(_)
        | TelemetryEventKind::SensorFault(_)
        | TelemetryEventKind::StorageFault
        | TelemetryEventKind::RecordsDropped
        | TelemetryEventKind::EventSourceFault => line.red().to_string(),
        TelemetryEventKind::SequenceStarted(_)
        | TelemetryEventKind::SequenceFinished(_)
        | TelemetryEventKind::SequenceSkipped(_) => line.cyan().to_string(),
        TelemetryEventKind::ActuatorDriven(..) | TelemetryEventKind::Custom(_) => {
            line.dark_grey().to_string()
        }
    }
}

/// Smooth synthetic flight profile derived from mission time.
pub struct SimulatedSensors<'a, C> {
    clock: &'a C,
    fail_every: Option<NonZeroU32>,
    reads: u32,
    pub faults: u32,
}

impl<'a, C: MissionClock> SimulatedSensors<'a, C> {
    pub fn new(clock: &'a C, fail_every: Option<NonZeroU32>) -> Self {
        Self {
            clock,
            fail_every,
            reads: 0,
            faults: 0,
        }
    }

    fn begin_read(&mut self) -> Result<f32, SensorReadError> {
        self.reads = self.reads.wrapping_add(1);
        let due = self
            .fail_every
            .is_some_and(|every| self.reads % every.get() == 0);
        if due {
            self.faults += 1;
            return Err(SensorReadError::Bus);
        }
        Ok(self.clock.now().as_secs_f32())
    }
}

impl<C: MissionClock> SensorBank for SimulatedSensors<'_, C> {
    fn read_range(&mut self) -> Result<u16, SensorReadError> {
        self.begin_read()?;
        // Target drifts back and forth over 40 mm on a 20 s cycle.
        let step = (self.clock.now().as_millis() / 250) % 80;
        let offset = if step < 40 { step } else { 80 - step };
        Ok(80 + u16::try_from(offset).unwrap_or_default())
    }

    fn read_temperature(&mut self) -> Result<f32, SensorReadError> {
        let seconds = self.begin_read()?;
        Ok(21.5 - 0.02 * seconds)
    }

    fn read_pressure_outside(&mut self) -> Result<f32, SensorReadError> {
        let seconds = self.begin_read()?;
        Ok(1013.25 * (-seconds / 90.0).exp())
    }

    fn read_pressure_inside_raw(&mut self) -> Result<u16, SensorReadError> {
        let seconds = self.begin_read()?;
        Ok(raw_for_psi((seconds / 20.0).min(14.0)))
    }
}

/// Remembers every output level; optionally echoes changes.
pub struct SimulatedActuators {
    levels: [OutputLevel; ALL_ACTUATORS.len()],
    pub writes: u32,
}

impl SimulatedActuators {
    pub fn new() -> Self {
        let mut levels = [OutputLevel::Low; ALL_ACTUATORS.len()];
        for line in ALL_ACTUATORS {
            levels[line.id.as_index()] = line.idle;
        }
        Self { levels, writes: 0 }
    }

    pub fn level(&self, id: ActuatorId) -> OutputLevel {
        self.levels[id.as_index()]
    }

    fn write(&mut self, id: ActuatorId, high: bool) -> Result<(), ActuatorWriteError> {
        self.levels[id.as_index()] = OutputLevel::from_bool(high);
        self.writes += 1;
        Ok(())
    }
}

impl Default for SimulatedActuators {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorBank for SimulatedActuators {
    fn set_solenoid(&mut self, open: bool) -> Result<(), ActuatorWriteError> {
        self.write(ActuatorId::Solenoid, open)
    }

    fn set_motor(&mut self, running: bool) -> Result<(), ActuatorWriteError> {
        self.write(ActuatorId::Motor, running)
    }

    fn set_led(&mut self, led: LedId, on: bool) -> Result<(), ActuatorWriteError> {
        match led {
            LedId::Primary => self.write(ActuatorId::LedPrimary, on),
            LedId::Secondary => self.write(ActuatorId::LedSecondary, on),
        }
    }

    fn set_camera_trigger(&mut self, high: bool) -> Result<(), ActuatorWriteError> {
        self.write(ActuatorId::CameraTrigger, high)
    }
}

/// Append-only log file, flushed after every record.
pub struct FileSink {
    writer: BufWriter<File>,
    text: String,
}

impl FileSink {
    pub fn open(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            text: String::new(),
        })
    }

    /// Truncates `path` first, for reproducible captures.
    pub fn create(path: &Path) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        File::create(path)?;
        Self::open(path)
    }
}

impl RecordSink for FileSink {
    fn append_record(&mut self, record: &LogRecord) -> Result<(), StorageWriteError> {
        self.text.clear();
        record
            .write_to(&mut self.text)
            .map_err(|_| StorageWriteError::Io)?;
        self.writer
            .write_all(self.text.as_bytes())
            .and_then(|()| self.writer.flush())
            .map_err(classify)
    }
}

fn classify(error: io::Error) -> StorageWriteError {
    match error.kind() {
        io::ErrorKind::StorageFull => StorageWriteError::Full,
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied => StorageWriteError::NotReady,
        _ => StorageWriteError::Io,
    }
}

/// Real elapsed time since construction.
pub struct WallClock {
    start: HostInstant,
}

impl WallClock {
    pub fn start() -> Self {
        Self {
            start: HostInstant::now(),
        }
    }
}

impl MissionClock for WallClock {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Sleeps the thread through holds.
pub struct SleepHold;

impl Hold for SleepHold {
    fn hold(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}
