//! Mission phase state machine and the per-tick control discipline.
//!
//! The mission moves through `AwaitingWindow -> Active -> Complete` exactly
//! once. Each transition fires on its flight event or, failing that, on an
//! elapsed-time fallback. Every [`MissionSequencer::tick`] runs the same fixed
//! order of operations:
//!
//! 1. poll the event source (once) and read elapsed time,
//! 2. evaluate at most one phase transition and schedule its side effects,
//! 3. run any pending actuation sequence to completion, holds included,
//! 4. recompute the enable flags and bring the LEDs in line with them,
//! 5. hand the tick to the decimated logger.
//!
//! Collaborator failures are absorbed inside the tick and surface only as
//! telemetry, log placeholders, or aborted sequences.

use core::{fmt, time::Duration};

use crate::actuation::{ActuationSequence, ActuatorBank, SequenceOutcome, drive};
use crate::clock::Hold;
use crate::events::{EventCode, EventSource};
use crate::records::{AppendOutcome, DEFAULT_BACKLOG, LogRecord, RecordJournal, RecordSink};
use crate::sampling::{ChannelEnables, DecimatedLogger, SensorBank, SensorSample};
use crate::sequences::{
    ActuationTemplate, ActuatorId, CAMERA_PARK_TEMPLATE, CAMERA_SHUTTER_TEMPLATE,
    MOTOR_SOLENOID_TEMPLATE, OutputLevel,
};
use crate::telemetry::{
    StorageTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};

pub mod profile;

pub use profile::{MissionProfile, ProfileError};

/// Mission stage. Only ever advances.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum MissionPhase {
    #[default]
    AwaitingWindow,
    Active,
    Complete,
}

impl MissionPhase {
    #[must_use]
    pub const fn as_index(self) -> u16 {
        match self {
            MissionPhase::AwaitingWindow => 0,
            MissionPhase::Active => 1,
            MissionPhase::Complete => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(MissionPhase::AwaitingWindow),
            1 => Some(MissionPhase::Active),
            2 => Some(MissionPhase::Complete),
            _ => None,
        }
    }

    /// Returns `true` once no further mission work may happen.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, MissionPhase::Complete)
    }
}

impl fmt::Display for MissionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissionPhase::AwaitingWindow => f.write_str("awaiting-window"),
            MissionPhase::Active => f.write_str("active"),
            MissionPhase::Complete => f.write_str("complete"),
        }
    }
}

/// What made a transition fire.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TransitionCause {
    Event(EventCode),
    /// The elapsed-time threshold was reached without the event.
    Fallback,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct PhaseTransition {
    pub from: MissionPhase,
    pub to: MissionPhase,
    pub cause: TransitionCause,
}

/// Pure transition rule. At most one step per call; `Complete` never moves.
#[must_use]
pub fn evaluate_transition(
    phase: MissionPhase,
    event: EventCode,
    elapsed: Duration,
    profile: &MissionProfile,
) -> Option<PhaseTransition> {
    let (to, trigger, threshold) = match phase {
        MissionPhase::AwaitingWindow => (
            MissionPhase::Active,
            EventCode::CoastStart,
            profile.phase_start,
        ),
        MissionPhase::Active => (MissionPhase::Complete, EventCode::CoastEnd, profile.phase_end),
        MissionPhase::Complete => return None,
    };

    let cause = if event == trigger {
        TransitionCause::Event(event)
    } else if elapsed >= threshold {
        TransitionCause::Fallback
    } else {
        return None;
    };

    Some(PhaseTransition {
        from: phase,
        to,
        cause,
    })
}

/// Sampling and indicator enables derived from the phase.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct MissionFlags {
    pub sampling: ChannelEnables,
    pub leds: bool,
    pub camera: bool,
}

impl MissionFlags {
    /// Everything is on while `Active` and off otherwise.
    #[must_use]
    pub const fn for_phase(phase: MissionPhase) -> Self {
        match phase {
            MissionPhase::Active => Self {
                sampling: ChannelEnables::ALL,
                leds: true,
                camera: true,
            },
            MissionPhase::AwaitingWindow | MissionPhase::Complete => Self {
                sampling: ChannelEnables::NONE,
                leds: false,
                camera: false,
            },
        }
    }
}

/// Everything the sequencer mutates, in one explicit value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SequencerState {
    pub phase: MissionPhase,
    /// Set the first time the baseline record is issued; never cleared.
    pub baseline_written: bool,
    /// Loop iteration counter, starting at 0.
    pub tick: u32,
    pub flags: MissionFlags,
    /// LED level last driven successfully, if any.
    pub leds_driven: Option<bool>,
    pub motor: ActuationSequence,
    pub camera: ActuationSequence,
}

impl SequencerState {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            phase: MissionPhase::AwaitingWindow,
            baseline_written: false,
            tick: 0,
            flags: MissionFlags::for_phase(MissionPhase::AwaitingWindow),
            leds_driven: None,
            motor: ActuationSequence::new(),
            camera: ActuationSequence::new(),
        }
    }
}

/// Summary of one [`MissionSequencer::tick`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickReport {
    pub tick: u32,
    /// Elapsed time read at the start of the tick.
    pub elapsed: Duration,
    pub event: EventCode,
    pub transition: Option<PhaseTransition>,
    pub camera: Option<SequenceOutcome>,
    pub motor: Option<SequenceOutcome>,
    pub logged: Option<AppendOutcome>,
    /// Phase after the tick.
    pub phase: MissionPhase,
    /// `true` when the mission was already complete. Only the storage backlog
    /// is retried on such ticks.
    pub idle: bool,
}

impl TickReport {
    const fn idle(tick: u32, elapsed: Duration, phase: MissionPhase) -> Self {
        Self {
            tick,
            elapsed,
            event: EventCode::None,
            transition: None,
            camera: None,
            motor: None,
            logged: None,
            phase,
            idle: true,
        }
    }
}

/// Drives a mission against its collaborators, one tick at a time.
pub struct MissionSequencer<E, S, A, H, W, const BACKLOG: usize = DEFAULT_BACKLOG> {
    profile: MissionProfile,
    events: E,
    sensors: S,
    actuators: A,
    hold: H,
    journal: RecordJournal<W, BACKLOG>,
    logger: DecimatedLogger,
    state: SequencerState,
    telemetry: TelemetryRecorder,
}

impl<E, S, A, H, W> MissionSequencer<E, S, A, H, W>
where
    E: EventSource,
    S: SensorBank,
    A: ActuatorBank,
    H: Hold,
    W: RecordSink,
{
    /// Builds a sequencer with the default storage backlog.
    ///
    /// # Errors
    ///
    /// Rejects a profile that fails [`MissionProfile::validate`].
    pub fn new(
        profile: MissionProfile,
        events: E,
        sensors: S,
        actuators: A,
        hold: H,
        sink: W,
    ) -> Result<Self, ProfileError> {
        Self::with_backlog(profile, events, sensors, actuators, hold, sink)
    }
}

impl<E, S, A, H, W, const BACKLOG: usize> MissionSequencer<E, S, A, H, W, BACKLOG>
where
    E: EventSource,
    S: SensorBank,
    A: ActuatorBank,
    H: Hold,
    W: RecordSink,
{
    /// Builds a sequencer holding up to `BACKLOG` records through storage outages.
    ///
    /// # Errors
    ///
    /// Rejects a profile that fails [`MissionProfile::validate`].
    pub fn with_backlog(
        profile: MissionProfile,
        events: E,
        sensors: S,
        actuators: A,
        hold: H,
        sink: W,
    ) -> Result<Self, ProfileError> {
        profile.validate()?;
        Ok(Self {
            profile,
            events,
            sensors,
            actuators,
            hold,
            journal: RecordJournal::new(sink),
            logger: DecimatedLogger::new(profile.decimation),
            state: SequencerState::new(),
            telemetry: TelemetryRecorder::new(),
        })
    }

    /// Replaces the sequencer state, e.g. to resume from a synthetic snapshot.
    #[must_use]
    pub fn with_state(mut self, state: SequencerState) -> Self {
        self.state = state;
        self
    }

    #[must_use]
    pub const fn profile(&self) -> &MissionProfile {
        &self.profile
    }

    #[must_use]
    pub const fn state(&self) -> &SequencerState {
        &self.state
    }

    #[must_use]
    pub const fn phase(&self) -> MissionPhase {
        self.state.phase
    }

    #[must_use]
    pub const fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    #[must_use]
    pub const fn journal(&self) -> &RecordJournal<W, BACKLOG> {
        &self.journal
    }

    #[must_use]
    pub const fn logger(&self) -> &DecimatedLogger {
        &self.logger
    }

    #[must_use]
    pub const fn events(&self) -> &E {
        &self.events
    }

    #[must_use]
    pub const fn sensors(&self) -> &S {
        &self.sensors
    }

    #[must_use]
    pub const fn actuators(&self) -> &A {
        &self.actuators
    }

    pub fn sensors_mut(&mut self) -> &mut S {
        &mut self.sensors
    }

    pub fn actuators_mut(&mut self) -> &mut A {
        &mut self.actuators
    }

    pub fn sink_mut(&mut self) -> &mut W {
        self.journal.sink_mut()
    }

    /// Runs one control-loop iteration.
    pub fn tick(&mut self) -> TickReport {
        let tick = self.state.tick;
        if self.state.phase.is_terminal() {
            let elapsed = self.events.elapsed();
            self.retry_backlog(elapsed);
            return TickReport::idle(tick, elapsed, self.state.phase);
        }

        let event = self.poll_event();
        let elapsed = self.events.elapsed();

        let transition = evaluate_transition(self.state.phase, event, elapsed, &self.profile);
        if let Some(transition) = transition {
            self.enter_phase(transition, elapsed);
        }

        let camera = self.state.camera.run_pending(
            &mut self.actuators,
            &mut self.hold,
            &mut self.telemetry,
            self.events.elapsed(),
        );
        let motor = self.state.motor.run_pending(
            &mut self.actuators,
            &mut self.hold,
            &mut self.telemetry,
            self.events.elapsed(),
        );

        self.state.flags = MissionFlags::for_phase(self.state.phase);
        self.sync_leds();
        if self.profile.camera_retrigger && self.state.flags.camera {
            // Runs next tick; a park request filed on completion replaces it.
            self.state.camera.request(&CAMERA_SHUTTER_TEMPLATE);
        }

        let logged = self.log_if_due(tick);
        self.state.tick = tick.wrapping_add(1);

        TickReport {
            tick,
            elapsed,
            event,
            transition,
            camera,
            motor,
            logged,
            phase: self.state.phase,
            idle: false,
        }
    }

    /// Ticks until the mission completes or `max_ticks` have run, holding for
    /// `period` between ticks. Returns the number of ticks run.
    pub fn run_until_complete(&mut self, max_ticks: u32, period: Duration) -> u32 {
        let mut ran = 0;
        while ran < max_ticks && !self.state.phase.is_terminal() {
            self.tick();
            ran += 1;
            if !self.state.phase.is_terminal() {
                self.hold.hold(period);
            }
        }
        ran
    }

    fn poll_event(&mut self) -> EventCode {
        match self.events.poll() {
            Ok(code) => code,
            Err(error) => {
                self.telemetry.record(
                    TelemetryEventKind::EventSourceFault,
                    TelemetryPayload::EventSource(error),
                    self.events.elapsed(),
                );
                EventCode::None
            }
        }
    }

    fn enter_phase(&mut self, transition: PhaseTransition, elapsed: Duration) {
        self.state.phase = transition.to;
        self.state.flags = MissionFlags::for_phase(transition.to);
        self.telemetry.record(
            TelemetryEventKind::PhaseEntered(transition.to),
            TelemetryPayload::Transition(transition.cause),
            elapsed,
        );

        match transition.to {
            MissionPhase::Active => {
                self.write_baseline(elapsed);
                schedule(
                    &mut self.state.camera,
                    &mut self.telemetry,
                    &CAMERA_SHUTTER_TEMPLATE,
                    elapsed,
                );
                schedule(
                    &mut self.state.motor,
                    &mut self.telemetry,
                    &MOTOR_SOLENOID_TEMPLATE,
                    elapsed,
                );
            }
            MissionPhase::Complete => {
                self.state.camera.cancel();
                schedule(
                    &mut self.state.camera,
                    &mut self.telemetry,
                    &CAMERA_PARK_TEMPLATE,
                    elapsed,
                );
            }
            MissionPhase::AwaitingWindow => {}
        }
    }

    fn write_baseline(&mut self, elapsed: Duration) {
        if self.state.baseline_written {
            return;
        }
        self.state.baseline_written = true;
        let sample = SensorSample::capture(&mut self.sensors, self.state.flags.sampling, elapsed);
        self.persist(LogRecord::baseline(sample));
    }

    fn log_if_due(&mut self, tick: u32) -> Option<AppendOutcome> {
        let now = self.events.elapsed();
        let record = self
            .logger
            .poll(tick, self.state.flags.sampling, now, &mut self.sensors)?;
        Some(self.persist(record))
    }

    fn persist(&mut self, record: LogRecord) -> AppendOutcome {
        let at = record.sample.timestamp;
        for (channel, error) in record.sample.faults() {
            self.telemetry.record(
                TelemetryEventKind::SensorFault(channel),
                TelemetryPayload::Sensor(error),
                at,
            );
        }

        let outcome = self.journal.append(record);
        let (error, dropped) = match outcome {
            AppendOutcome::Written => return outcome,
            AppendOutcome::Deferred { error, displaced } => (error, displaced),
            AppendOutcome::Dropped(error) => (error, true),
        };

        self.telemetry.record(
            TelemetryEventKind::StorageFault,
            TelemetryPayload::Storage(StorageTelemetry::new(
                error,
                self.journal.backlog_len(),
                self.journal.lost(),
            )),
            at,
        );
        if dropped {
            self.telemetry.record(
                TelemetryEventKind::RecordsDropped,
                TelemetryPayload::Storage(StorageTelemetry::new(
                    error,
                    self.journal.backlog_len(),
                    self.journal.lost(),
                )),
                at,
            );
        }
        outcome
    }

    /// Nothing new is logged once the mission is complete, so records deferred
    /// late in the active phase are pushed out here.
    fn retry_backlog(&mut self, at: Duration) {
        if self.journal.backlog_len() == 0 {
            return;
        }
        if let Err(error) = self.journal.flush_backlog() {
            self.telemetry.record(
                TelemetryEventKind::StorageFault,
                TelemetryPayload::Storage(StorageTelemetry::new(
                    error,
                    self.journal.backlog_len(),
                    self.journal.lost(),
                )),
                at,
            );
        }
    }

    fn sync_leds(&mut self) {
        let on = self.state.flags.leds;
        if self.state.leds_driven == Some(on) {
            return;
        }

        let level = OutputLevel::from_bool(on);
        let at = self.events.elapsed();
        let mut all_driven = true;
        for led in [ActuatorId::LedPrimary, ActuatorId::LedSecondary] {
            if drive(&mut self.actuators, led, level).is_ok() {
                self.telemetry.record(
                    TelemetryEventKind::ActuatorDriven(led, level),
                    TelemetryPayload::None,
                    at,
                );
            } else {
                all_driven = false;
            }
        }

        // A failed write is retried on the next tick.
        if all_driven {
            self.state.leds_driven = Some(on);
        }
    }
}

fn schedule(
    sequence: &mut ActuationSequence,
    telemetry: &mut TelemetryRecorder,
    template: &'static ActuationTemplate,
    at: Duration,
) {
    if !sequence.request(template) {
        telemetry.record(
            TelemetryEventKind::SequenceSkipped(template.kind),
            TelemetryPayload::None,
            at,
        );
    }
}
