//! One-shot actuation sequences and the actuator bank they drive.
//!
//! Each [`ActuationSequence`] owns a single request slot. The sequencer files
//! a template into the slot on phase entry; [`ActuationSequence::run_pending`]
//! then drives every step to completion, blocking through the holds, and only
//! clears the slot once the outputs are back at rest. A slot that is pending
//! or running ignores further requests, so re-evaluating the same condition
//! never produces a second physical pulse.

use core::{fmt, time::Duration};

use crate::clock::Hold;
use crate::sequences::{ActuationTemplate, ActuatorId, OutputLevel};
use crate::telemetry::{
    SequenceTelemetry, StepTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder,
};

/// Status LED selector.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum LedId {
    Primary,
    Secondary,
}

/// Failure writing an output. Aborts the sequence that issued it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorWriteError {
    /// The driver could not reach the output (GPIO expander, bus fault).
    Bus,
    /// The driver refused the level.
    Rejected,
}

impl fmt::Display for ActuatorWriteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Imperative output control. Writes take effect before the call returns.
pub trait ActuatorBank {
    /// Opens (`true`) or closes the solenoid valve.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorWriteError`] when the output could not be driven.
    fn set_solenoid(&mut self, open: bool) -> Result<(), ActuatorWriteError>;

    /// Starts (`true`) or stops the drive motor.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorWriteError`] when the output could not be driven.
    fn set_motor(&mut self, running: bool) -> Result<(), ActuatorWriteError>;

    /// Switches one status LED.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorWriteError`] when the output could not be driven.
    fn set_led(&mut self, led: LedId, on: bool) -> Result<(), ActuatorWriteError>;

    /// Drives the camera trigger line high (`true`) or low.
    ///
    /// # Errors
    ///
    /// Returns [`ActuatorWriteError`] when the output could not be driven.
    fn set_camera_trigger(&mut self, high: bool) -> Result<(), ActuatorWriteError>;
}

impl<A: ActuatorBank + ?Sized> ActuatorBank for &mut A {
    fn set_solenoid(&mut self, open: bool) -> Result<(), ActuatorWriteError> {
        (**self).set_solenoid(open)
    }

    fn set_motor(&mut self, running: bool) -> Result<(), ActuatorWriteError> {
        (**self).set_motor(running)
    }

    fn set_led(&mut self, led: LedId, on: bool) -> Result<(), ActuatorWriteError> {
        (**self).set_led(led, on)
    }

    fn set_camera_trigger(&mut self, high: bool) -> Result<(), ActuatorWriteError> {
        (**self).set_camera_trigger(high)
    }
}

/// Routes a catalog output to the matching bank call.
///
/// # Errors
///
/// Propagates the bank's [`ActuatorWriteError`].
pub fn drive<A: ActuatorBank + ?Sized>(
    bank: &mut A,
    output: ActuatorId,
    level: OutputLevel,
) -> Result<(), ActuatorWriteError> {
    let high = level.is_high();
    match output {
        ActuatorId::Solenoid => bank.set_solenoid(high),
        ActuatorId::Motor => bank.set_motor(high),
        ActuatorId::LedPrimary => bank.set_led(LedId::Primary, high),
        ActuatorId::LedSecondary => bank.set_led(LedId::Secondary, high),
        ActuatorId::CameraTrigger => bank.set_camera_trigger(high),
    }
}

/// Request slot contents.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuationRequest {
    None,
    Pending(&'static ActuationTemplate),
}

/// Result of one sequence run.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceOutcome {
    Completed,
    /// A step failed; the template's safe state was driven instead.
    Aborted(ActuatorWriteError),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SequenceStatus {
    Idle,
    Running,
    Done(SequenceOutcome),
}

/// Single-slot runner for one family of pulse templates.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuationSequence {
    request: ActuationRequest,
    status: SequenceStatus,
    activations: u32,
}

impl Default for ActuationSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuationSequence {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            request: ActuationRequest::None,
            status: SequenceStatus::Idle,
            activations: 0,
        }
    }

    #[must_use]
    pub const fn request_state(&self) -> ActuationRequest {
        self.request
    }

    #[must_use]
    pub const fn status(&self) -> SequenceStatus {
        self.status
    }

    /// Number of times the sequence has begun driving hardware.
    #[must_use]
    pub const fn activations(&self) -> u32 {
        self.activations
    }

    #[must_use]
    pub const fn is_pending(&self) -> bool {
        matches!(self.request, ActuationRequest::Pending(_))
    }

    #[must_use]
    pub const fn is_running(&self) -> bool {
        matches!(self.status, SequenceStatus::Running)
    }

    /// Files `template` into the slot. Returns `false` (and changes nothing)
    /// when a request is already pending or running.
    pub fn request(&mut self, template: &'static ActuationTemplate) -> bool {
        if self.is_pending() || self.is_running() {
            return false;
        }
        self.request = ActuationRequest::Pending(template);
        true
    }

    /// Withdraws a request that has not started yet.
    pub fn cancel(&mut self) -> Option<&'static ActuationTemplate> {
        match self.request {
            ActuationRequest::Pending(template) if !self.is_running() => {
                self.request = ActuationRequest::None;
                Some(template)
            }
            _ => None,
        }
    }

    /// Claims the pending request and marks the slot running.
    ///
    /// Returns `None` when nothing is pending or a run is already in progress.
    /// The request stays filed until [`ActuationSequence::finish`].
    pub fn begin(&mut self) -> Option<&'static ActuationTemplate> {
        if self.is_running() {
            return None;
        }
        let ActuationRequest::Pending(template) = self.request else {
            return None;
        };
        self.status = SequenceStatus::Running;
        self.activations = self.activations.saturating_add(1);
        Some(template)
    }

    /// Records the outcome and releases the request slot.
    pub fn finish(&mut self, outcome: SequenceOutcome) {
        self.status = SequenceStatus::Done(outcome);
        self.request = ActuationRequest::None;
    }

    /// Runs the pending template to completion, if one is waiting.
    ///
    /// `started_at` is the mission time at entry; step telemetry is stamped
    /// with `started_at` plus the hold time accumulated so far.
    pub fn run_pending<A, H, const N: usize>(
        &mut self,
        bank: &mut A,
        hold: &mut H,
        telemetry: &mut TelemetryRecorder<N>,
        started_at: Duration,
    ) -> Option<SequenceOutcome>
    where
        A: ActuatorBank + ?Sized,
        H: Hold + ?Sized,
    {
        let template = self.begin()?;
        telemetry.record(
            TelemetryEventKind::SequenceStarted(template.kind),
            TelemetryPayload::None,
            started_at,
        );

        let (outcome, elapsed) = match execute_steps(template, bank, hold, telemetry, started_at) {
            Ok(elapsed) => (SequenceOutcome::Completed, elapsed),
            Err((error, elapsed)) => {
                drive_safe_state(template, bank, telemetry, started_at + elapsed);
                (SequenceOutcome::Aborted(error), elapsed)
            }
        };

        let event = match outcome {
            SequenceOutcome::Completed => TelemetryEventKind::SequenceFinished(template.kind),
            SequenceOutcome::Aborted(_) => TelemetryEventKind::SequenceAborted(template.kind),
        };
        telemetry.record(
            event,
            TelemetryPayload::Sequence(SequenceTelemetry::new(outcome, elapsed)),
            started_at + elapsed,
        );

        self.finish(outcome);
        Some(outcome)
    }
}

fn execute_steps<A, H, const N: usize>(
    template: &ActuationTemplate,
    bank: &mut A,
    hold: &mut H,
    telemetry: &mut TelemetryRecorder<N>,
    started_at: Duration,
) -> Result<Duration, (ActuatorWriteError, Duration)>
where
    A: ActuatorBank + ?Sized,
    H: Hold + ?Sized,
{
    let mut offset = Duration::ZERO;
    for step in template.steps() {
        drive(bank, step.output, step.level).map_err(|error| (error, offset))?;
        telemetry.record(
            TelemetryEventKind::ActuatorDriven(step.output, step.level),
            TelemetryPayload::Step(StepTelemetry::new(offset)),
            started_at + offset,
        );

        if !step.hold_for.is_zero() {
            hold.hold(step.hold_for);
            offset += step.hold_for;
        }
    }
    Ok(offset)
}

// Every safe-state write is attempted even if an earlier one fails.
fn drive_safe_state<A, const N: usize>(
    template: &ActuationTemplate,
    bank: &mut A,
    telemetry: &mut TelemetryRecorder<N>,
    timestamp: Duration,
) where
    A: ActuatorBank + ?Sized,
{
    for step in template.safe_state {
        if drive(bank, step.output, step.level).is_ok() {
            telemetry.record(
                TelemetryEventKind::ActuatorDriven(step.output, step.level),
                TelemetryPayload::None,
                timestamp,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{ManualClock, ManualHold, MissionClock};
    use crate::sequences::{CAMERA_SHUTTER_TEMPLATE, MOTOR_SOLENOID_TEMPLATE, motor::MOTOR_HOLD};
    use heapless::Vec;

    #[derive(Default)]
    struct RecordingBank {
        writes: Vec<(ActuatorId, bool), 32>,
        fail_on: Option<(ActuatorId, bool)>,
    }

    impl RecordingBank {
        fn write(&mut self, id: ActuatorId, high: bool) -> Result<(), ActuatorWriteError> {
            if self.fail_on == Some((id, high)) {
                return Err(ActuatorWriteError::Bus);
            }
            self.writes.push((id, high)).expect("write log capacity");
            Ok(())
        }
    }

    impl ActuatorBank for RecordingBank {
        fn set_solenoid(&mut self, open: bool) -> Result<(), ActuatorWriteError> {
            self.write(ActuatorId::Solenoid, open)
        }

        fn set_motor(&mut self, running: bool) -> Result<(), ActuatorWriteError> {
            self.write(ActuatorId::Motor, running)
        }

        fn set_led(&mut self, led: LedId, on: bool) -> Result<(), ActuatorWriteError> {
            let id = match led {
                LedId::Primary => ActuatorId::LedPrimary,
                LedId::Secondary => ActuatorId::LedSecondary,
            };
            self.write(id, on)
        }

        fn set_camera_trigger(&mut self, high: bool) -> Result<(), ActuatorWriteError> {
            self.write(ActuatorId::CameraTrigger, high)
        }
    }

    #[test]
    fn motor_sequence_runs_once_and_clears_request() {
        let clock = ManualClock::new();
        let mut hold = ManualHold::new(&clock);
        let mut bank = RecordingBank::default();
        let mut telemetry = TelemetryRecorder::<32>::new();
        let mut sequence = ActuationSequence::new();

        assert!(sequence.request(&MOTOR_SOLENOID_TEMPLATE));
        let outcome = sequence.run_pending(&mut bank, &mut hold, &mut telemetry, clock.now());

        assert_eq!(outcome, Some(SequenceOutcome::Completed));
        assert_eq!(sequence.request_state(), ActuationRequest::None);
        assert_eq!(sequence.status(), SequenceStatus::Done(SequenceOutcome::Completed));
        assert_eq!(
            bank.writes.as_slice(),
            &[
                (ActuatorId::Solenoid, true),
                (ActuatorId::Motor, true),
                (ActuatorId::Motor, false),
                (ActuatorId::Solenoid, false),
            ]
        );
        assert_eq!(clock.now(), MOTOR_HOLD);

        assert_eq!(
            sequence.run_pending(&mut bank, &mut hold, &mut telemetry, clock.now()),
            None
        );
        assert_eq!(sequence.activations(), 1);
        assert_eq!(bank.writes.len(), 4);
    }

    #[test]
    fn requests_while_pending_are_ignored() {
        let mut sequence = ActuationSequence::new();
        assert!(sequence.request(&MOTOR_SOLENOID_TEMPLATE));
        assert!(!sequence.request(&CAMERA_SHUTTER_TEMPLATE));
        assert_eq!(
            sequence.request_state(),
            ActuationRequest::Pending(&MOTOR_SOLENOID_TEMPLATE)
        );
    }

    #[test]
    fn running_sequence_is_not_restarted() {
        let clock = ManualClock::new();
        let mut hold = ManualHold::new(&clock);
        let mut bank = RecordingBank::default();
        let mut telemetry = TelemetryRecorder::<32>::new();
        let mut sequence = ActuationSequence::new();

        sequence.request(&MOTOR_SOLENOID_TEMPLATE);
        assert!(sequence.begin().is_some());
        assert!(sequence.is_running());

        assert_eq!(sequence.run_pending(&mut bank, &mut hold, &mut telemetry, clock.now()), None);
        assert_eq!(sequence.run_pending(&mut bank, &mut hold, &mut telemetry, clock.now()), None);
        assert_eq!(sequence.activations(), 1);
        assert!(sequence.is_pending());
        assert!(sequence.cancel().is_none());
        assert!(bank.writes.is_empty());
    }

    #[test]
    fn failed_step_drives_safe_state_and_aborts() {
        let clock = ManualClock::new();
        let mut hold = ManualHold::new(&clock);
        let mut bank = RecordingBank {
            fail_on: Some((ActuatorId::Motor, true)),
            ..RecordingBank::default()
        };
        let mut telemetry = TelemetryRecorder::<32>::new();
        let mut sequence = ActuationSequence::new();

        sequence.request(&MOTOR_SOLENOID_TEMPLATE);
        let outcome = sequence.run_pending(&mut bank, &mut hold, &mut telemetry, clock.now());

        assert_eq!(
            outcome,
            Some(SequenceOutcome::Aborted(ActuatorWriteError::Bus))
        );
        assert_eq!(
            bank.writes.as_slice(),
            &[
                (ActuatorId::Solenoid, true),
                (ActuatorId::Motor, false),
                (ActuatorId::Solenoid, false),
            ]
        );
        assert_eq!(hold.hold_count(), 0);
        assert!(!sequence.is_pending());
        assert_eq!(
            telemetry.latest().map(|record| record.event),
            Some(TelemetryEventKind::SequenceAborted(
                MOTOR_SOLENOID_TEMPLATE.kind
            ))
        );
    }

    #[test]
    fn cancel_withdraws_pending_request() {
        let mut sequence = ActuationSequence::new();
        sequence.request(&CAMERA_SHUTTER_TEMPLATE);
        assert_eq!(sequence.cancel(), Some(&CAMERA_SHUTTER_TEMPLATE));
        assert!(!sequence.is_pending());
        assert_eq!(sequence.activations(), 0);
    }
}
