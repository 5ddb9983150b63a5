mod support;

use core::time::Duration;

use payload_core::clock::ManualClock;
use payload_core::events::{EventCode, TimelineEntry};
use payload_core::sequencer::{MissionPhase, MissionProfile, SequencerState, TransitionCause};
use payload_core::sequences::{ActuatorId, OutputLevel};
use payload_core::telemetry::TelemetryEventKind;

use support::{TICK, mission, secs};

#[test]
fn nominal_flight_follows_coast_events() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[
            TimelineEntry::new(secs(50), EventCode::CoastStart),
            TimelineEntry::new(secs(120), EventCode::CoastEnd),
        ],
    );

    let ticks = mission.run_until_complete(10_000, TICK);

    assert_eq!(mission.phase(), MissionPhase::Complete);
    assert_eq!(ticks, 1_035);
    assert_eq!(mission.events().delivered(), 2);
    assert_eq!(mission.events().missed(), 0);

    let telemetry = mission.telemetry();
    assert_eq!(
        telemetry.count(TelemetryEventKind::PhaseEntered(MissionPhase::Active)),
        1
    );
    assert_eq!(
        telemetry.count(TelemetryEventKind::PhaseEntered(MissionPhase::Complete)),
        1
    );
}

#[test]
fn silent_source_falls_back_on_elapsed_time() {
    let clock = ManualClock::new();
    let profile = MissionProfile::FLIGHT;
    let mut mission = mission(&clock, profile, &[]);

    let mut transitions = Vec::new();
    for _ in 0..10_000 {
        let report = mission.tick();
        if let Some(transition) = report.transition {
            transitions.push((transition.to, transition.cause, report.elapsed));
        }
        if mission.phase().is_terminal() {
            break;
        }
        clock.advance(TICK);
    }

    assert_eq!(
        transitions,
        vec![
            (MissionPhase::Active, TransitionCause::Fallback, profile.phase_start),
            (MissionPhase::Complete, TransitionCause::Fallback, profile.phase_end),
        ]
    );
}

#[test]
fn no_transition_one_nanosecond_before_threshold() {
    let profile = MissionProfile::FLIGHT;
    let clock = ManualClock::starting_at(profile.phase_start - Duration::from_nanos(1));
    let mut mission = mission(&clock, profile, &[]);

    let report = mission.tick();
    assert_eq!(report.transition, None);
    assert_eq!(mission.phase(), MissionPhase::AwaitingWindow);

    clock.advance(Duration::from_nanos(1));
    let report = mission.tick();
    assert_eq!(
        report.transition.map(|transition| transition.cause),
        Some(TransitionCause::Fallback)
    );
    assert_eq!(mission.phase(), MissionPhase::Active);
}

#[test]
fn late_start_walks_both_phases_on_consecutive_ticks() {
    let clock = ManualClock::starting_at(secs(400));
    let mut mission = mission(&clock, MissionProfile::FLIGHT, &[]);

    assert_eq!(mission.tick().phase, MissionPhase::Active);
    assert_eq!(mission.tick().phase, MissionPhase::Complete);

    let state = mission.state();
    assert!(state.baseline_written);
    assert_eq!(state.motor.activations(), 1);
}

#[test]
fn events_out_of_phase_are_ignored() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[
            TimelineEntry::new(secs(10), EventCode::CoastEnd),
            TimelineEntry::new(secs(20), EventCode::CoastStart),
            TimelineEntry::new(secs(100), EventCode::CoastStart),
            TimelineEntry::new(secs(150), EventCode::CoastEnd),
        ],
    );

    let mut causes = Vec::new();
    while !mission.phase().is_terminal() {
        if let Some(transition) = mission.tick().transition {
            causes.push(transition.cause);
        }
        clock.advance(TICK);
    }

    assert_eq!(
        causes,
        vec![
            TransitionCause::Event(EventCode::CoastStart),
            TransitionCause::Event(EventCode::CoastEnd),
        ]
    );
    assert_eq!(mission.events().delivered(), 4);
}

#[test]
fn missed_coast_end_during_motor_hold_is_bounded_by_fallback() {
    let clock = ManualClock::new();
    let profile = MissionProfile::FLIGHT;
    let mut mission = mission(
        &clock,
        profile,
        &[
            TimelineEntry::new(secs(50), EventCode::CoastStart),
            // Visible only while the 16 s motor hold is blocking the loop.
            TimelineEntry::new(secs(60), EventCode::CoastEnd),
        ],
    );

    mission.run_until_complete(10_000, TICK);

    assert_eq!(mission.phase(), MissionPhase::Complete);
    assert_eq!(mission.events().missed(), 1);
    let completed = mission
        .telemetry()
        .oldest_first()
        .find(|record| {
            record.event == TelemetryEventKind::PhaseEntered(MissionPhase::Complete)
        })
        .expect("completion recorded");
    assert!(completed.timestamp >= profile.phase_end);
    assert!(completed.timestamp < profile.phase_end + TICK);
}

#[test]
fn complete_phase_ticks_do_nothing() {
    let clock = ManualClock::starting_at(secs(400));
    let mut mission = mission(&clock, MissionProfile::FLIGHT, &[]);
    mission.run_until_complete(10, TICK);

    let writes = mission.actuators().writes.len();
    let records = mission.journal().sink().records.len();
    let tick = mission.state().tick;
    let next_event = mission.telemetry().next_event_id();

    for _ in 0..5 {
        clock.advance(secs(10));
        let report = mission.tick();
        assert!(report.idle);
        assert_eq!(report.phase, MissionPhase::Complete);
    }

    assert_eq!(mission.actuators().writes.len(), writes);
    assert_eq!(mission.journal().sink().records.len(), records);
    assert_eq!(mission.state().tick, tick);
    assert_eq!(mission.telemetry().next_event_id(), next_event);
}

#[test]
fn complete_parks_camera_and_stops_drivers() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[
            TimelineEntry::new(secs(5), EventCode::CoastStart),
            TimelineEntry::new(secs(40), EventCode::CoastEnd),
        ],
    );
    mission.run_until_complete(10_000, TICK);

    let actuators = mission.actuators();
    assert_eq!(actuators.level(ActuatorId::Motor), Some(OutputLevel::Low));
    assert_eq!(actuators.level(ActuatorId::Solenoid), Some(OutputLevel::Low));
    assert_eq!(actuators.level(ActuatorId::LedPrimary), Some(OutputLevel::Low));
    assert_eq!(actuators.level(ActuatorId::LedSecondary), Some(OutputLevel::Low));
    assert_eq!(actuators.level(ActuatorId::CameraTrigger), Some(OutputLevel::Low));
}

#[test]
fn event_source_failures_are_absorbed() {
    let clock = ManualClock::new();
    let events = payload_core::events::ScriptedEventSource::new(
        &clock,
        payload_core::events::timeline::build_timeline(&[TimelineEntry::new(
            secs(1),
            EventCode::CoastStart,
        )])
        .expect("timeline fits"),
    )
    .with_failed_polls(3);
    let mut mission = payload_core::sequencer::MissionSequencer::new(
        MissionProfile::FLIGHT,
        events,
        support::FakeSensors::default(),
        support::RecordingActuators::default(),
        payload_core::clock::ManualHold::new(&clock),
        support::MemorySink::default(),
    )
    .expect("valid profile");

    for _ in 0..3 {
        assert_eq!(mission.tick().event, EventCode::None);
        clock.advance(TICK);
    }
    clock.advance_to(secs(1));
    assert_eq!(mission.tick().event, EventCode::CoastStart);
    assert_eq!(mission.phase(), MissionPhase::Active);
    assert_eq!(
        mission
            .telemetry()
            .count(TelemetryEventKind::EventSourceFault),
        3
    );
}

#[test]
fn restored_state_never_writes_a_second_baseline() {
    let clock = ManualClock::new();
    let state = SequencerState {
        baseline_written: true,
        ..SequencerState::new()
    };
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[TimelineEntry::new(Duration::ZERO, EventCode::CoastStart)],
    )
    .with_state(state);

    let report = mission.tick();
    assert_eq!(report.phase, MissionPhase::Active);
    // Only the periodic record for tick 0 lands.
    let records = &mission.journal().sink().records;
    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].kind,
        payload_core::records::RecordKind::Periodic
    );
}
