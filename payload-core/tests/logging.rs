mod support;

use core::time::Duration;

use payload_core::clock::ManualClock;
use payload_core::events::{EventCode, TimelineEntry};
use payload_core::records::{AppendOutcome, RecordKind, StorageWriteError};
use payload_core::sampling::{Reading, SensorChannel, SensorReadError};
use payload_core::sequencer::{MissionPhase, MissionProfile};
use payload_core::telemetry::TelemetryEventKind;

use support::{TICK, mission, secs};

fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}

#[test]
fn flight_profile_logs_baseline_then_every_hundredth_tick() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[
            TimelineEntry::new(secs(50), EventCode::CoastStart),
            TimelineEntry::new(secs(120), EventCode::CoastEnd),
        ],
    );

    mission.run_until_complete(10_000, TICK);

    let sink = mission.journal().sink();
    assert_eq!(sink.records[0].kind, RecordKind::Baseline);
    assert!(
        sink.records[1..]
            .iter()
            .all(|record| record.kind == RecordKind::Periodic)
    );
    // Ticks 500 through 1000; tick 500 logs after the actuation holds.
    assert_eq!(
        sink.timestamps(),
        vec![
            secs(50),
            millis(66_600),
            millis(76_600),
            millis(86_600),
            millis(96_600),
            millis(106_600),
            millis(116_600),
        ]
    );
    assert_eq!(mission.logger().emitted(), 6);
}

#[test]
fn continuous_profile_logs_every_active_tick() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::CONTINUOUS,
        &[
            TimelineEntry::new(secs(10), EventCode::CoastStart),
            TimelineEntry::new(secs(30), EventCode::CoastEnd),
        ],
    );

    mission.run_until_complete(10_000, TICK);

    let sink = mission.journal().sink();
    let periodic = sink
        .records
        .iter()
        .filter(|record| record.kind == RecordKind::Periodic)
        .count();
    assert_eq!(periodic, 6);
    let timestamps = sink.timestamps();
    assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[test]
fn nothing_is_logged_outside_the_active_phase() {
    let clock = ManualClock::new();
    let mut mission = mission(&clock, MissionProfile::CONTINUOUS, &[]);

    for _ in 0..500 {
        let report = mission.tick();
        assert_eq!(report.logged, None);
        clock.advance(TICK);
    }
    assert_eq!(mission.phase(), MissionPhase::AwaitingWindow);
    assert!(mission.journal().sink().records.is_empty());
    assert_eq!(mission.sensors().reads, 0);
}

#[test]
fn baseline_captures_every_channel_once() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[TimelineEntry::new(secs(3), EventCode::CoastStart)],
    );
    for _ in 0..40 {
        mission.tick();
        clock.advance(TICK);
    }

    let records = &mission.journal().sink().records;
    let baselines: Vec<_> = records
        .iter()
        .filter(|record| record.kind == RecordKind::Baseline)
        .collect();
    assert_eq!(baselines.len(), 1);
    let sample = &baselines[0].sample;
    assert_eq!(sample.timestamp, secs(3));
    assert_eq!(sample.range_mm, Reading::Value(120));
    assert!(sample.faults().next().is_none());

    let text = baselines[0].render().expect("fits");
    assert!(text.contains("Time (s),Distance (mm),Temperature (C)"));
    assert!(text.contains("\n3.000, 120, 21.50, 1013.25, "));
}

#[test]
fn faulted_channel_renders_placeholder_and_reports_telemetry() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[TimelineEntry::new(secs(1), EventCode::CoastStart)],
    );
    mission.sensors_mut().faulted = Some((SensorChannel::Temperature, SensorReadError::Bus));

    for _ in 0..11 {
        mission.tick();
        clock.advance(TICK);
    }

    let baseline = &mission.journal().sink().records[0];
    assert_eq!(
        baseline.sample.temperature_c,
        Reading::Faulted(SensorReadError::Bus)
    );
    let text = baseline.render().expect("fits");
    assert!(text.contains("\n1.000, 120, ERR, 1013.25, "));
    assert_eq!(
        mission
            .telemetry()
            .count(TelemetryEventKind::SensorFault(SensorChannel::Temperature)),
        1
    );
}

#[test]
fn storage_outage_defers_records_without_stalling_the_mission() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[
            TimelineEntry::new(secs(50), EventCode::CoastStart),
            TimelineEntry::new(secs(120), EventCode::CoastEnd),
        ],
    );
    mission.sink_mut().fail_next = 2;

    let mut outcomes = Vec::new();
    while !mission.phase().is_terminal() {
        if let Some(outcome) = mission.tick().logged {
            outcomes.push(outcome);
        }
        clock.advance(TICK);
    }

    assert_eq!(
        outcomes[0],
        AppendOutcome::Deferred {
            error: StorageWriteError::Io,
            displaced: false
        }
    );
    assert!(outcomes[1..].iter().all(|outcome| *outcome == AppendOutcome::Written));

    // The backlog drained in order once storage recovered.
    let sink = mission.journal().sink();
    assert_eq!(sink.records.len(), 7);
    assert_eq!(sink.records[0].kind, RecordKind::Baseline);
    assert_eq!(sink.timestamps()[1], millis(66_600));
    assert_eq!(mission.journal().lost(), 0);
    assert_eq!(mission.journal().backlog_len(), 0);
    assert_eq!(
        mission.telemetry().count(TelemetryEventKind::StorageFault),
        2
    );
    assert_eq!(mission.phase(), MissionPhase::Complete);
}

#[test]
fn persistent_storage_failure_drops_oldest_records() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::CONTINUOUS,
        &[TimelineEntry::new(secs(1), EventCode::CoastStart)],
    );
    mission.sink_mut().fail_next = u32::MAX;

    for _ in 0..20 {
        mission.tick();
        clock.advance(TICK);
    }

    let journal = mission.journal();
    assert!(journal.sink().records.is_empty());
    assert_eq!(journal.backlog_len(), 8);
    assert!(journal.lost() > 0);
    assert!(
        mission
            .telemetry()
            .count(TelemetryEventKind::RecordsDropped)
            > 0
    );
    assert_eq!(mission.phase(), MissionPhase::Active);
}

#[test]
fn record_deferred_before_completion_lands_on_idle_ticks() {
    let clock = ManualClock::new();
    let mut mission = mission(
        &clock,
        MissionProfile::FLIGHT,
        &[
            TimelineEntry::new(secs(50), EventCode::CoastStart),
            TimelineEntry::new(secs(120), EventCode::CoastEnd),
        ],
    );

    // Fails the 116.6 s record and then its first retry.
    let mut armed = false;
    while !mission.phase().is_terminal() {
        let report = mission.tick();
        if !armed && report.elapsed >= secs(115) {
            mission.sink_mut().fail_next = 2;
            armed = true;
        }
        clock.advance(TICK);
    }
    assert_eq!(mission.journal().backlog_len(), 1);
    assert_eq!(mission.journal().sink().records.len(), 6);

    let report = mission.tick();
    assert!(report.idle);
    assert_eq!(report.logged, None);
    assert_eq!(mission.journal().backlog_len(), 1);
    assert_eq!(
        mission.telemetry().count(TelemetryEventKind::StorageFault),
        2
    );
    clock.advance(TICK);

    for _ in 0..5 {
        assert!(mission.tick().idle);
        clock.advance(TICK);
    }

    let journal = mission.journal();
    assert_eq!(journal.backlog_len(), 0);
    assert_eq!(journal.lost(), 0);
    assert_eq!(journal.written(), 7);
    assert_eq!(journal.sink().records.len(), 7);
    assert_eq!(journal.sink().timestamps()[6], millis(116_600));
    assert_eq!(journal.sink().attempts, 9);
    assert_eq!(mission.phase(), MissionPhase::Complete);
}
