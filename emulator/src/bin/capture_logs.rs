use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use payload_core::clock::{ManualClock, ManualHold};
use payload_core::events::Timeline;
use payload_core::sequencer::MissionProfile;

#[allow(dead_code)]
#[path = "../simulation.rs"]
mod simulation;

use simulation::{FileSink, RunConfig, missed_event_timeline, nominal_timeline};

const EVIDENCE_DIR: &str = "evidence";

fn main() -> io::Result<()> {
    fs::create_dir_all(EVIDENCE_DIR)?;
    for (profile_name, profile) in [
        ("flight", MissionProfile::FLIGHT),
        ("continuous", MissionProfile::CONTINUOUS),
    ] {
        record(profile_name, profile, "nominal", nominal_timeline())?;
        record(profile_name, profile, "missed-event", missed_event_timeline())?;
    }
    Ok(())
}

/// Writes `<profile>-<scenario>.txt` (the record log) and `.log` (telemetry).
fn record(
    profile_name: &str,
    profile: MissionProfile,
    scenario: &str,
    timeline: Timeline,
) -> io::Result<()> {
    let base = Path::new(EVIDENCE_DIR).join(format!("{profile_name}-{scenario}"));
    let sink = FileSink::create(&base.with_extension("txt"))?;
    let mut transcript = BufWriter::new(File::create(base.with_extension("log"))?);
    writeln!(
        transcript,
        "# Payload emulator {profile_name} profile, {scenario} timeline"
    )?;
    writeln!(transcript, "# Timestamps are mission seconds")?;
    writeln!(transcript)?;

    let clock = ManualClock::new();
    let config = RunConfig::new(profile, timeline);
    let summary =
        simulation::run_mission(&config, &clock, ManualHold::new(&clock), sink, &mut transcript)?;

    writeln!(transcript)?;
    writeln!(transcript, "# {summary:?}")?;
    transcript.flush()?;
    println!("{}: {summary:?}", base.display());
    Ok(())
}
