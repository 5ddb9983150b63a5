#[allow(dead_code)]
mod simulation;

use std::env;
use std::fs;
use std::io::{self, Write};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process;

use crossterm::style::Stylize;
use payload_core::clock::{ManualClock, ManualHold};
use payload_core::events::timeline::parse_timeline;
use payload_core::sequencer::MissionProfile;

use simulation::{FileSink, RunConfig, RunSummary, SleepHold, WallClock, nominal_timeline};

const USAGE: &str = "Usage: emulator [--profile <flight|continuous>] [--timeline <file>] \
                     [--log <file>] [--fail-every <n>] [--realtime]";

struct Options {
    profile: MissionProfile,
    timeline: Option<PathBuf>,
    log: PathBuf,
    fail_every: Option<NonZeroU32>,
    realtime: bool,
}

fn main() -> io::Result<()> {
    let options = parse_options().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let timeline = match &options.timeline {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            parse_timeline(&text).unwrap_or_else(|err| {
                eprintln!("{}: {err}", path.display());
                process::exit(2);
            })
        }
        None => nominal_timeline(),
    };

    let mut config = RunConfig::new(options.profile, timeline);
    config.fail_every = options.fail_every;
    config.color = true;

    let sink = FileSink::open(&options.log)?;
    let stdout = io::stdout();
    let mut writer = stdout.lock();

    writeln!(
        writer,
        "Payload emulator: {} entries scripted, logging to {}{}",
        config.timeline.len(),
        options.log.display(),
        if options.realtime { " (real time)" } else { "" }
    )?;

    let summary = if options.realtime {
        let clock = WallClock::start();
        simulation::run_mission(&config, &clock, SleepHold, sink, &mut writer)?
    } else {
        let clock = ManualClock::new();
        simulation::run_mission(&config, &clock, ManualHold::new(&clock), sink, &mut writer)?
    };

    print_summary(&mut writer, &summary)
}

fn print_summary<W: Write>(writer: &mut W, summary: &RunSummary) -> io::Result<()> {
    writeln!(writer)?;
    writeln!(
        writer,
        "{} after {} ticks",
        format!("mission {}", summary.phase).bold(),
        summary.ticks
    )?;
    writeln!(
        writer,
        "records: {} written, {} lost, {} still queued",
        summary.written, summary.lost, summary.backlog
    )?;
    writeln!(
        writer,
        "events: {} delivered, {} missed; sensor faults injected: {}",
        summary.events_delivered, summary.events_missed, summary.sensor_faults
    )
}

fn parse_options() -> Result<Options, String> {
    let mut options = Options {
        profile: MissionProfile::FLIGHT,
        timeline: None,
        log: PathBuf::from("data.txt"),
        fail_every: None,
        realtime: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        let (flag, inline) = match arg.split_once('=') {
            Some((flag, value)) => (flag.to_string(), Some(value.to_string())),
            None => (arg, None),
        };

        if flag == "--realtime" {
            options.realtime = true;
            continue;
        }

        let Some(value) = inline.or_else(|| args.next()) else {
            return Err(format!("Expected value after {flag}"));
        };
        match flag.as_str() {
            "--profile" => {
                options.profile = MissionProfile::by_name(&value)
                    .ok_or_else(|| format!("Unknown profile `{value}`"))?;
            }
            "--timeline" => options.timeline = Some(PathBuf::from(value)),
            "--log" => options.log = PathBuf::from(value),
            "--fail-every" => {
                let every = value
                    .parse::<u32>()
                    .ok()
                    .and_then(NonZeroU32::new)
                    .ok_or_else(|| format!("Expected a positive count, got `{value}`"))?;
                options.fail_every = Some(every);
            }
            _ => return Err(format!("Unknown argument `{flag}`")),
        }
    }

    Ok(options)
}
