use core::time::Duration;

use embassy_time::{Instant, Timer};
use payload_core::clock::{Hold, MissionClock};
use payload_core::sequencer::MissionPhase;

use super::FirmwareSequencer;
use crate::telemetry::TelemetryMirror;

/// Pause between mission ticks.
pub const TICK_PERIOD: embassy_time::Duration = embassy_time::Duration::from_millis(100);

/// Mission time measured from boot on the Embassy time driver.
pub struct EmbassyClock {
    start: Instant,
}

impl EmbassyClock {
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl MissionClock for EmbassyClock {
    fn now(&self) -> Duration {
        Duration::from_micros(self.start.elapsed().as_micros())
    }
}

/// Busy-waits through actuation holds; the mission task owns the core while
/// a sequence runs.
pub struct EmbassyHold;

impl Hold for EmbassyHold {
    fn hold(&mut self, duration: Duration) {
        let micros = u64::try_from(duration.as_micros()).unwrap_or(u64::MAX);
        embassy_time::block_for(embassy_time::Duration::from_micros(micros));
    }
}

#[embassy_executor::task]
pub async fn run(mut mission: FirmwareSequencer) -> ! {
    let mut mirror = TelemetryMirror::new();
    let mut announced_complete = false;

    loop {
        let report = mission.tick();
        mirror.drain(mission.telemetry());

        if report.phase == MissionPhase::Complete && !announced_complete {
            announced_complete = true;
            defmt::info!(
                "mission: complete after {} ticks, {} records written, {} lost",
                report.tick,
                mission.journal().written(),
                mission.journal().lost()
            );
        }

        Timer::after(TICK_PERIOD).await;
    }
}
