//! Named timing configurations.
//!
//! Two flight configurations exist and neither is canonical. `FLIGHT` waits
//! for the coast window, fires the camera once, and logs every hundredth
//! tick. `CONTINUOUS` opens the window slightly earlier, logs every tick, and
//! keeps the shutter pulsing for as long as the camera is enabled.

use core::{fmt, time::Duration};

use crate::sampling::Decimation;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct MissionProfile {
    /// Fallback for `AwaitingWindow -> Active` when no coast-start arrives.
    pub phase_start: Duration,
    /// Fallback for `Active -> Complete` when no coast-end arrives.
    pub phase_end: Duration,
    pub decimation: Decimation,
    /// Re-issue the shutter pulse on every tick while the camera is enabled.
    pub camera_retrigger: bool,
}

impl MissionProfile {
    pub const FLIGHT: Self = Self {
        phase_start: Duration::from_secs(200),
        phase_end: Duration::from_secs(385),
        decimation: Decimation::new(100, 0),
        camera_retrigger: false,
    };

    pub const CONTINUOUS: Self = Self {
        phase_start: Duration::from_secs(195),
        phase_end: Duration::from_secs(385),
        decimation: Decimation::EVERY_TICK,
        camera_retrigger: true,
    };

    /// Looks up a preset by name, ignoring case.
    #[must_use]
    pub fn by_name(name: &str) -> Option<Self> {
        if name.eq_ignore_ascii_case("flight") {
            Some(Self::FLIGHT)
        } else if name.eq_ignore_ascii_case("continuous") {
            Some(Self::CONTINUOUS)
        } else {
            None
        }
    }

    /// Checks the invariants the sequencer relies on.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint.
    pub fn validate(&self) -> Result<(), ProfileError> {
        if self.phase_end <= self.phase_start {
            return Err(ProfileError::EmptyWindow);
        }
        if self.decimation.modulus == 0 {
            return Err(ProfileError::ZeroModulus);
        }
        if self.decimation.phase >= self.decimation.modulus {
            return Err(ProfileError::DecimationPhaseOutOfRange);
        }
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ProfileError {
    /// `phase_end` does not come after `phase_start`.
    EmptyWindow,
    ZeroModulus,
    /// The decimation offset can never match.
    DecimationPhaseOutOfRange,
}

impl fmt::Display for ProfileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
