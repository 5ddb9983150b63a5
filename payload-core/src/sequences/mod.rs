//! Actuator catalog and pulse templates shared by firmware and host targets.
//!
//! A template is a const list of output steps, each optionally followed by a
//! blocking hold. Templates also name the safe state driven when a step fails
//! part-way, so a half-finished pulse never leaves the valve open or the motor
//! running.

use core::{fmt, time::Duration};

pub mod camera;
pub mod motor;

pub use camera::{CAMERA_PARK_TEMPLATE, CAMERA_SHUTTER_TEMPLATE};
pub use motor::MOTOR_SOLENOID_TEMPLATE;

/// Logical outputs driven by the payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuatorId {
    Solenoid,
    Motor,
    LedPrimary,
    LedSecondary,
    CameraTrigger,
}

impl ActuatorId {
    /// Deterministic index for lookups into [`ALL_ACTUATORS`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            ActuatorId::Solenoid => 0,
            ActuatorId::Motor => 1,
            ActuatorId::LedPrimary => 2,
            ActuatorId::LedSecondary => 3,
            ActuatorId::CameraTrigger => 4,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(ActuatorId::Solenoid),
            1 => Some(ActuatorId::Motor),
            2 => Some(ActuatorId::LedPrimary),
            3 => Some(ActuatorId::LedSecondary),
            4 => Some(ActuatorId::CameraTrigger),
            _ => None,
        }
    }
}

impl fmt::Display for ActuatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(actuator_by_id(*self).name)
    }
}

/// Electrical level of an output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OutputLevel {
    Low,
    High,
}

impl OutputLevel {
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, OutputLevel::High)
    }

    /// `1` for high, `0` for low.
    #[must_use]
    pub const fn as_bit(self) -> u16 {
        match self {
            OutputLevel::Low => 0,
            OutputLevel::High => 1,
        }
    }

    #[must_use]
    pub const fn from_bool(high: bool) -> Self {
        if high { OutputLevel::High } else { OutputLevel::Low }
    }
}

impl fmt::Display for OutputLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputLevel::Low => f.write_str("low"),
            OutputLevel::High => f.write_str("high"),
        }
    }
}

/// Board routing for one output.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuatorLine {
    pub id: ActuatorId,
    pub name: &'static str,
    pub mcu_pin: &'static str,
    /// Level driven at power-up and whenever the output is released.
    pub idle: OutputLevel,
}

impl ActuatorLine {
    #[must_use]
    pub const fn new(
        id: ActuatorId,
        name: &'static str,
        mcu_pin: &'static str,
        idle: OutputLevel,
    ) -> Self {
        Self {
            id,
            name,
            mcu_pin,
            idle,
        }
    }
}

/// Compile-time catalog of every payload output.
pub const ALL_ACTUATORS: [ActuatorLine; 5] = [
    ActuatorLine::new(ActuatorId::Solenoid, "solenoid", "PB3", OutputLevel::Low),
    ActuatorLine::new(ActuatorId::Motor, "motor", "PB4", OutputLevel::Low),
    ActuatorLine::new(ActuatorId::LedPrimary, "led-1", "PA8", OutputLevel::Low),
    ActuatorLine::new(ActuatorId::LedSecondary, "led-2", "PA9", OutputLevel::Low),
    // The camera board fires on a falling edge, so the trigger idles high.
    ActuatorLine::new(ActuatorId::CameraTrigger, "cam-trig", "PA10", OutputLevel::High),
];

/// Retrieve output metadata by identifier.
#[must_use]
pub const fn actuator_by_id(id: ActuatorId) -> ActuatorLine {
    ALL_ACTUATORS[id.as_index()]
}

/// One output change followed by an optional blocking hold.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuationStep {
    pub output: ActuatorId,
    pub level: OutputLevel,
    pub hold_for: Duration,
}

impl ActuationStep {
    #[must_use]
    pub const fn new(output: ActuatorId, level: OutputLevel, hold_for: Duration) -> Self {
        Self {
            output,
            level,
            hold_for,
        }
    }

    /// Step with no hold afterwards.
    #[must_use]
    pub const fn set(output: ActuatorId, level: OutputLevel) -> Self {
        Self::new(output, level, Duration::ZERO)
    }
}

/// Which pulse protocol a template implements.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ActuationKind {
    MotorSolenoid,
    CameraShutter,
    CameraPark,
}

impl ActuationKind {
    #[must_use]
    pub const fn as_index(self) -> u16 {
        match self {
            ActuationKind::MotorSolenoid => 0,
            ActuationKind::CameraShutter => 1,
            ActuationKind::CameraPark => 2,
        }
    }

    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(ActuationKind::MotorSolenoid),
            1 => Some(ActuationKind::CameraShutter),
            2 => Some(ActuationKind::CameraPark),
            _ => None,
        }
    }
}

impl fmt::Display for ActuationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuationKind::MotorSolenoid => f.write_str("motor-solenoid"),
            ActuationKind::CameraShutter => f.write_str("camera-shutter"),
            ActuationKind::CameraPark => f.write_str("camera-park"),
        }
    }
}

/// Immutable pulse protocol.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct ActuationTemplate {
    pub kind: ActuationKind,
    pub steps: &'static [ActuationStep],
    /// Levels forced, in order, when a step fails.
    pub safe_state: &'static [ActuationStep],
}

impl ActuationTemplate {
    #[must_use]
    pub const fn new(
        kind: ActuationKind,
        steps: &'static [ActuationStep],
        safe_state: &'static [ActuationStep],
    ) -> Self {
        Self {
            kind,
            steps,
            safe_state,
        }
    }

    #[must_use]
    pub const fn steps(&self) -> &'static [ActuationStep] {
        self.steps
    }

    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Sum of every hold in the template.
    #[must_use]
    pub fn total_hold(&self) -> Duration {
        self.steps.iter().map(|step| step.hold_for).sum()
    }

    /// Level each output is left at once the template completes.
    #[must_use]
    pub fn final_level(&self, output: ActuatorId) -> Option<OutputLevel> {
        self.steps
            .iter()
            .rev()
            .find(|step| step.output == output)
            .map(|step| step.level)
    }
}
