//! Solenoid and drive-motor pulse.
//!
//! The valve opens first so the motor never pushes against a closed line,
//! then both run together for the full hold and shut down motor-first.

use core::time::Duration;

use super::{ActuationKind, ActuationStep, ActuationTemplate, ActuatorId, OutputLevel};

/// How long the valve stays open with the motor running.
pub const MOTOR_HOLD: Duration = Duration::from_secs(16);

/// Ordered steps of the motor and solenoid run.
pub const MOTOR_SOLENOID_STEPS: [ActuationStep; 4] = [
    ActuationStep::set(ActuatorId::Solenoid, OutputLevel::High),
    ActuationStep::new(ActuatorId::Motor, OutputLevel::High, MOTOR_HOLD),
    ActuationStep::set(ActuatorId::Motor, OutputLevel::Low),
    ActuationStep::set(ActuatorId::Solenoid, OutputLevel::Low),
];

/// De-energized state: motor stopped, valve closed.
pub const MOTOR_SOLENOID_SAFE_STATE: [ActuationStep; 2] = [
    ActuationStep::set(ActuatorId::Motor, OutputLevel::Low),
    ActuationStep::set(ActuatorId::Solenoid, OutputLevel::Low),
];

pub const MOTOR_SOLENOID_TEMPLATE: ActuationTemplate = ActuationTemplate::new(
    ActuationKind::MotorSolenoid,
    &MOTOR_SOLENOID_STEPS,
    &MOTOR_SOLENOID_SAFE_STATE,
);
