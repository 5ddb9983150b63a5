//! Camera trigger pulses.
//!
//! The trigger line idles high. A shutter pulse pulls it low briefly and
//! returns it high, re-arming the camera. Parking the camera at mission end
//! issues one more pulse, waits for the recording to close, and leaves the
//! line low.

use core::time::Duration;

use super::{ActuationKind, ActuationStep, ActuationTemplate, ActuatorId, OutputLevel};

/// Width of the low-going trigger pulse.
pub const SHUTTER_PULSE: Duration = Duration::from_millis(600);
/// Time the camera needs to finalize a recording after the stop pulse.
pub const PARK_SETTLE: Duration = Duration::from_secs(3);

pub const CAMERA_SHUTTER_STEPS: [ActuationStep; 2] = [
    ActuationStep::new(ActuatorId::CameraTrigger, OutputLevel::Low, SHUTTER_PULSE),
    ActuationStep::set(ActuatorId::CameraTrigger, OutputLevel::High),
];

pub const CAMERA_PARK_STEPS: [ActuationStep; 3] = [
    ActuationStep::new(ActuatorId::CameraTrigger, OutputLevel::Low, SHUTTER_PULSE),
    ActuationStep::new(ActuatorId::CameraTrigger, OutputLevel::High, PARK_SETTLE),
    ActuationStep::set(ActuatorId::CameraTrigger, OutputLevel::Low),
];

const CAMERA_SAFE_STATE: [ActuationStep; 1] = [ActuationStep::set(
    ActuatorId::CameraTrigger,
    OutputLevel::High,
)];

pub const CAMERA_SHUTTER_TEMPLATE: ActuationTemplate = ActuationTemplate::new(
    ActuationKind::CameraShutter,
    &CAMERA_SHUTTER_STEPS,
    &CAMERA_SAFE_STATE,
);

pub const CAMERA_PARK_TEMPLATE: ActuationTemplate = ActuationTemplate::new(
    ActuationKind::CameraPark,
    &CAMERA_PARK_STEPS,
    &CAMERA_SAFE_STATE,
);
