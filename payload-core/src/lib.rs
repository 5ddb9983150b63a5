#![no_std]

// Mission sequencing logic shared by the payload firmware and host tooling.
//
// Nothing in this crate touches hardware or the standard library. Sensors,
// actuators, storage, and the flight-event feed are reached through the traits
// defined here, so the same sequencer runs on the MCU and inside the emulator.

pub mod actuation;
pub mod clock;
pub mod events;
pub mod records;
pub mod sampling;
pub mod sequencer;
pub mod sequences;
pub mod telemetry;
