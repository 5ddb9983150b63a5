//! Board bindings for the payload sensors and output lines.
//!
//! [`PayloadSensors`] is generic over the bus drivers so the error mapping can
//! be exercised on the host; the GPIO and ADC wrappers only exist on target.

pub mod ms8607;
pub mod vl6180x;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use payload_core::sampling::{SensorBank, SensorReadError};

use self::ms8607::{Compensated, Ms8607, Ms8607Error};
use self::vl6180x::{Vl6180x, Vl6180xError};

/// Blocking single-channel ADC read at the converter's native 12-bit width.
pub trait SyringeAdc {
    fn read_12bit(&mut self) -> u16;
}

/// Scales a 12-bit conversion onto the 16-bit analog scale used by the
/// pressure transfer function.
#[must_use]
pub const fn widen_12bit(raw: u16) -> u16 {
    (raw & 0x0FFF) << 4
}

impl<E> From<Vl6180xError<E>> for SensorReadError {
    fn from(error: Vl6180xError<E>) -> Self {
        match error {
            Vl6180xError::Bus(_) | Vl6180xError::WrongModel(_) => SensorReadError::Bus,
            Vl6180xError::Timeout => SensorReadError::NotReady,
            Vl6180xError::RangeStatus(_) => SensorReadError::OutOfRange,
        }
    }
}

impl<E> From<Ms8607Error<E>> for SensorReadError {
    fn from(error: Ms8607Error<E>) -> Self {
        match error {
            Ms8607Error::Bus(_) | Ms8607Error::Calibration => SensorReadError::Bus,
            Ms8607Error::NotInitialized | Ms8607Error::ConversionPending => {
                SensorReadError::NotReady
            }
        }
    }
}

/// Range, temperature/pressure and syringe transducer behind one bank.
///
/// Temperature and outside pressure come from the same MS8607 conversion, so
/// each read triggers its own conversion pair; channels stay independent.
pub struct PayloadSensors<R, P, S, D> {
    range: Vl6180x<R, D>,
    pressure: Ms8607<P, D>,
    syringe: S,
}

impl<R, P, S, D> PayloadSensors<R, P, S, D>
where
    R: I2c,
    P: I2c,
    S: SyringeAdc,
    D: DelayNs,
{
    pub fn new(range: Vl6180x<R, D>, pressure: Ms8607<P, D>, syringe: S) -> Self {
        Self {
            range,
            pressure,
            syringe,
        }
    }

    /// Brings both I2C devices up. Failures leave the device unconfigured;
    /// its channel then reports faults per sample instead of halting boot.
    pub fn init(&mut self) -> (Result<(), SensorReadError>, Result<(), SensorReadError>) {
        let range = self.range.init().map_err(SensorReadError::from);
        let pressure = self
            .pressure
            .init()
            .map(|_| ())
            .map_err(SensorReadError::from);
        (range, pressure)
    }

    fn measure(&mut self) -> Result<Compensated, SensorReadError> {
        Ok(self.pressure.measure()?)
    }
}

impl<R, P, S, D> SensorBank for PayloadSensors<R, P, S, D>
where
    R: I2c,
    P: I2c,
    S: SyringeAdc,
    D: DelayNs,
{
    fn read_range(&mut self) -> Result<u16, SensorReadError> {
        Ok(u16::from(self.range.read_range()?))
    }

    fn read_temperature(&mut self) -> Result<f32, SensorReadError> {
        self.measure().map(|reading| reading.celsius())
    }

    fn read_pressure_outside(&mut self) -> Result<f32, SensorReadError> {
        self.measure().map(|reading| reading.hectopascals())
    }

    fn read_pressure_inside_raw(&mut self) -> Result<u16, SensorReadError> {
        Ok(widen_12bit(self.syringe.read_12bit()))
    }
}

#[cfg(target_os = "none")]
pub use self::board::{AdcSyringe, BoardActuators, idle_level};

#[cfg(target_os = "none")]
mod board {
    use embassy_stm32::adc::{Adc, AnyAdcChannel, SampleTime};
    use embassy_stm32::gpio::{Level, Output};
    use embassy_stm32::peripherals::ADC1;
    use payload_core::actuation::{ActuatorBank, ActuatorWriteError, LedId};
    use payload_core::sequences::{ActuatorId, actuator_by_id};

    use super::SyringeAdc;

    /// Push-pull outputs for the solenoid, motor driver, LEDs and camera line.
    pub struct BoardActuators<'d> {
        solenoid: Output<'d>,
        motor: Output<'d>,
        led_primary: Output<'d>,
        led_secondary: Output<'d>,
        camera: Output<'d>,
    }

    impl<'d> BoardActuators<'d> {
        pub fn new(
            solenoid: Output<'d>,
            motor: Output<'d>,
            led_primary: Output<'d>,
            led_secondary: Output<'d>,
            camera: Output<'d>,
        ) -> Self {
            Self {
                solenoid,
                motor,
                led_primary,
                led_secondary,
                camera,
            }
        }
    }

    /// Level a line must be created at so boot never glitches an output.
    pub fn idle_level(id: ActuatorId) -> Level {
        if actuator_by_id(id).idle.is_high() {
            Level::High
        } else {
            Level::Low
        }
    }

    fn set(pin: &mut Output<'_>, high: bool) {
        if high {
            pin.set_high();
        } else {
            pin.set_low();
        }
    }

    impl ActuatorBank for BoardActuators<'_> {
        fn set_solenoid(&mut self, open: bool) -> Result<(), ActuatorWriteError> {
            set(&mut self.solenoid, open);
            Ok(())
        }

        fn set_motor(&mut self, running: bool) -> Result<(), ActuatorWriteError> {
            set(&mut self.motor, running);
            Ok(())
        }

        fn set_led(&mut self, led: LedId, on: bool) -> Result<(), ActuatorWriteError> {
            match led {
                LedId::Primary => set(&mut self.led_primary, on),
                LedId::Secondary => set(&mut self.led_secondary, on),
            }
            Ok(())
        }

        fn set_camera_trigger(&mut self, high: bool) -> Result<(), ActuatorWriteError> {
            set(&mut self.camera, high);
            Ok(())
        }
    }

    /// Syringe transducer on one ADC1 input.
    pub struct AdcSyringe<'d> {
        adc: Adc<'d, ADC1>,
        channel: AnyAdcChannel<ADC1>,
    }

    impl<'d> AdcSyringe<'d> {
        pub fn new(mut adc: Adc<'d, ADC1>, channel: AnyAdcChannel<ADC1>) -> Self {
            adc.set_sample_time(SampleTime::CYCLES160_5);
            Self { adc, channel }
        }
    }

    impl SyringeAdc for AdcSyringe<'_> {
        fn read_12bit(&mut self) -> u16 {
            self.adc.blocking_read(&mut self.channel)
        }
    }
}
