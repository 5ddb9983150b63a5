//! VL6180X time-of-flight range sensor, single-shot mode.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

pub const DEFAULT_ADDRESS: u8 = 0x29;
const MODEL_ID: u8 = 0xB4;

const REG_IDENTIFICATION_MODEL_ID: u16 = 0x0000;
const REG_SYSTEM_INTERRUPT_CLEAR: u16 = 0x0015;
const REG_SYSTEM_FRESH_OUT_OF_RESET: u16 = 0x0016;
const REG_SYSRANGE_START: u16 = 0x0018;
const REG_RESULT_RANGE_STATUS: u16 = 0x004D;
const REG_RESULT_INTERRUPT_STATUS_GPIO: u16 = 0x004F;
const REG_RESULT_RANGE_VAL: u16 = 0x0062;

const RANGE_DEVICE_READY: u8 = 0x01;
const RANGE_NEW_SAMPLE_READY: u8 = 0x04;
const CLEAR_ALL_INTERRUPTS: u8 = 0x07;

const POLL_INTERVAL_US: u32 = 500;
/// Single-shot conversions finish well inside 15 ms with default settings.
const MAX_POLLS: u32 = 40;

/// Private tuning registers from ST application note AN4545, loaded once after reset.
const TUNING: [(u16, u8); 30] = [
    (0x0207, 0x01),
    (0x0208, 0x01),
    (0x0096, 0x00),
    (0x0097, 0xFD),
    (0x00E3, 0x00),
    (0x00E4, 0x04),
    (0x00E5, 0x02),
    (0x00E6, 0x01),
    (0x00E7, 0x03),
    (0x00F5, 0x02),
    (0x00D9, 0x05),
    (0x00DB, 0xCE),
    (0x00DC, 0x03),
    (0x00DD, 0xF8),
    (0x009F, 0x00),
    (0x00A3, 0x3C),
    (0x00B7, 0x00),
    (0x00BB, 0x3C),
    (0x00B2, 0x09),
    (0x00CA, 0x09),
    (0x0198, 0x01),
    (0x01B0, 0x17),
    (0x01AD, 0x00),
    (0x00FF, 0x05),
    (0x0100, 0x05),
    (0x0199, 0x05),
    (0x01A6, 0x1B),
    (0x01AC, 0x3E),
    (0x01A7, 0x1F),
    (0x0030, 0x00),
];

/// Recommended public settings: interrupt on new sample, averaging, ALS gain,
/// range check interval, ALS period, calibration period, range timing.
const PUBLIC_SETTINGS: [(u16, u8); 9] = [
    (0x0011, 0x10),
    (0x010A, 0x30),
    (0x003F, 0x46),
    (0x0031, 0xFF),
    (0x0041, 0x63),
    (0x002E, 0x01),
    (0x001B, 0x09),
    (0x003E, 0x31),
    (0x0014, 0x24),
];

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Vl6180xError<E> {
    Bus(E),
    /// Identification register did not read back the VL6180X model id.
    WrongModel(u8),
    /// The device did not become ready or finish a measurement in time.
    Timeout,
    /// Measurement completed with a non-zero error code (upper status nibble).
    RangeStatus(u8),
}

pub struct Vl6180x<I2C, D> {
    i2c: I2C,
    delay: D,
    address: u8,
}

impl<I2C: I2c, D: DelayNs> Vl6180x<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self::with_address(i2c, delay, DEFAULT_ADDRESS)
    }

    pub fn with_address(i2c: I2C, delay: D, address: u8) -> Self {
        Self {
            i2c,
            delay,
            address,
        }
    }

    /// Checks the model id and applies the tuning tables after a fresh reset.
    ///
    /// # Errors
    ///
    /// Bus failures or a model id mismatch.
    pub fn init(&mut self) -> Result<(), Vl6180xError<I2C::Error>> {
        let model = self.read_register(REG_IDENTIFICATION_MODEL_ID)?;
        if model != MODEL_ID {
            return Err(Vl6180xError::WrongModel(model));
        }

        if self.read_register(REG_SYSTEM_FRESH_OUT_OF_RESET)? & 0x01 != 0 {
            for (register, value) in TUNING.iter().chain(PUBLIC_SETTINGS.iter()) {
                self.write_register(*register, *value)?;
            }
            self.write_register(REG_SYSTEM_FRESH_OUT_OF_RESET, 0x00)?;
        }
        Ok(())
    }

    /// Takes one range measurement in millimetres.
    ///
    /// # Errors
    ///
    /// Bus failures, a timeout waiting on the device, or a device-reported
    /// range error.
    pub fn read_range(&mut self) -> Result<u8, Vl6180xError<I2C::Error>> {
        self.wait_for(REG_RESULT_RANGE_STATUS, RANGE_DEVICE_READY)?;
        self.write_register(REG_SYSRANGE_START, 0x01)?;
        self.wait_for(REG_RESULT_INTERRUPT_STATUS_GPIO, RANGE_NEW_SAMPLE_READY)?;

        let range = self.read_register(REG_RESULT_RANGE_VAL)?;
        self.write_register(REG_SYSTEM_INTERRUPT_CLEAR, CLEAR_ALL_INTERRUPTS)?;

        let status = self.read_register(REG_RESULT_RANGE_STATUS)? >> 4;
        if status != 0 {
            return Err(Vl6180xError::RangeStatus(status));
        }
        Ok(range)
    }

    fn wait_for(&mut self, register: u16, mask: u8) -> Result<(), Vl6180xError<I2C::Error>> {
        for _ in 0..MAX_POLLS {
            if self.read_register(register)? & mask != 0 {
                return Ok(());
            }
            self.delay.delay_us(POLL_INTERVAL_US);
        }
        Err(Vl6180xError::Timeout)
    }

    fn read_register(&mut self, register: u16) -> Result<u8, Vl6180xError<I2C::Error>> {
        let mut value = [0u8; 1];
        self.i2c
            .write_read(self.address, &register.to_be_bytes(), &mut value)
            .map_err(Vl6180xError::Bus)?;
        Ok(value[0])
    }

    fn write_register(
        &mut self,
        register: u16,
        value: u8,
    ) -> Result<(), Vl6180xError<I2C::Error>> {
        let [high, low] = register.to_be_bytes();
        self.i2c
            .write(self.address, &[high, low, value])
            .map_err(Vl6180xError::Bus)
    }
}
