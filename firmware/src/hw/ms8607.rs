//! MS8607 pressure/temperature half, blocking over any `embedded-hal` I2C bus.
//!
//! Readings use the datasheet's first-order compensation on the factory PROM
//! coefficients. The PROM is loaded and CRC-checked once in [`Ms8607::init`].

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

/// Fixed address of the pressure/temperature die.
pub const PT_ADDRESS: u8 = 0x76;

const CMD_RESET: u8 = 0x1E;
const CMD_PROM_READ: u8 = 0xA0;
const CMD_CONVERT_D1_OSR4096: u8 = 0x48;
const CMD_CONVERT_D2_OSR4096: u8 = 0x58;
const CMD_ADC_READ: u8 = 0x00;

const PROM_WORDS: usize = 7;
const RESET_SETTLE_MS: u32 = 15;
/// Worst-case conversion time at OSR 4096 is 8.61 ms.
const CONVERSION_MS: u32 = 10;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Ms8607Error<E> {
    Bus(E),
    /// PROM contents failed the CRC-4 check.
    Calibration,
    /// Read attempted before a successful [`Ms8607::init`].
    NotInitialized,
    /// The ADC returned 0, meaning a conversion was still running.
    ConversionPending,
}

/// Factory coefficients C1..C6 in datasheet order.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Calibration {
    pub c: [u16; 6],
}

impl Calibration {
    /// Validates the PROM image (word 0 carries the CRC in its top nibble).
    #[must_use]
    pub fn from_prom(prom: &[u16; PROM_WORDS]) -> Option<Self> {
        if crc4(prom) != prom[0] >> 12 {
            return None;
        }
        let mut c = [0; 6];
        c.copy_from_slice(&prom[1..]);
        Some(Self { c })
    }

    /// Raw conversions to (hundredths of degC, hundredths of mbar).
    #[must_use]
    pub fn compensate(&self, d1: u32, d2: u32) -> Compensated {
        let [c1, c2, c3, c4, c5, c6] = self.c.map(i64::from);
        let d1 = i64::from(d1);
        let d2 = i64::from(d2);

        let dt = d2 - (c5 << 8);
        let temp = 2000 + ((dt * c6) >> 23);
        let off = (c2 << 17) + ((c4 * dt) >> 6);
        let sens = (c1 << 16) + ((c3 * dt) >> 7);
        let pressure = (((d1 * sens) >> 21) - off) >> 15;

        Compensated {
            centi_celsius: temp,
            centi_mbar: pressure,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Compensated {
    pub centi_celsius: i64,
    pub centi_mbar: i64,
}

impl Compensated {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn celsius(&self) -> f32 {
        self.centi_celsius as f32 / 100.0
    }

    /// Pressure in hPa (1 mbar = 1 hPa).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hectopascals(&self) -> f32 {
        self.centi_mbar as f32 / 100.0
    }
}

/// CRC-4 over the seven PROM words, per TE application note AN520.
fn crc4(prom: &[u16; PROM_WORDS]) -> u16 {
    let mut words = [0u16; PROM_WORDS + 1];
    words[..PROM_WORDS].copy_from_slice(prom);
    words[0] &= 0x0FFF;

    let mut remainder: u16 = 0;
    for count in 0..16 {
        let word = words[count >> 1];
        remainder ^= if count % 2 == 1 { word & 0x00FF } else { word >> 8 };
        for _ in 0..8 {
            remainder = if remainder & 0x8000 == 0 {
                remainder << 1
            } else {
                (remainder << 1) ^ 0x3000
            };
        }
    }
    (remainder >> 12) & 0x000F
}

pub struct Ms8607<I2C, D> {
    i2c: I2C,
    delay: D,
    calibration: Option<Calibration>,
}

impl<I2C: I2c, D: DelayNs> Ms8607<I2C, D> {
    pub fn new(i2c: I2C, delay: D) -> Self {
        Self {
            i2c,
            delay,
            calibration: None,
        }
    }

    /// Resets the die and loads the PROM.
    ///
    /// # Errors
    ///
    /// Bus failures, or [`Ms8607Error::Calibration`] on a PROM CRC mismatch.
    pub fn init(&mut self) -> Result<Calibration, Ms8607Error<I2C::Error>> {
        self.i2c
            .write(PT_ADDRESS, &[CMD_RESET])
            .map_err(Ms8607Error::Bus)?;
        self.delay.delay_ms(RESET_SETTLE_MS);

        let mut prom = [0u16; PROM_WORDS];
        for (index, word) in (0u8..).zip(prom.iter_mut()) {
            let mut bytes = [0u8; 2];
            self.i2c
                .write_read(PT_ADDRESS, &[CMD_PROM_READ + index * 2], &mut bytes)
                .map_err(Ms8607Error::Bus)?;
            *word = u16::from_be_bytes(bytes);
        }

        let calibration = Calibration::from_prom(&prom).ok_or(Ms8607Error::Calibration)?;
        self.calibration = Some(calibration);
        Ok(calibration)
    }

    #[must_use]
    pub const fn calibration(&self) -> Option<Calibration> {
        self.calibration
    }

    /// Runs one pressure and one temperature conversion.
    ///
    /// # Errors
    ///
    /// Bus failures, a missing calibration, or a conversion that had not
    /// finished when read back.
    pub fn measure(&mut self) -> Result<Compensated, Ms8607Error<I2C::Error>> {
        let calibration = self.calibration.ok_or(Ms8607Error::NotInitialized)?;
        let d1 = self.convert(CMD_CONVERT_D1_OSR4096)?;
        let d2 = self.convert(CMD_CONVERT_D2_OSR4096)?;
        Ok(calibration.compensate(d1, d2))
    }

    fn convert(&mut self, command: u8) -> Result<u32, Ms8607Error<I2C::Error>> {
        self.i2c
            .write(PT_ADDRESS, &[command])
            .map_err(Ms8607Error::Bus)?;
        self.delay.delay_ms(CONVERSION_MS);

        let mut bytes = [0u8; 3];
        self.i2c
            .write_read(PT_ADDRESS, &[CMD_ADC_READ], &mut bytes)
            .map_err(Ms8607Error::Bus)?;
        match u32::from_be_bytes([0, bytes[0], bytes[1], bytes[2]]) {
            0 => Err(Ms8607Error::ConversionPending),
            raw => Ok(raw),
        }
    }
}
