//! Sensor access, per-channel enables, and the decimated sampling cadence.
//!
//! Samples are taken fresh every time; nothing here caches a reading. A channel
//! whose enable flag is off produces [`Reading::Disabled`] without touching the
//! sensor, which is what keeps stale values out of the log.

use core::{fmt, time::Duration};

use crate::records::LogRecord;

pub mod pressure;

pub use pressure::{psi_from_raw, raw_for_psi};

/// Sensor channels present on the payload.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorChannel {
    Range,
    Temperature,
    PressureOutside,
    PressureInside,
}

impl SensorChannel {
    pub const ALL: [SensorChannel; 4] = [
        SensorChannel::Range,
        SensorChannel::Temperature,
        SensorChannel::PressureOutside,
        SensorChannel::PressureInside,
    ];

    #[must_use]
    pub const fn as_index(self) -> u16 {
        match self {
            SensorChannel::Range => 0,
            SensorChannel::Temperature => 1,
            SensorChannel::PressureOutside => 2,
            SensorChannel::PressureInside => 3,
        }
    }

    #[must_use]
    pub const fn from_index(index: u16) -> Option<Self> {
        match index {
            0 => Some(SensorChannel::Range),
            1 => Some(SensorChannel::Temperature),
            2 => Some(SensorChannel::PressureOutside),
            3 => Some(SensorChannel::PressureInside),
            _ => None,
        }
    }
}

impl fmt::Display for SensorChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorChannel::Range => f.write_str("range"),
            SensorChannel::Temperature => f.write_str("temperature"),
            SensorChannel::PressureOutside => f.write_str("pressure-outside"),
            SensorChannel::PressureInside => f.write_str("pressure-inside"),
        }
    }
}

/// Transient sensor failure; only the affected field is lost.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SensorReadError {
    /// Bus transaction failed (NACK, arbitration loss, timeout).
    Bus,
    /// The device did not finish a conversion in time.
    NotReady,
    /// The device reported a value outside its valid range.
    OutOfRange,
}

impl fmt::Display for SensorReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// Point-in-time sensor reads.
pub trait SensorBank {
    /// Distance to target in millimetres.
    ///
    /// # Errors
    ///
    /// Returns [`SensorReadError`] when no valid reading is available.
    fn read_range(&mut self) -> Result<u16, SensorReadError>;

    /// Ambient temperature in degrees Celsius.
    ///
    /// # Errors
    ///
    /// Returns [`SensorReadError`] when no valid reading is available.
    fn read_temperature(&mut self) -> Result<f32, SensorReadError>;

    /// Ambient (outside) pressure in hectopascals.
    ///
    /// # Errors
    ///
    /// Returns [`SensorReadError`] when no valid reading is available.
    fn read_pressure_outside(&mut self) -> Result<f32, SensorReadError>;

    /// Syringe transducer output on the 16-bit analog scale; see [`psi_from_raw`].
    ///
    /// # Errors
    ///
    /// Returns [`SensorReadError`] when no valid reading is available.
    fn read_pressure_inside_raw(&mut self) -> Result<u16, SensorReadError>;
}

impl<S: SensorBank + ?Sized> SensorBank for &mut S {
    fn read_range(&mut self) -> Result<u16, SensorReadError> {
        (**self).read_range()
    }

    fn read_temperature(&mut self) -> Result<f32, SensorReadError> {
        (**self).read_temperature()
    }

    fn read_pressure_outside(&mut self) -> Result<f32, SensorReadError> {
        (**self).read_pressure_outside()
    }

    fn read_pressure_inside_raw(&mut self) -> Result<u16, SensorReadError> {
        (**self).read_pressure_inside_raw()
    }
}

/// One field of a sample.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Reading<T> {
    Value(T),
    /// Channel switched off; the sensor was not read.
    Disabled,
    Faulted(SensorReadError),
}

impl<T> Reading<T> {
    fn read(enabled: bool, read: impl FnOnce() -> Result<T, SensorReadError>) -> Self {
        if !enabled {
            return Reading::Disabled;
        }
        match read() {
            Ok(value) => Reading::Value(value),
            Err(error) => Reading::Faulted(error),
        }
    }

    #[must_use]
    pub fn value(&self) -> Option<&T> {
        match self {
            Reading::Value(value) => Some(value),
            Reading::Disabled | Reading::Faulted(_) => None,
        }
    }

    #[must_use]
    pub const fn fault(&self) -> Option<SensorReadError> {
        match self {
            Reading::Faulted(error) => Some(*error),
            Reading::Value(_) | Reading::Disabled => None,
        }
    }
}

/// Per-channel sampling enables.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ChannelEnables {
    pub range: bool,
    pub temperature: bool,
    pub pressure_outside: bool,
    pub pressure_inside: bool,
}

impl ChannelEnables {
    pub const ALL: Self = Self {
        range: true,
        temperature: true,
        pressure_outside: true,
        pressure_inside: true,
    };

    pub const NONE: Self = Self {
        range: false,
        temperature: false,
        pressure_outside: false,
        pressure_inside: false,
    };

    #[must_use]
    pub const fn any(self) -> bool {
        self.range || self.temperature || self.pressure_outside || self.pressure_inside
    }

    #[must_use]
    pub const fn is_enabled(self, channel: SensorChannel) -> bool {
        match channel {
            SensorChannel::Range => self.range,
            SensorChannel::Temperature => self.temperature,
            SensorChannel::PressureOutside => self.pressure_outside,
            SensorChannel::PressureInside => self.pressure_inside,
        }
    }
}

/// Immutable snapshot of every channel at one instant.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SensorSample {
    /// Mission time the sample was taken.
    pub timestamp: Duration,
    pub range_mm: Reading<u16>,
    pub temperature_c: Reading<f32>,
    pub pressure_outside_hpa: Reading<f32>,
    pub pressure_inside_psi: Reading<f32>,
}

impl SensorSample {
    /// Reads every enabled channel once.
    pub fn capture<S: SensorBank + ?Sized>(
        sensors: &mut S,
        enables: ChannelEnables,
        timestamp: Duration,
    ) -> Self {
        Self {
            timestamp,
            range_mm: Reading::read(enables.range, || sensors.read_range()),
            temperature_c: Reading::read(enables.temperature, || sensors.read_temperature()),
            pressure_outside_hpa: Reading::read(enables.pressure_outside, || {
                sensors.read_pressure_outside()
            }),
            pressure_inside_psi: Reading::read(enables.pressure_inside, || {
                sensors.read_pressure_inside_raw().map(psi_from_raw)
            }),
        }
    }

    /// Channels that failed during capture.
    pub fn faults(&self) -> impl Iterator<Item = (SensorChannel, SensorReadError)> {
        [
            (SensorChannel::Range, self.range_mm.fault()),
            (SensorChannel::Temperature, self.temperature_c.fault()),
            (SensorChannel::PressureOutside, self.pressure_outside_hpa.fault()),
            (SensorChannel::PressureInside, self.pressure_inside_psi.fault()),
        ]
        .into_iter()
        .filter_map(|(channel, fault)| fault.map(|error| (channel, error)))
    }
}

/// Integer-modulus cadence on the tick counter.
///
/// Ticks count from 0 on the first loop iteration. A tick is due when
/// `tick % modulus == phase`, so with sampling on for ticks `0..n` the number
/// of due ticks is `(n - 1 - phase) / modulus + 1` for `n > phase`, else 0.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Decimation {
    pub modulus: u32,
    pub phase: u32,
}

impl Decimation {
    pub const EVERY_TICK: Self = Self::new(1, 0);

    #[must_use]
    pub const fn new(modulus: u32, phase: u32) -> Self {
        Self { modulus, phase }
    }

    /// A zero modulus is never due.
    #[must_use]
    pub const fn is_due(self, tick: u32) -> bool {
        match tick.checked_rem(self.modulus) {
            Some(remainder) => remainder == self.phase,
            None => false,
        }
    }

    /// Due ticks in `0..ticks`.
    #[must_use]
    pub const fn due_count(self, ticks: u32) -> u32 {
        if self.modulus == 0 || ticks <= self.phase {
            0
        } else {
            (ticks - 1 - self.phase) / self.modulus + 1
        }
    }
}

/// Produces periodic records on a [`Decimation`] cadence.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DecimatedLogger {
    cadence: Decimation,
    emitted: u32,
}

impl DecimatedLogger {
    #[must_use]
    pub const fn new(cadence: Decimation) -> Self {
        Self { cadence, emitted: 0 }
    }

    #[must_use]
    pub const fn cadence(&self) -> Decimation {
        self.cadence
    }

    /// Periodic records produced so far.
    #[must_use]
    pub const fn emitted(&self) -> u32 {
        self.emitted
    }

    /// Samples and returns a periodic record when `tick` is due and at least
    /// one channel is enabled.
    pub fn poll<S: SensorBank + ?Sized>(
        &mut self,
        tick: u32,
        enables: ChannelEnables,
        timestamp: Duration,
        sensors: &mut S,
    ) -> Option<LogRecord> {
        if !enables.any() || !self.cadence.is_due(tick) {
            return None;
        }
        self.emitted = self.emitted.saturating_add(1);
        Some(LogRecord::periodic(SensorSample::capture(
            sensors, enables, timestamp,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingSensors {
        reads: u32,
        fail_temperature: bool,
    }

    impl SensorBank for CountingSensors {
        fn read_range(&mut self) -> Result<u16, SensorReadError> {
            self.reads += 1;
            Ok(142)
        }

        fn read_temperature(&mut self) -> Result<f32, SensorReadError> {
            self.reads += 1;
            if self.fail_temperature {
                Err(SensorReadError::Bus)
            } else {
                Ok(21.5)
            }
        }

        fn read_pressure_outside(&mut self) -> Result<f32, SensorReadError> {
            self.reads += 1;
            Ok(1_013.25)
        }

        fn read_pressure_inside_raw(&mut self) -> Result<u16, SensorReadError> {
            self.reads += 1;
            Ok(raw_for_psi(14.7))
        }
    }

    fn sensors() -> CountingSensors {
        CountingSensors {
            reads: 0,
            fail_temperature: false,
        }
    }

    #[test]
    fn disabled_channels_are_not_read() {
        let mut bank = sensors();
        let enables = ChannelEnables {
            range: true,
            ..ChannelEnables::NONE
        };
        let sample = SensorSample::capture(&mut bank, enables, Duration::from_secs(1));

        assert_eq!(bank.reads, 1);
        assert_eq!(sample.range_mm, Reading::Value(142));
        assert_eq!(sample.temperature_c, Reading::Disabled);
        assert_eq!(sample.pressure_outside_hpa, Reading::Disabled);
        assert_eq!(sample.pressure_inside_psi, Reading::Disabled);
    }

    #[test]
    fn faulted_channel_does_not_block_others() {
        let mut bank = CountingSensors {
            reads: 0,
            fail_temperature: true,
        };
        let sample = SensorSample::capture(&mut bank, ChannelEnables::ALL, Duration::ZERO);

        assert_eq!(sample.temperature_c, Reading::Faulted(SensorReadError::Bus));
        assert_eq!(sample.range_mm, Reading::Value(142));
        let faults: heapless::Vec<_, 4> = sample.faults().collect();
        assert_eq!(
            faults.as_slice(),
            &[(SensorChannel::Temperature, SensorReadError::Bus)]
        );
        let inside = sample.pressure_inside_psi.value().copied().expect("inside pressure");
        assert!((inside - 14.7).abs() < 0.01);
    }

    #[test]
    fn decimation_matches_closed_form_count() {
        for (modulus, phase) in [(1, 0), (3, 0), (3, 2), (100, 0), (100, 1), (7, 6)] {
            let cadence = Decimation::new(modulus, phase);
            for ticks in [0_u32, 1, 2, 3, 99, 100, 101, 250, 1_000] {
                let counted = u32::try_from((0..ticks).filter(|tick| cadence.is_due(*tick)).count())
                    .expect("count fits");
                assert_eq!(counted, cadence.due_count(ticks), "K={modulus} o={phase} N={ticks}");
            }
        }
    }

    #[test]
    fn zero_modulus_is_never_due() {
        let cadence = Decimation::new(0, 0);
        assert!(!cadence.is_due(0));
        assert_eq!(cadence.due_count(50), 0);
    }

    #[test]
    fn logger_emits_on_cadence_only_while_enabled() {
        let mut bank = sensors();
        let mut logger = DecimatedLogger::new(Decimation::new(100, 0));

        let mut records = 0;
        for tick in 0..250 {
            if logger
                .poll(tick, ChannelEnables::ALL, Duration::ZERO, &mut bank)
                .is_some()
            {
                records += 1;
            }
        }
        assert_eq!(records, 3);

        for tick in 250..600 {
            assert!(
                logger
                    .poll(tick, ChannelEnables::NONE, Duration::ZERO, &mut bank)
                    .is_none()
            );
        }
        assert_eq!(logger.emitted(), 3);
        assert_eq!(bank.reads, 12);
    }
}
