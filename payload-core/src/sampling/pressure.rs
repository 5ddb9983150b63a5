//! Syringe pressure transducer conversion.
//!
//! The transducer outputs 0.46 V at zero gauge pressure and 3.47 bar per volt
//! above that. Readings arrive on the 16-bit analog scale of a 5 V reference.

const FULL_SCALE_COUNTS: f32 = 65_536.0;
const REFERENCE_VOLTS: f32 = 5.0;
const ZERO_OFFSET_VOLTS: f32 = 0.46;
const PASCALS_PER_VOLT: f32 = 3.47 * 100_000.0;
const PASCALS_PER_PSI: f32 = 6_894.76;

/// Converts raw analog counts to gauge pressure in psi.
#[must_use]
pub fn psi_from_raw(raw: u16) -> f32 {
    let volts = f32::from(raw) * REFERENCE_VOLTS / FULL_SCALE_COUNTS;
    let pascals = PASCALS_PER_VOLT * (volts - ZERO_OFFSET_VOLTS);
    pascals / PASCALS_PER_PSI
}

/// Inverse of [`psi_from_raw`], rounded to the nearest count and clamped to
/// the converter's range.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn raw_for_psi(psi: f32) -> u16 {
    let volts = psi * PASCALS_PER_PSI / PASCALS_PER_VOLT + ZERO_OFFSET_VOLTS;
    let counts = volts * FULL_SCALE_COUNTS / REFERENCE_VOLTS + 0.5;
    // Float-to-int `as` saturates, so the clamp only keeps NaN out.
    if counts.is_nan() {
        0
    } else {
        counts.clamp(0.0, f32::from(u16::MAX)) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // One count is ~0.0038 psi.
    const TOLERANCE: f32 = 0.02;

    #[test]
    fn round_trip_across_sensor_range() {
        for psi in [-20.0_f32, -5.5, 0.0, 1.0, 14.7, 50.0, 100.0, 180.25, 225.0] {
            let back = psi_from_raw(raw_for_psi(psi));
            assert!(
                (back - psi).abs() <= TOLERANCE,
                "psi {psi} round-tripped to {back}"
            );
        }
    }

    #[test]
    fn range_endpoints_are_finite() {
        let low = psi_from_raw(0);
        let high = psi_from_raw(u16::MAX);
        assert!(low.is_finite());
        assert!(high.is_finite());
        assert!((low - -23.151).abs() < 0.01, "low end {low}");
        assert!((high - 228.51).abs() < 0.05, "high end {high}");
    }

    #[test]
    fn zero_offset_maps_to_zero_psi() {
        let raw = raw_for_psi(0.0);
        assert!(psi_from_raw(raw).abs() <= TOLERANCE);
        assert_eq!(raw, 6_029);
    }

    #[test]
    fn out_of_range_pressures_clamp() {
        assert_eq!(raw_for_psi(-1_000.0), 0);
        assert_eq!(raw_for_psi(1_000.0), u16::MAX);
        assert_eq!(raw_for_psi(f32::NAN), 0);
    }
}
