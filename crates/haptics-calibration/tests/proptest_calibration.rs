//! Property-based tests for calibration: volume mapping, clamps, offsets.

#[cfg(test)]
mod proptest_calibration {
    use haptics_calibration::{
        CalibrationProfile, ScaleClamp, VolumeRange, f0_offset_from_shift,
    };
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        // --- Volume mapping stays inside the calibrated range ---

        #[test]
        fn level_within_range(
            min in 0u32..=100,
            spread in 0u32..=100,
            intensity in 0.0f32..=1.0,
        ) {
            let max = (min + spread).min(100);
            let range = VolumeRange::new(min, max);
            let level = range.level_for(intensity);
            prop_assert!(level >= min, "level {} below min {}", level, min);
            prop_assert!(level <= max, "level {} above max {}", level, max);
        }

        // --- Volume mapping is monotonic in intensity ---

        #[test]
        fn level_monotonic(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
            let range = VolumeRange::new(5, 95);
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(range.level_for(lo) <= range.level_for(hi));
        }

        // --- Clamping is idempotent and bounded ---

        #[test]
        fn clamp_idempotent(lo in 0.0f32..=0.5, hi in 0.5f32..=1.0, scale in 0.0f32..=1.0) {
            let clamp = ScaleClamp::new(lo, hi);
            let once = clamp.apply(scale);
            prop_assert!(once >= lo && once <= hi);
            prop_assert!((clamp.apply(once) - once).abs() < f32::EPSILON);
        }

        // --- F0 offset stays inside the 24-bit field for valid shifts ---

        #[test]
        fn offset_fits_24_bits(shift in -1023i32..=1023) {
            let offset = f0_offset_from_shift(shift);
            prop_assert!(offset < (1 << 24));
            let profile = CalibrationProfile::default().with_long_frequency_shift(shift);
            prop_assert_eq!(profile.validate(), Ok(()));
            prop_assert_eq!(profile.f0_offset(), offset);
        }

        // --- Serde round-trip preserves the profile ---

        #[test]
        fn json_round_trip(shift in -1023i32..=1023, mask in 0u32..0x200, chirp in any::<bool>()) {
            let profile = CalibrationProfile::default()
                .with_long_frequency_shift(shift)
                .with_supported_primitives(mask)
                .with_chirp(chirp);
            let json = serde_json::to_string(&profile)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            let back: CalibrationProfile = serde_json::from_str(&json)
                .map_err(|e| TestCaseError::fail(e.to_string()))?;
            prop_assert_eq!(back, profile);
        }
    }
}
