//! Read-only calibration profile consumed by the encoder and the facade.

use haptics_owt_protocol::Braking;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::q_format::{f0_offset_from_shift, q14_to_f32, q16_to_f32};
use crate::types::{
    DEFAULT_PRIMITIVE_CLAMPS, PRIMITIVE_COUNT, ScaleClamp, VolumeCategory, VolumeRange,
};
use crate::{CalibrationError, CalibrationResult};

/// Largest long-vibration frequency shift whose Q14 offset fits the 24-bit field.
pub const LONG_FREQUENCY_SHIFT_MAX: i32 = 1023;

const ALL_PRIMITIVES_MASK: u32 = (1 << PRIMITIVE_COUNT) - 1;

/// Per-device calibration, loaded by an external collaborator.
///
/// # Examples
///
/// ```
/// use haptics_calibration::{CalibrationProfile, VolumeCategory, VolumeRange};
///
/// let profile = CalibrationProfile::default()
///     .with_volume(VolumeCategory::Click, VolumeRange::new(10, 80))
///     .with_long_frequency_shift(-2);
/// assert!(profile.validate().is_ok());
/// assert_eq!(profile.f0_offset(), (1 << 24) - 2 * (1 << 14));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationProfile {
    pub tick_volume: VolumeRange,
    pub click_volume: VolumeRange,
    pub long_volume: VolumeRange,
    /// Offset computed from both actuators' calibration. Preferred over the
    /// long frequency shift when present.
    pub f0_sync_offset: Option<u32>,
    /// Sync offset of the secondary actuator in dual mode.
    pub secondary_f0_sync_offset: Option<u32>,
    /// Long-vibration frequency shift, in Q14 steps.
    pub long_frequency_shift: i32,
    /// Supported-primitive bitmask. Zero means every primitive is supported.
    pub supported_primitives: u32,
    /// Scale bounds indexed by primitive bit.
    pub primitive_clamps: [ScaleClamp; PRIMITIVE_COUNT],
    pub chirp_enabled: bool,
    pub supported_braking: Vec<Braking>,
    /// Resonant frequency in Q14 Hz.
    pub f0_raw: Option<u32>,
    /// Quality factor in Q16.
    pub q_raw: Option<u32>,
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            tick_volume: VolumeRange::default(),
            click_volume: VolumeRange::default(),
            long_volume: VolumeRange::default(),
            f0_sync_offset: None,
            secondary_f0_sync_offset: None,
            long_frequency_shift: 0,
            supported_primitives: 0,
            primitive_clamps: DEFAULT_PRIMITIVE_CLAMPS,
            chirp_enabled: false,
            supported_braking: vec![Braking::None],
            f0_raw: None,
            q_raw: None,
        }
    }
}

impl CalibrationProfile {
    pub fn with_volume(mut self, category: VolumeCategory, range: VolumeRange) -> Self {
        match category {
            VolumeCategory::Tick => self.tick_volume = range,
            VolumeCategory::Click => self.click_volume = range,
            VolumeCategory::Long => self.long_volume = range,
        }
        self
    }

    pub fn with_f0_sync_offset(mut self, offset: u32) -> Self {
        self.f0_sync_offset = Some(offset);
        self
    }

    pub fn with_secondary_f0_sync_offset(mut self, offset: u32) -> Self {
        self.secondary_f0_sync_offset = Some(offset);
        self
    }

    pub fn with_long_frequency_shift(mut self, shift: i32) -> Self {
        self.long_frequency_shift = shift;
        self
    }

    pub fn with_supported_primitives(mut self, mask: u32) -> Self {
        self.supported_primitives = mask;
        self
    }

    pub fn with_primitive_clamp(mut self, bit: usize, clamp: ScaleClamp) -> Self {
        if let Some(slot) = self.primitive_clamps.get_mut(bit) {
            *slot = clamp;
        }
        self
    }

    pub fn with_chirp(mut self, enabled: bool) -> Self {
        self.chirp_enabled = enabled;
        self
    }

    pub fn with_supported_braking(mut self, braking: Vec<Braking>) -> Self {
        self.supported_braking = braking;
        self
    }

    pub fn with_resonance(mut self, f0_raw: u32, q_raw: u32) -> Self {
        self.f0_raw = Some(f0_raw);
        self.q_raw = Some(q_raw);
        self
    }

    /// Check every field against its documented range.
    pub fn validate(&self) -> CalibrationResult<()> {
        for (category, range) in [
            (VolumeCategory::Tick, self.tick_volume),
            (VolumeCategory::Click, self.click_volume),
            (VolumeCategory::Long, self.long_volume),
        ] {
            if !range.is_valid() {
                return Err(CalibrationError::InvalidVolumeRange {
                    category,
                    min: range.min,
                    max: range.max,
                });
            }
        }

        for (bit, clamp) in self.primitive_clamps.iter().enumerate() {
            if !clamp.is_valid() {
                return Err(CalibrationError::InvalidScaleClamp {
                    bit,
                    min: clamp.min,
                    max: clamp.max,
                });
            }
        }

        if self.supported_primitives & !ALL_PRIMITIVES_MASK != 0 {
            return Err(CalibrationError::UnknownPrimitiveBits(self.supported_primitives));
        }

        if self.long_frequency_shift.unsigned_abs() > LONG_FREQUENCY_SHIFT_MAX.unsigned_abs() {
            return Err(CalibrationError::FrequencyShiftOutOfRange(
                self.long_frequency_shift,
            ));
        }

        if self.supported_braking.is_empty() {
            return Err(CalibrationError::NoBrakingModes);
        }

        Ok(())
    }

    pub fn volume_range(&self, category: VolumeCategory) -> VolumeRange {
        match category {
            VolumeCategory::Tick => self.tick_volume,
            VolumeCategory::Click => self.click_volume,
            VolumeCategory::Long => self.long_volume,
        }
    }

    /// Supported-primitive mask with the "zero means all" rule applied.
    pub fn effective_primitive_mask(&self) -> u32 {
        if self.supported_primitives == 0 {
            ALL_PRIMITIVES_MASK
        } else {
            self.supported_primitives
        }
    }

    pub fn supports_primitive(&self, bit: u32) -> bool {
        bit < 32 && self.effective_primitive_mask() & (1 << bit) != 0
    }

    pub fn primitive_clamp(&self, bit: usize) -> ScaleClamp {
        self.primitive_clamps.get(bit).copied().unwrap_or_default()
    }

    pub fn supports_braking(&self, braking: Braking) -> bool {
        self.supported_braking.contains(&braking)
    }

    /// Frequency offset for the primary actuator.
    pub fn f0_offset(&self) -> u32 {
        if let Some(offset) = self.f0_sync_offset {
            debug!(offset, "F0 offset from synchronized calibration");
            return offset;
        }
        let offset = f0_offset_from_shift(self.long_frequency_shift);
        debug!(
            offset,
            shift = self.long_frequency_shift,
            "F0 offset from long frequency shift"
        );
        offset
    }

    /// Frequency offset for the secondary actuator. Only a sync offset applies.
    pub fn secondary_f0_offset(&self) -> u32 {
        self.secondary_f0_sync_offset.unwrap_or(0)
    }

    pub fn resonant_frequency_hz(&self) -> Option<f32> {
        self.f0_raw.map(q14_to_f32)
    }

    pub fn q_factor(&self) -> Option<f32> {
        self.q_raw.map(q16_to_f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert_eq!(CalibrationProfile::default().validate(), Ok(()));
    }

    #[test]
    fn test_zero_mask_means_all() {
        let profile = CalibrationProfile::default();
        assert_eq!(profile.effective_primitive_mask(), 0x1FF);
        assert!(profile.supports_primitive(8));
        assert!(!profile.supports_primitive(9));
        assert!(!profile.supports_primitive(40));
    }

    #[test]
    fn test_explicit_mask() {
        let profile = CalibrationProfile::default().with_supported_primitives(0b10);
        assert!(profile.supports_primitive(1));
        assert!(!profile.supports_primitive(2));
    }

    #[test]
    fn test_sync_offset_wins() {
        let profile = CalibrationProfile::default()
            .with_long_frequency_shift(3)
            .with_f0_sync_offset(42);
        assert_eq!(profile.f0_offset(), 42);
    }

    #[test]
    fn test_validate_rejects_bad_volume() {
        let profile = CalibrationProfile::default()
            .with_volume(VolumeCategory::Long, VolumeRange::new(80, 20));
        assert!(matches!(
            profile.validate(),
            Err(CalibrationError::InvalidVolumeRange {
                category: VolumeCategory::Long,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_unknown_bits() {
        let profile = CalibrationProfile::default().with_supported_primitives(1 << 12);
        assert_eq!(
            profile.validate(),
            Err(CalibrationError::UnknownPrimitiveBits(1 << 12))
        );
    }
}
