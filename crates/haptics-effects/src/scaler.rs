//! Intensity and amplitude scaling onto firmware volume levels.

use haptics_calibration::{CalibrationProfile, VolumeCategory, VolumeRange};
use haptics_owt_protocol::EffectSlot;

/// Full-scale gain written to the actuator.
pub const VOLTAGE_SCALE_MAX: u8 = 100;

/// Volume range a slot draws its level from.
pub const fn category_for_slot(slot: EffectSlot) -> VolumeCategory {
    match slot {
        EffectSlot::LightTick => VolumeCategory::Tick,
        EffectSlot::QuickRise | EffectSlot::QuickFall => VolumeCategory::Long,
        _ => VolumeCategory::Click,
    }
}

/// Convert `amplitude / maximum` into a percentage gain.
///
/// Saturates at 100; a non-positive `maximum` also yields 100.
///
/// # Examples
///
/// ```
/// use haptics_effects::amplitude_to_scale;
///
/// assert_eq!(amplitude_to_scale(0.5, 1.0), 50);
/// assert_eq!(amplitude_to_scale(2.0, 1.0), 100);
/// assert_eq!(amplitude_to_scale(0.3, 0.0), 100);
/// ```
pub fn amplitude_to_scale(amplitude: f32, maximum: f32) -> u8 {
    if maximum <= 0.0 {
        return VOLTAGE_SCALE_MAX;
    }
    let ratio = (amplitude / maximum * 100.0).clamp(0.0, 100.0);
    u8::try_from(ratio.round() as i32).unwrap_or(VOLTAGE_SCALE_MAX)
}

/// Maps intensities onto calibrated volume levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeScaler {
    tick: VolumeRange,
    click: VolumeRange,
    long: VolumeRange,
}

impl VolumeScaler {
    pub fn new(profile: &CalibrationProfile) -> Self {
        Self {
            tick: profile.tick_volume,
            click: profile.click_volume,
            long: profile.long_volume,
        }
    }

    pub fn range(&self, category: VolumeCategory) -> VolumeRange {
        match category {
            VolumeCategory::Tick => self.tick,
            VolumeCategory::Click => self.click,
            VolumeCategory::Long => self.long,
        }
    }

    /// `round(intensity * (max - min)) + min` over the slot's range.
    pub fn intensity_to_vol_level(&self, intensity: f32, slot: EffectSlot) -> u8 {
        let level = self.range(category_for_slot(slot)).level_for(intensity);
        u8::try_from(level).unwrap_or(u8::MAX)
    }

    /// Gain for timed vibrations: `round(scale * long.max)`, as a percentage.
    pub fn global_gain(&self, long_scale: f32) -> u8 {
        let amplitude = (long_scale * self.long.max as f32).round();
        amplitude_to_scale(amplitude, f32::from(VOLTAGE_SCALE_MAX))
    }
}
