//! Calibration type definitions

use core::fmt;

use serde::{Deserialize, Serialize};

/// Number of composition primitives addressed by the supported bitmask.
pub const PRIMITIVE_COUNT: usize = 9;

/// Highest volume level the firmware accepts.
pub const VOLUME_LEVEL_MAX: u32 = 100;

/// Which calibrated volume range a waveform draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolumeCategory {
    Tick,
    Click,
    Long,
}

impl fmt::Display for VolumeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VolumeCategory::Tick => write!(f, "tick"),
            VolumeCategory::Click => write!(f, "click"),
            VolumeCategory::Long => write!(f, "long"),
        }
    }
}

/// Inclusive `[min, max]` volume level range.
///
/// # Examples
///
/// ```
/// use haptics_calibration::VolumeRange;
///
/// let range = VolumeRange::new(10, 90);
/// assert_eq!(range.level_for(0.0), 10);
/// assert_eq!(range.level_for(0.5), 50);
/// assert_eq!(range.level_for(1.0), 90);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRange {
    pub min: u32,
    pub max: u32,
}

impl Default for VolumeRange {
    fn default() -> Self {
        Self {
            min: 1,
            max: VOLUME_LEVEL_MAX,
        }
    }
}

impl VolumeRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Map an intensity in `[0, 1]` onto the range: `round(i * (max - min)) + min`.
    pub fn level_for(&self, intensity: f32) -> u32 {
        let span = self.max.saturating_sub(self.min) as f32;
        let scaled = (intensity.clamp(0.0, 1.0) * span).round() as i64;
        let offset = u32::try_from(scaled).unwrap_or(0);
        offset.saturating_add(self.min)
    }

    pub fn is_valid(&self) -> bool {
        self.min <= self.max && self.max <= VOLUME_LEVEL_MAX
    }
}

/// Inclusive `[min, max]` bounds applied to a primitive's requested scale.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScaleClamp {
    pub min: f32,
    pub max: f32,
}

impl Default for ScaleClamp {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}

impl ScaleClamp {
    pub const fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Clamp `scale` into the bounds. `max` wins if the bounds cross.
    pub fn apply(&self, scale: f32) -> f32 {
        scale.max(self.min).min(self.max)
    }

    pub fn is_valid(&self) -> bool {
        (0.0..=1.0).contains(&self.min) && (0.0..=1.0).contains(&self.max) && self.min <= self.max
    }
}

/// Factory clamps indexed by primitive bit: noop, click, thud, spin,
/// quick rise, slow rise, quick fall, light tick, low tick.
pub const DEFAULT_PRIMITIVE_CLAMPS: [ScaleClamp; PRIMITIVE_COUNT] = [
    ScaleClamp::new(0.0, 1.0),
    ScaleClamp::new(0.01, 0.95),
    ScaleClamp::new(0.11, 0.75),
    ScaleClamp::new(0.23, 0.9),
    ScaleClamp::new(0.0, 1.0),
    ScaleClamp::new(0.25, 1.0),
    ScaleClamp::new(0.02, 1.0),
    ScaleClamp::new(0.03, 0.75),
    ScaleClamp::new(0.16, 0.75),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_for_rounds_half_away() {
        let range = VolumeRange::new(0, 3);
        assert_eq!(range.level_for(0.5), 2);
        assert_eq!(range.level_for(0.49), 1);
    }

    #[test]
    fn test_level_for_degenerate_range() {
        let range = VolumeRange::new(40, 40);
        assert_eq!(range.level_for(0.7), 40);
    }

    #[test]
    fn test_clamp_apply() {
        let clamp = ScaleClamp::new(0.01, 0.95);
        assert!((clamp.apply(1.0) - 0.95).abs() < f32::EPSILON);
        assert!((clamp.apply(0.0) - 0.01).abs() < f32::EPSILON);
        assert!((clamp.apply(0.5) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_clamps_are_valid() {
        assert!(DEFAULT_PRIMITIVE_CLAMPS.iter().all(ScaleClamp::is_valid));
    }
}
