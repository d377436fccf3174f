//! Turns caller compositions into open-wavetable blobs.
//!
//! Every check here runs before any hardware I/O: a request that fails
//! validation never reaches the playback controller.

use std::cmp::Ordering;

use haptics_calibration::CalibrationProfile;
use haptics_errors::{HapticError, HapticResult, ValidationError, validate, validate_range};
use haptics_owt_protocol::{
    CompositeSegment, EffectSlot, PWLE_DURATION_MAX_MS, PWLE_FREQUENCY_MAX_HZ,
    PWLE_FREQUENCY_MIN_HZ, PWLE_LEVEL_MAX, PWLE_SECTIONS_MAX, PWLE_TOTAL_DURATION_MAX_MS,
    WaveformBlob, WaveformFormat,
};
use tracing::{debug, warn};

use crate::primitives::{ActivePwle, BrakingPwle, CompositeEffect, CompositePrimitive, PrimitivePwle};
use crate::scaler::VolumeScaler;

/// Most entries accepted by [`EffectComposer::compose`].
pub const COMPOSE_SIZE_MAX: usize = 254;
/// Longest delay between composed steps.
pub const COMPOSE_DELAY_MAX_MS: i32 = 10_000;
/// Most entries accepted by [`EffectComposer::compose_pwle`].
pub const COMPOSE_PWLE_SIZE_MAX: usize = 127;
/// I2C transaction plus DSP return-from-standby.
pub const COLD_START_LATENCY_MS: u32 = 6;

/// Caller-facing amplitude range of a PWLE ramp.
const PWLE_REQUEST_LEVEL_MIN: f32 = 0.0;
const PWLE_REQUEST_LEVEL_MAX: f32 = 1.0;

/// An encoded blob plus its predicted playback time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedWaveform {
    pub blob: WaveformBlob,
    pub duration_ms: u32,
}

impl ComposedWaveform {
    /// Dynamic slot the blob is uploaded into.
    pub fn slot(&self) -> EffectSlot {
        self.blob.format().slot()
    }
}

/// Validates compositions against calibration and encodes them.
#[derive(Debug, Clone)]
pub struct EffectComposer {
    profile: CalibrationProfile,
    scaler: VolumeScaler,
}

impl EffectComposer {
    pub fn new(profile: CalibrationProfile) -> Self {
        let scaler = VolumeScaler::new(&profile);
        Self { profile, scaler }
    }

    pub fn profile(&self) -> &CalibrationProfile {
        &self.profile
    }

    pub fn scaler(&self) -> &VolumeScaler {
        &self.scaler
    }

    /// Primitives allowed by the calibration mask, in bit order.
    pub fn supported_primitives(&self) -> Vec<CompositePrimitive> {
        CompositePrimitive::ALL
            .into_iter()
            .filter(|p| self.profile.supports_primitive(p.bit()))
            .collect()
    }

    /// Physical slot behind a primitive, if the calibration allows it.
    pub(crate) fn primitive_slot(&self, primitive: CompositePrimitive) -> HapticResult<EffectSlot> {
        if !self.profile.supports_primitive(primitive.bit()) {
            return Err(HapticError::unsupported(format!(
                "primitive {primitive:?} is not supported by this actuator"
            )));
        }
        primitive.slot().ok_or_else(|| {
            HapticError::from(ValidationError::invalid_enum(
                "primitive",
                format!("{primitive:?}"),
                "a primitive with a waveform",
            ))
        })
    }

    /// Playback time of one primitive. `Noop` takes none.
    pub fn primitive_duration(&self, primitive: CompositePrimitive) -> HapticResult<u32> {
        if primitive == CompositePrimitive::Noop {
            return Ok(0);
        }
        let slot = self.primitive_slot(primitive)?;
        Ok(slot.duration_ms().unwrap_or(0))
    }

    /// Encode a primitive sequence into a composed-effects blob.
    pub fn compose(&self, effects: &[CompositeEffect]) -> HapticResult<ComposedWaveform> {
        let Some(first) = effects.first() else {
            return Err(ValidationError::empty("composite").into());
        };
        validate!(
            effects.len() <= COMPOSE_SIZE_MAX,
            ValidationError::too_long("composite", effects.len(), COMPOSE_SIZE_MAX)
        );

        let lead = checked_delay(first.delay_ms)?;
        let mut total = u32::from(lead);
        let mut sections: u32 = 0;
        let mut blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;

        if lead > 0 {
            blob.write_composed_segment(&CompositeSegment::silence(lead))?;
            sections += 1;
        }

        let mut own_delay = lead;
        for (i, effect) in effects.iter().enumerate() {
            validate_range!("scale", effect.scale, 0.0, 1.0);

            let (vol_level, index) = match effect.primitive.slot() {
                None => (0, 0),
                Some(_) => {
                    let slot = self.primitive_slot(effect.primitive)?;
                    let scale = self
                        .profile
                        .primitive_clamp(effect.primitive.bit() as usize)
                        .apply(effect.scale);
                    total += slot.duration_ms().unwrap_or(0);
                    let index = u8::try_from(slot.index()).unwrap_or(u8::MAX);
                    (self.scaler.intensity_to_vol_level(scale, slot), index)
                }
            };

            let next_delay = match effects.get(i + 1) {
                Some(next) => checked_delay(next.delay_ms)?,
                None => 0,
            };
            total += u32::from(next_delay);

            if effect.primitive == CompositePrimitive::Noop && own_delay == 0 && next_delay == 0 {
                return Err(ValidationError::constraint(format!(
                    "noop at position {i} carries no time"
                ))
                .into());
            }

            blob.write_composed_segment(&CompositeSegment::effect(vol_level, index, next_delay))?;
            sections += 1;
            own_delay = next_delay;
        }

        blob.flush()?;
        blob.set_section_count(sections)?;
        debug!(
            sections,
            bytes = blob.len(),
            duration_ms = total,
            "composed effect encoded"
        );
        Ok(ComposedWaveform {
            blob,
            duration_ms: total,
        })
    }

    /// Encode a piecewise-linear envelope into a PWLE blob.
    pub fn compose_pwle(&self, primitives: &[PrimitivePwle]) -> HapticResult<ComposedWaveform> {
        if primitives.is_empty() {
            return Err(ValidationError::empty("pwle").into());
        }
        validate!(
            primitives.len() <= COMPOSE_PWLE_SIZE_MAX,
            ValidationError::too_long("pwle", primitives.len(), COMPOSE_PWLE_SIZE_MAX)
        );

        let mut blob = WaveformBlob::new(WaveformFormat::PwleEnvelope)?;
        let mut sections: u32 = 0;
        let mut total: u32 = 0;
        let mut prev_end: Option<(f32, f32)> = None;

        for primitive in primitives {
            match primitive {
                PrimitivePwle::Active(active) => {
                    let (duration, start, end) = self.check_active(active)?;
                    if !prev_end.is_some_and(|prev| same_point(prev, start)) {
                        blob.write_pwle_active_segment(0, start.0, start.1, false)?;
                        sections += 1;
                    }
                    let chirp = !same_value(start.1, end.1);
                    blob.write_pwle_active_segment(duration, end.0, end.1, chirp)?;
                    sections += 1;
                    prev_end = Some(end);
                    total += duration;
                }
                PrimitivePwle::Braking(braking) => {
                    let duration = self.check_braking(braking)?;
                    blob.write_pwle_braking_segment(0, braking.braking)?;
                    blob.write_pwle_braking_segment(duration, braking.braking)?;
                    sections += 2;
                    prev_end = None;
                    total += duration;
                }
            }

            if sections > PWLE_SECTIONS_MAX {
                warn!(sections, "too many PWLE sections");
                return Err(ValidationError::too_long(
                    "pwle sections",
                    sections as usize,
                    PWLE_SECTIONS_MAX as usize,
                )
                .into());
            }
        }
        blob.flush()?;

        total += COLD_START_LATENCY_MS;
        if total > PWLE_TOTAL_DURATION_MAX_MS {
            warn!(total, "PWLE total duration too long");
            return Err(ValidationError::out_of_range(
                "pwle_total_duration_ms",
                total,
                0,
                PWLE_TOTAL_DURATION_MAX_MS,
            )
            .into());
        }
        blob.set_total_duration(total)?;
        blob.set_section_count(sections)?;
        debug!(
            sections,
            bytes = blob.len(),
            duration_ms = total,
            "pwle envelope encoded"
        );
        Ok(ComposedWaveform {
            blob,
            duration_ms: total,
        })
    }

    /// Validate a ramp and return its duration and clamped start/end points.
    fn check_active(&self, active: &ActivePwle) -> HapticResult<(u32, (f32, f32), (f32, f32))> {
        let duration = checked_pwle_duration(active.duration_ms)?;
        for (field, amplitude) in [
            ("start_amplitude", active.start_amplitude),
            ("end_amplitude", active.end_amplitude),
        ] {
            validate_range!(field, amplitude, PWLE_REQUEST_LEVEL_MIN, PWLE_REQUEST_LEVEL_MAX);
        }
        for (field, frequency) in [
            ("start_frequency_hz", active.start_frequency_hz),
            ("end_frequency_hz", active.end_frequency_hz),
        ] {
            validate_range!(field, frequency, PWLE_FREQUENCY_MIN_HZ, PWLE_FREQUENCY_MAX_HZ);
        }
        let start = (
            active.start_amplitude.min(PWLE_LEVEL_MAX),
            active.start_frequency_hz,
        );
        let end = (active.end_amplitude.min(PWLE_LEVEL_MAX), active.end_frequency_hz);
        Ok((duration, start, end))
    }

    fn check_braking(&self, braking: &BrakingPwle) -> HapticResult<u32> {
        if !self.profile.supports_braking(braking.braking) {
            let supported = self
                .profile
                .supported_braking
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            return Err(
                ValidationError::invalid_enum("braking", braking.braking.to_string(), supported)
                    .into(),
            );
        }
        checked_pwle_duration(braking.duration_ms)
    }
}

fn checked_delay(delay_ms: i32) -> HapticResult<u16> {
    validate_range!("delay_ms", delay_ms, 0, COMPOSE_DELAY_MAX_MS);
    Ok(u16::try_from(delay_ms).unwrap_or(u16::MAX))
}

fn checked_pwle_duration(duration_ms: i32) -> HapticResult<u32> {
    validate_range!(
        "duration_ms",
        i64::from(duration_ms),
        0,
        i64::from(PWLE_DURATION_MAX_MS)
    );
    Ok(u32::try_from(duration_ms).unwrap_or(PWLE_DURATION_MAX_MS))
}

fn same_value(a: f32, b: f32) -> bool {
    a.partial_cmp(&b) == Some(Ordering::Equal)
}

fn same_point(a: (f32, f32), b: (f32, f32)) -> bool {
    same_value(a.0, b.0) && same_value(a.1, b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn composer() -> EffectComposer {
        EffectComposer::new(CalibrationProfile::default())
    }

    #[test]
    fn test_checked_delay_bounds() {
        assert_eq!(checked_delay(0), Ok(0));
        assert_eq!(checked_delay(10_000), Ok(10_000));
        assert!(matches!(checked_delay(-1), Err(HapticError::InvalidArgument(_))));
        assert!(matches!(checked_delay(10_001), Err(HapticError::InvalidArgument(_))));
    }

    #[test]
    fn test_checked_pwle_duration_bounds() {
        assert_eq!(checked_pwle_duration(16_383), Ok(16_383));
        assert!(checked_pwle_duration(16_384).is_err_and(|e| e.kind() == haptics_errors::ErrorKind::InvalidArgument));
        assert!(checked_pwle_duration(-5).is_err_and(|e| e.kind() == haptics_errors::ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_primitive_duration() -> TestResult {
        let c = composer();
        assert_eq!(c.primitive_duration(CompositePrimitive::Noop)?, 0);
        assert_eq!(c.primitive_duration(CompositePrimitive::Click)?, 12);
        assert_eq!(c.primitive_duration(CompositePrimitive::SlowRise)?, 500);
        Ok(())
    }

    #[test]
    fn test_unsupported_primitive_duration() {
        let c = EffectComposer::new(CalibrationProfile::default().with_supported_primitives(0b11));
        assert!(matches!(
            c.primitive_duration(CompositePrimitive::Thud),
            Err(HapticError::Unsupported(_))
        ));
        assert_eq!(
            c.supported_primitives(),
            vec![CompositePrimitive::Noop, CompositePrimitive::Click]
        );
    }

    #[test]
    fn test_same_point() {
        assert!(same_point((0.5, 50.0), (0.5, 50.0)));
        assert!(!same_point((0.5, 50.0), (0.5, 51.0)));
        assert!(!same_value(f32::NAN, f32::NAN));
    }
}
