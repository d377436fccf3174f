//! Predefined effects built from physical slots.

use haptics_errors::HapticResult;
use haptics_owt_protocol::{CompositeSegment, EffectSlot, WaveformBlob, WaveformFormat};
use tracing::debug;

use crate::composer::{COLD_START_LATENCY_MS, ComposedWaveform, EffectComposer};
use crate::primitives::{CompositePrimitive, Effect, EffectStrength};

/// Gap between the two clicks of [`Effect::DoubleClick`].
pub const DOUBLE_CLICK_SILENCE_MS: u16 = 100;
/// Slack the firmware may add to a pause between composed sections.
pub const PAUSE_TIMING_ERROR_MS: u32 = 1;

/// What [`EffectComposer::predefined`] resolves an effect into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PredefinedWaveform {
    /// Play a physical slot at a fixed level.
    Physical {
        slot: EffectSlot,
        vol_level: u8,
        duration_ms: u32,
    },
    /// Upload and play a composed blob at full gain.
    Composed(ComposedWaveform),
}

impl PredefinedWaveform {
    /// Predicted playback time, cold start included.
    pub fn duration_ms(&self) -> u32 {
        match self {
            PredefinedWaveform::Physical { duration_ms, .. } => *duration_ms,
            PredefinedWaveform::Composed(waveform) => waveform.duration_ms,
        }
    }
}

/// Slot, level and duration of a single-slot effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SimpleDetails {
    slot: EffectSlot,
    vol_level: u8,
    duration_ms: u32,
}

impl EffectComposer {
    /// Resolve a predefined effect at the given strength.
    pub fn predefined(
        &self,
        effect: Effect,
        strength: EffectStrength,
    ) -> HapticResult<PredefinedWaveform> {
        match effect {
            Effect::DoubleClick => self.double_click(strength).map(PredefinedWaveform::Composed),
            _ => {
                let details = self.simple_details(effect, strength);
                Ok(PredefinedWaveform::Physical {
                    slot: details.slot,
                    vol_level: details.vol_level,
                    duration_ms: details.duration_ms,
                })
            }
        }
    }

    fn simple_details(&self, effect: Effect, strength: EffectStrength) -> SimpleDetails {
        let base = strength.intensity();
        let (slot, intensity) = match effect {
            Effect::TextureTick => (EffectSlot::LightTick, base * 0.5),
            Effect::Tick => (EffectSlot::Click, base * 0.5),
            Effect::HeavyClick => {
                let max = self
                    .profile()
                    .primitive_clamp(CompositePrimitive::Click.bit() as usize)
                    .max;
                (EffectSlot::Click, base.min(max))
            }
            Effect::Click | Effect::DoubleClick => (EffectSlot::Click, base * 0.7),
        };
        SimpleDetails {
            slot,
            vol_level: self.scaler().intensity_to_vol_level(intensity, slot),
            duration_ms: slot.duration_ms().unwrap_or(0) + COLD_START_LATENCY_MS,
        }
    }

    fn double_click(&self, strength: EffectStrength) -> HapticResult<ComposedWaveform> {
        let click = self.simple_details(Effect::Click, strength);
        let heavy = self.simple_details(Effect::HeavyClick, strength);

        let mut blob = WaveformBlob::new(WaveformFormat::ComposedEffects)?;
        for (details, delay) in [(click, DOUBLE_CLICK_SILENCE_MS), (heavy, 0)] {
            let index = u8::try_from(details.slot.index()).unwrap_or(u8::MAX);
            blob.write_composed_segment(&CompositeSegment::effect(details.vol_level, index, delay))?;
        }
        blob.flush()?;
        blob.set_section_count(2)?;

        let duration_ms = click.duration_ms
            + u32::from(DOUBLE_CLICK_SILENCE_MS)
            + PAUSE_TIMING_ERROR_MS
            + heavy.duration_ms;
        debug!(duration_ms, "double click encoded");
        Ok(ComposedWaveform { blob, duration_ms })
    }
}
