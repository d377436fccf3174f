//! Caller-facing vibrator.
//!
//! Ties calibration, composition and playback together. Every request is
//! validated and encoded before the controller touches hardware.

use std::time::Duration;

use bitflags::bitflags;
use haptics_calibration::CalibrationProfile;
use haptics_effects::{
    COMPOSE_DELAY_MAX_MS, COMPOSE_PWLE_SIZE_MAX, COMPOSE_SIZE_MAX, COLD_START_LATENCY_MS,
    CompositeEffect, CompositePrimitive, Effect, EffectComposer, EffectStrength,
    PredefinedWaveform, PrimitivePwle, VOLTAGE_SCALE_MAX, amplitude_to_scale,
};
use haptics_errors::{HapticError, HapticResult, ValidationError};
use haptics_owt_protocol::{
    Braking, EffectSlot, PWLE_DURATION_MAX_MS, PWLE_FREQUENCY_MAX_HZ, PWLE_FREQUENCY_MIN_HZ,
};
use parking_lot::Mutex;
use tracing::{debug, error, info};

use crate::config::PlaybackConfig;
use crate::controller::{CompletionCallback, F0Offsets, PlaybackController, PlaybackRequest};
use crate::session::PlaybackSession;
use crate::topology::{ActuatorSet, TriggerPath};

/// Longest timed vibration accepted by [`Vibrator::on`].
pub const MAX_TIME_MS: u32 = u16::MAX as u32;
/// Requests shorter than this use the short-vibration slot.
pub const LONG_VIBRATION_THRESHOLD_MS: u32 = 50;
/// Step of the PWLE frequency axis.
pub const FREQUENCY_RESOLUTION_HZ: f32 = 1.0;

bitflags! {
    /// Features the vibrator offers on this hardware.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Capabilities: u32 {
        const ON_CALLBACK            = 1 << 0;
        const PERFORM_CALLBACK       = 1 << 1;
        const AMPLITUDE_CONTROL      = 1 << 2;
        const COMPOSE_EFFECTS        = 1 << 5;
        const GET_RESONANT_FREQUENCY = 1 << 7;
        const GET_Q_FACTOR           = 1 << 8;
        const FREQUENCY_CONTROL      = 1 << 9;
        const COMPOSE_PWLE_EFFECTS   = 1 << 10;
    }
}

/// One logical vibrator over one or two actuators.
#[derive(Debug)]
pub struct Vibrator {
    composer: EffectComposer,
    controller: PlaybackController,
    long_scale: Mutex<f32>,
}

impl Vibrator {
    /// Validate inputs and install the physical effect table on every actuator.
    ///
    /// Installation failures are logged; the affected slots will fail later.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if the profile or config does not validate.
    pub fn new(
        profile: CalibrationProfile,
        actuators: ActuatorSet,
        trigger: TriggerPath,
        config: PlaybackConfig,
    ) -> HapticResult<Self> {
        profile.validate()?;
        config.validate()?;

        for actuator in actuators.iter() {
            for slot in EffectSlot::PHYSICAL {
                let duration = slot
                    .duration_ms()
                    .and_then(|ms| u16::try_from(ms).ok())
                    .unwrap_or(u16::MAX);
                if let Err(e) = actuator.set_effect_duration(slot, duration, None) {
                    error!(actuator = actuator.name(), slot = ?slot, error = %e, "Failed to install effect");
                }
            }
        }

        let offsets = F0Offsets {
            primary: profile.f0_offset(),
            secondary: if actuators.is_dual() {
                profile.secondary_f0_offset()
            } else {
                0
            },
        };
        info!(
            dual = actuators.is_dual(),
            gpio = trigger.is_gpio(),
            "Vibrator ready"
        );
        let controller = PlaybackController::new(actuators, trigger, config).with_f0_offsets(offsets);
        Ok(Self {
            composer: EffectComposer::new(profile),
            controller,
            long_scale: Mutex::new(1.0),
        })
    }

    pub fn profile(&self) -> &CalibrationProfile {
        self.composer.profile()
    }

    pub fn composer(&self) -> &EffectComposer {
        &self.composer
    }

    pub fn session(&self) -> PlaybackSession {
        self.controller.session()
    }

    /// Block until the last playback has been cleaned up, up to `timeout`.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        self.controller.wait_for_completion(timeout)
    }

    pub fn capabilities(&self) -> Capabilities {
        let mut caps = Capabilities::ON_CALLBACK
            | Capabilities::PERFORM_CALLBACK
            | Capabilities::AMPLITUDE_CONTROL
            | Capabilities::GET_RESONANT_FREQUENCY
            | Capabilities::GET_Q_FACTOR;

        let primary = self.controller.actuators().primary();
        let has_space = match primary.free_storage_bytes() {
            Ok(bytes) => bytes > 0,
            Err(e) => {
                error!(actuator = primary.name(), error = %e, "Failed to read free wavetable space");
                false
            }
        };
        if has_space {
            caps |= Capabilities::COMPOSE_EFFECTS;
            if self.profile().chirp_enabled {
                caps |= Capabilities::FREQUENCY_CONTROL | Capabilities::COMPOSE_PWLE_EFFECTS;
            }
        }
        caps
    }

    /// Vibrate for `timeout_ms` using the long or short physical slot.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` above [`MAX_TIME_MS`]; otherwise as
    /// [`PlaybackController::start`].
    pub fn on(&self, timeout_ms: u32, callback: Option<CompletionCallback>) -> HapticResult<()> {
        debug!(timeout_ms, "Vibrator on");
        if timeout_ms > MAX_TIME_MS {
            return Err(ValidationError::out_of_range("timeout_ms", timeout_ms, 0, MAX_TIME_MS).into());
        }
        let slot = if timeout_ms < LONG_VIBRATION_THRESHOLD_MS {
            EffectSlot::ShortVibration
        } else {
            EffectSlot::LongVibration
        };
        let padded = timeout_ms
            .checked_add(COLD_START_LATENCY_MS)
            .filter(|ms| *ms <= MAX_TIME_MS)
            .unwrap_or(timeout_ms);
        let duration_ms = u16::try_from(padded).unwrap_or(u16::MAX);

        self.apply_global_gain()?;
        self.controller.apply_f0_offsets();
        self.controller
            .start(PlaybackRequest::Timed { slot, duration_ms }, callback)
    }

    /// Stop playback and restore the gain and frequency baseline.
    ///
    /// # Errors
    ///
    /// As [`PlaybackController::stop`].
    pub fn off(&self) -> HapticResult<()> {
        debug!("Vibrator off");
        *self.long_scale.lock() = 1.0;
        self.controller.stop()
    }

    /// Play a predefined effect. Returns its predicted duration.
    ///
    /// # Errors
    ///
    /// As [`EffectComposer::predefined`] and [`PlaybackController::start`].
    pub fn perform(
        &self,
        effect: Effect,
        strength: EffectStrength,
        callback: Option<CompletionCallback>,
    ) -> HapticResult<u32> {
        debug!(effect = ?effect, strength = ?strength, "Vibrator perform");
        let waveform = self.composer.predefined(effect, strength)?;
        let duration_ms = waveform.duration_ms();
        match waveform {
            PredefinedWaveform::Physical {
                slot, vol_level, ..
            } => {
                self.controller
                    .set_gain(amplitude_to_scale(f32::from(vol_level), f32::from(VOLTAGE_SCALE_MAX)))?;
                self.controller.start(PlaybackRequest::Physical(slot), callback)?;
            }
            PredefinedWaveform::Composed(composed) => {
                self.controller.set_gain(VOLTAGE_SCALE_MAX)?;
                self.controller
                    .start(PlaybackRequest::Waveform(composed.blob), callback)?;
            }
        }
        Ok(duration_ms)
    }

    /// Play a primitive sequence. Returns its predicted duration.
    ///
    /// # Errors
    ///
    /// As [`EffectComposer::compose`] and [`PlaybackController::start`].
    pub fn compose(
        &self,
        effects: &[CompositeEffect],
        callback: Option<CompletionCallback>,
    ) -> HapticResult<u32> {
        debug!(entries = effects.len(), "Vibrator compose");
        let waveform = self.composer.compose(effects)?;
        self.controller.set_gain(VOLTAGE_SCALE_MAX)?;
        self.controller
            .start(PlaybackRequest::Waveform(waveform.blob), callback)?;
        Ok(waveform.duration_ms)
    }

    /// Play a PWLE envelope. Returns its predicted duration.
    ///
    /// # Errors
    ///
    /// `Unsupported` without PWLE capability; otherwise as
    /// [`EffectComposer::compose_pwle`] and [`PlaybackController::start`].
    pub fn compose_pwle(
        &self,
        primitives: &[PrimitivePwle],
        callback: Option<CompletionCallback>,
    ) -> HapticResult<u32> {
        debug!(entries = primitives.len(), "Vibrator compose PWLE");
        self.require(Capabilities::COMPOSE_PWLE_EFFECTS, "PWLE composition")?;
        let waveform = self.composer.compose_pwle(primitives)?;
        self.controller.set_gain(VOLTAGE_SCALE_MAX)?;
        self.controller
            .start(PlaybackRequest::Waveform(waveform.blob), callback)?;
        Ok(waveform.duration_ms)
    }

    /// Set the scale applied to timed vibrations, `0 < amplitude <= 1`.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` outside the range; `IllegalState` if the gain write fails.
    pub fn set_amplitude(&self, amplitude: f32) -> HapticResult<()> {
        if !(amplitude > 0.0 && amplitude <= 1.0) {
            return Err(ValidationError::out_of_range("amplitude", amplitude, 0.0, 1.0).into());
        }
        *self.long_scale.lock() = amplitude;
        self.apply_global_gain()
    }

    fn apply_global_gain(&self) -> HapticResult<()> {
        let scale = *self.long_scale.lock();
        self.controller
            .set_gain(self.composer.scaler().global_gain(scale))
    }

    fn require(&self, capability: Capabilities, operation: &str) -> HapticResult<()> {
        if self.capabilities().contains(capability) {
            Ok(())
        } else {
            Err(HapticError::unsupported(operation))
        }
    }

    pub fn supported_effects(&self) -> Vec<Effect> {
        Effect::SUPPORTED.to_vec()
    }

    pub fn supported_primitives(&self) -> Vec<CompositePrimitive> {
        self.composer.supported_primitives()
    }

    /// # Errors
    ///
    /// `Unsupported` if the calibration excludes the primitive.
    pub fn primitive_duration(&self, primitive: CompositePrimitive) -> HapticResult<u32> {
        self.composer.primitive_duration(primitive)
    }

    pub fn composition_delay_max(&self) -> i32 {
        COMPOSE_DELAY_MAX_MS
    }

    pub fn composition_size_max(&self) -> usize {
        COMPOSE_SIZE_MAX
    }

    /// # Errors
    ///
    /// `Unsupported` without PWLE capability.
    pub fn pwle_primitive_duration_max(&self) -> HapticResult<u32> {
        self.require(Capabilities::COMPOSE_PWLE_EFFECTS, "PWLE duration query")?;
        Ok(PWLE_DURATION_MAX_MS)
    }

    /// # Errors
    ///
    /// `Unsupported` without PWLE capability.
    pub fn pwle_composition_size_max(&self) -> HapticResult<usize> {
        self.require(Capabilities::COMPOSE_PWLE_EFFECTS, "PWLE size query")?;
        Ok(COMPOSE_PWLE_SIZE_MAX)
    }

    /// # Errors
    ///
    /// `Unsupported` without PWLE capability.
    pub fn supported_braking(&self) -> HapticResult<Vec<Braking>> {
        self.require(Capabilities::COMPOSE_PWLE_EFFECTS, "braking query")?;
        Ok(self.profile().supported_braking.clone())
    }

    /// # Errors
    ///
    /// `Unsupported` without frequency control.
    pub fn frequency_resolution(&self) -> HapticResult<f32> {
        self.require(Capabilities::FREQUENCY_CONTROL, "frequency resolution query")?;
        Ok(FREQUENCY_RESOLUTION_HZ)
    }

    /// # Errors
    ///
    /// `Unsupported` without frequency control.
    pub fn frequency_minimum(&self) -> HapticResult<f32> {
        self.require(Capabilities::FREQUENCY_CONTROL, "frequency minimum query")?;
        Ok(PWLE_FREQUENCY_MIN_HZ)
    }

    /// Flat map over the supported band, one entry per resolution step.
    ///
    /// # Errors
    ///
    /// `Unsupported` without frequency control.
    pub fn bandwidth_amplitude_map(&self) -> HapticResult<Vec<f32>> {
        self.require(Capabilities::FREQUENCY_CONTROL, "bandwidth map query")?;
        let steps = ((PWLE_FREQUENCY_MAX_HZ - PWLE_FREQUENCY_MIN_HZ) / FREQUENCY_RESOLUTION_HZ)
            .round() as i32;
        Ok(vec![1.0; usize::try_from(steps).unwrap_or(0) + 1])
    }

    /// # Errors
    ///
    /// `IllegalState` if the calibration has no F0 value.
    pub fn resonant_frequency(&self) -> HapticResult<f32> {
        self.profile().resonant_frequency_hz().ok_or_else(|| {
            error!("Failed to get resonant frequency");
            HapticError::illegal_state("no resonant frequency calibration")
        })
    }

    /// # Errors
    ///
    /// `IllegalState` if the calibration has no Q value.
    pub fn q_factor(&self) -> HapticResult<f32> {
        self.profile().q_factor().ok_or_else(|| {
            error!("Failed to get q factor");
            HapticError::illegal_state("no Q factor calibration")
        })
    }
}
