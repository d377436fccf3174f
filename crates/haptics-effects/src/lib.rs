//! Haptic effect composition
//!
//! Validates caller requests against the actuator's calibration and encodes
//! them into open-wavetable blobs:
//!
//! - [`EffectComposer::compose`] for sequences of [`CompositePrimitive`]s
//! - [`EffectComposer::compose_pwle`] for piecewise-linear envelopes
//! - [`EffectComposer::predefined`] for the built-in [`Effect`]s
//!
//! Nothing here performs I/O.
//!
//! # Example
//!
//! ```
//! use haptics_calibration::CalibrationProfile;
//! use haptics_effects::{CompositeEffect, CompositePrimitive, EffectComposer};
//!
//! let composer = EffectComposer::new(CalibrationProfile::default());
//! let waveform = composer.compose(&[
//!     CompositeEffect::new(CompositePrimitive::Click, 1.0),
//!     CompositeEffect::new(CompositePrimitive::Thud, 0.5).after(40),
//! ])?;
//! assert_eq!(waveform.duration_ms, 12 + 40 + 300);
//! # Ok::<(), haptics_errors::HapticError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod composer;
pub mod predefined;
pub mod primitives;
pub mod scaler;

pub use composer::{
    COLD_START_LATENCY_MS, COMPOSE_DELAY_MAX_MS, COMPOSE_PWLE_SIZE_MAX, COMPOSE_SIZE_MAX,
    ComposedWaveform, EffectComposer,
};
pub use predefined::{DOUBLE_CLICK_SILENCE_MS, PAUSE_TIMING_ERROR_MS, PredefinedWaveform};
pub use primitives::{
    ActivePwle, Braking, BrakingPwle, CompositeEffect, CompositePrimitive, Effect, EffectStrength,
    PrimitivePwle,
};
pub use scaler::{VOLTAGE_SCALE_MAX, VolumeScaler, amplitude_to_scale, category_for_slot};
