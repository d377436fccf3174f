//! Haptic playback
//!
//! Drives one or two actuators as a single logical vibrator:
//!
//! - [`actuator`]: the [`Actuator`] and [`GpioTrigger`] collaborator traits
//! - [`topology`]: [`ActuatorSet`] and [`TriggerPath`], fixed at construction
//! - [`controller`]: the [`PlaybackController`] state machine and its
//!   completion task
//! - [`vibrator`]: the [`Vibrator`] facade callers use
//! - [`simulated`]: in-memory backends for tests and bring-up
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use haptics_calibration::CalibrationProfile;
//! use haptics_effects::{Effect, EffectStrength};
//! use haptics_playback::{
//!     ActuatorSet, PlaybackConfig, SimulatedActuator, TriggerPath, Vibrator,
//! };
//!
//! let actuator = Arc::new(SimulatedActuator::new("base").with_auto_complete(true));
//! let vibrator = Vibrator::new(
//!     CalibrationProfile::default(),
//!     ActuatorSet::single(actuator),
//!     TriggerPath::Direct,
//!     PlaybackConfig::default(),
//! )?;
//!
//! let duration = vibrator.perform(Effect::Click, EffectStrength::Strong, None)?;
//! assert_eq!(duration, 18);
//! assert!(vibrator.wait_for_completion(Duration::from_secs(1)));
//! # Ok::<(), haptics_errors::HapticError>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod actuator;
pub mod config;
pub mod controller;
pub mod session;
pub mod simulated;
pub mod topology;
pub mod vibrator;

pub use actuator::{Actuator, EraseTarget, GpioTrigger, VibeState};
pub use config::{PlaybackConfig, PlaybackConfigBuilder};
pub use controller::{
    CallbackError, CompletionCallback, F0Offsets, FULL_GAIN, PlaybackController, PlaybackRequest,
};
pub use session::{PlaybackSession, PlaybackState};
pub use simulated::{FaultSet, SIMULATED_STORAGE_BYTES, SimulatedActuator, SimulatedGpio};
pub use topology::{ActuatorSet, TriggerPath};
pub use vibrator::{
    Capabilities, FREQUENCY_RESOLUTION_HZ, LONG_VIBRATION_THRESHOLD_MS, MAX_TIME_MS, Vibrator,
};
