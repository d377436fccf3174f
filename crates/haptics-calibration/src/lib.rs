//! Actuator calibration profile
//!
//! Volume ranges, per-primitive scale clamps, frequency offsets and the raw
//! Q-format resonance values of one haptic device. The profile is loaded by
//! an external collaborator and is read-only to the driver.

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used)]

pub mod profile;
pub mod q_format;
pub mod types;

pub use profile::*;
pub use q_format::*;
pub use types::*;

use haptics_errors::{HapticError, ValidationError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Invalid {category} volume range [{min}, {max}]")]
    InvalidVolumeRange {
        category: VolumeCategory,
        min: u32,
        max: u32,
    },

    #[error("Invalid scale clamp for primitive bit {bit}: [{min}, {max}]")]
    InvalidScaleClamp { bit: usize, min: f32, max: f32 },

    #[error("Supported-primitive mask {0:#x} names unknown primitives")]
    UnknownPrimitiveBits(u32),

    #[error("Long frequency shift {0} does not fit the F0 offset field")]
    FrequencyShiftOutOfRange(i32),

    #[error("Calibration lists no braking modes")]
    NoBrakingModes,
}

pub type CalibrationResult<T> = Result<T, CalibrationError>;

impl From<CalibrationError> for HapticError {
    fn from(err: CalibrationError) -> Self {
        HapticError::InvalidArgument(ValidationError::constraint(err.to_string()))
    }
}
