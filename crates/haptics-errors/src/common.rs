//! Top-level error type and classification shared by every haptics crate.

use core::fmt;

use crate::{DeviceError, ValidationError};

/// Top-level error type returned by the public haptics surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum HapticError {
    /// Caller input rejected before any hardware I/O.
    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] ValidationError),

    /// Operation not available on this hardware configuration.
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// The driver or hardware is not in a state that allows the operation.
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// An actuator command failed.
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    /// An encoded waveform does not fit the format or the device.
    #[error("{resource} exhausted: need {required} bytes, {available} available")]
    ResourceExhausted {
        /// What ran out (format buffer, actuator storage, ...)
        resource: String,
        /// Bytes required
        required: usize,
        /// Bytes available
        available: usize,
    },
}

impl HapticError {
    /// Classify the error into one of the four caller-visible outcomes.
    ///
    /// Raw device failures surface as `IllegalState`: the hardware may now be
    /// in a degraded state and the caller is expected to re-query and retry
    /// `off`.
    pub fn kind(&self) -> ErrorKind {
        match self {
            HapticError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            HapticError::Unsupported(_) => ErrorKind::Unsupported,
            HapticError::IllegalState(_) | HapticError::Device(_) => ErrorKind::IllegalState,
            HapticError::ResourceExhausted { .. } => ErrorKind::ResourceExhausted,
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>) -> Self {
        HapticError::Unsupported(operation.into())
    }

    /// Create an illegal-state error.
    pub fn illegal_state(reason: impl Into<String>) -> Self {
        HapticError::IllegalState(reason.into())
    }

    /// Create a resource-exhausted error.
    pub fn resource_exhausted(resource: impl Into<String>, required: usize, available: usize) -> Self {
        HapticError::ResourceExhausted {
            resource: resource.into(),
            required,
            available,
        }
    }
}

/// Caller-visible outcome class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ErrorKind {
    /// Input outside a declared range
    InvalidArgument = 0,
    /// Not available on this hardware
    Unsupported = 1,
    /// Hardware failure or pending playback
    IllegalState = 2,
    /// Blob too large for the format or the device
    ResourceExhausted = 3,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::InvalidArgument => write!(f, "InvalidArgument"),
            ErrorKind::Unsupported => write!(f, "Unsupported"),
            ErrorKind::IllegalState => write!(f, "IllegalState"),
            ErrorKind::ResourceExhausted => write!(f, "ResourceExhausted"),
        }
    }
}

/// Error severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ErrorSeverity {
    /// Informational, no action required
    Info = 0,
    /// Warning, may require attention
    Warning = 1,
    /// Error, operation failed
    Error = 2,
    /// Critical, hardware may be in an unstable state
    Critical = 3,
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorSeverity::Info => write!(f, "INFO"),
            ErrorSeverity::Warning => write!(f, "WARN"),
            ErrorSeverity::Error => write!(f, "ERROR"),
            ErrorSeverity::Critical => write!(f, "CRITICAL"),
        }
    }
}
