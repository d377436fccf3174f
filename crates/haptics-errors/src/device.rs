//! Actuator and GPIO I/O error types.
//!
//! These are the raw failures reported by the collaborators that talk to the
//! kernel input device and the trigger pin. The playback controller surfaces
//! them to callers as `IllegalState`.

use crate::common::ErrorSeverity;

/// Actuator and GPIO errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    /// Uploading a waveform into a dynamic slot failed
    #[error("Failed to upload waveform to {actuator}: {reason}")]
    UploadFailed {
        /// Actuator identifier
        actuator: String,
        /// Failure reason
        reason: String,
    },

    /// Editing a physical effect (duration or trigger) failed
    #[error("Failed to edit effect {effect_id} on {actuator}: {reason}")]
    EditFailed {
        /// Actuator identifier
        actuator: String,
        /// Effect identifier
        effect_id: u16,
        /// Failure reason
        reason: String,
    },

    /// Play or stop request was rejected
    #[error("Failed to {action} effect {effect_id} on {actuator}")]
    PlaybackFailed {
        /// Actuator identifier
        actuator: String,
        /// Effect identifier
        effect_id: u16,
        /// "play" or "stop"
        action: &'static str,
    },

    /// Erasing one or more uploaded effects failed
    #[error("Failed to erase {target} on {actuator}")]
    EraseFailed {
        /// Actuator identifier
        actuator: String,
        /// Human readable erase target
        target: String,
    },

    /// Gain or frequency-offset write failed
    #[error("Failed to write {property} on {actuator}")]
    PropertyWriteFailed {
        /// Actuator identifier
        actuator: String,
        /// Property name
        property: &'static str,
    },

    /// Trigger GPIO write failed
    #[error("GPIO {0} failed")]
    Gpio(String),

    /// Actuator did not reach the requested state in time
    #[error("Actuator {actuator} timeout after {timeout_ms}ms")]
    Timeout {
        /// Actuator identifier
        actuator: String,
        /// Timeout in milliseconds
        timeout_ms: u64,
    },

    /// Actuator is not present or the device node went away
    #[error("Actuator {0} is not available")]
    Unavailable(String),
}

impl DeviceError {
    /// Get the error severity.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            DeviceError::Gpio(_) | DeviceError::PlaybackFailed { .. } => ErrorSeverity::Critical,
            DeviceError::Timeout { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Create an upload failure.
    pub fn upload(actuator: impl Into<String>, reason: impl Into<String>) -> Self {
        DeviceError::UploadFailed {
            actuator: actuator.into(),
            reason: reason.into(),
        }
    }

    /// Create an edit failure.
    pub fn edit(actuator: impl Into<String>, effect_id: u16, reason: impl Into<String>) -> Self {
        DeviceError::EditFailed {
            actuator: actuator.into(),
            effect_id,
            reason: reason.into(),
        }
    }

    /// Create a play-request failure.
    pub fn play(actuator: impl Into<String>, effect_id: u16) -> Self {
        DeviceError::PlaybackFailed {
            actuator: actuator.into(),
            effect_id,
            action: "play",
        }
    }

    /// Create a stop-request failure.
    pub fn stop(actuator: impl Into<String>, effect_id: u16) -> Self {
        DeviceError::PlaybackFailed {
            actuator: actuator.into(),
            effect_id,
            action: "stop",
        }
    }

    /// Create an erase failure.
    pub fn erase(actuator: impl Into<String>, target: impl Into<String>) -> Self {
        DeviceError::EraseFailed {
            actuator: actuator.into(),
            target: target.into(),
        }
    }

    /// Create a gain write failure.
    pub fn gain(actuator: impl Into<String>) -> Self {
        DeviceError::PropertyWriteFailed {
            actuator: actuator.into(),
            property: "gain",
        }
    }

    /// Create a frequency-offset write failure.
    pub fn f0_offset(actuator: impl Into<String>) -> Self {
        DeviceError::PropertyWriteFailed {
            actuator: actuator.into(),
            property: "f0_offset",
        }
    }

    /// Create a GPIO failure.
    pub fn gpio(operation: impl Into<String>) -> Self {
        DeviceError::Gpio(operation.into())
    }

    /// Create a timeout error.
    pub fn timeout(actuator: impl Into<String>, timeout_ms: u64) -> Self {
        DeviceError::Timeout {
            actuator: actuator.into(),
            timeout_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playback_failed_display() {
        let err = DeviceError::stop("secondary", 14);
        assert_eq!(err.to_string(), "Failed to stop effect 14 on secondary");
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_upload_display() {
        let err = DeviceError::upload("primary", "no space");
        assert!(err.to_string().contains("primary"));
        assert!(err.to_string().contains("no space"));
    }

    #[test]
    fn test_timeout_is_warning() {
        assert_eq!(DeviceError::timeout("primary", 20).severity(), ErrorSeverity::Warning);
    }
}
