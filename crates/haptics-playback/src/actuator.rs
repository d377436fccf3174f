//! Collaborator contracts for the actuator device and the trigger pin.
//!
//! Implementations own the kernel input device (or a stand-in for it). The
//! controller only ever talks to hardware through these traits.

use std::fmt;
use std::time::Duration;

use haptics_errors::DeviceResult;
use haptics_owt_protocol::{EffectSlot, TriggerBinding};

/// Firmware playback state reported by the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VibeState {
    /// Playing a waveform.
    Haptic,
    /// Idle.
    Stopped,
}

impl fmt::Display for VibeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VibeState::Haptic => write!(f, "Haptic"),
            VibeState::Stopped => write!(f, "Stopped"),
        }
    }
}

/// What an erase request removes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EraseTarget {
    /// One uploaded effect.
    Slot(u16),
    /// Every uploaded effect above the physical table.
    AllDynamic,
}

impl fmt::Display for EraseTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EraseTarget::Slot(id) => write!(f, "effect {id}"),
            EraseTarget::AllDynamic => write!(f, "all dynamic effects"),
        }
    }
}

/// One haptic actuator behind a force-feedback input device.
///
/// All methods take `&self`; implementations synchronise internally so the
/// completion task can poll while the caller thread issues commands.
pub trait Actuator: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &str;

    /// Upload an encoded waveform into a dynamic slot.
    ///
    /// Returns the effect id the device assigned.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::UploadFailed` if the device rejects the blob.
    fn upload_waveform(
        &self,
        slot: EffectSlot,
        bytes: &[u8],
        trigger: Option<TriggerBinding>,
    ) -> DeviceResult<u16>;

    /// Rewrite the playback length (and optionally the trigger) of a physical slot.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::EditFailed` if the edit is rejected.
    fn set_effect_duration(
        &self,
        slot: EffectSlot,
        duration_ms: u16,
        trigger: Option<TriggerBinding>,
    ) -> DeviceResult;

    /// Bind a physical slot to the trigger pin, keeping its duration.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::EditFailed` if the edit is rejected.
    fn arm_trigger(&self, slot: EffectSlot, binding: TriggerBinding) -> DeviceResult;

    /// Start or stop playback of an effect.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::PlaybackFailed` if the request is rejected.
    fn set_playing(&self, effect_id: u16, play: bool) -> DeviceResult;

    /// Write the global gain, `0..=100`.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::PropertyWriteFailed` if the write fails.
    fn set_gain(&self, scale: u8) -> DeviceResult;

    /// Bytes left in the device's wavetable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the property cannot be read.
    fn free_storage_bytes(&self) -> DeviceResult<usize>;

    /// Remove uploaded effects.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::EraseFailed` if the device refuses.
    fn erase(&self, target: EraseTarget) -> DeviceResult;

    /// Number of effects currently registered, physical ones included.
    ///
    /// # Errors
    ///
    /// Returns an error if the property cannot be read.
    fn live_effect_count(&self) -> DeviceResult<u32>;

    /// Block until the firmware reports `state` or the timeout expires.
    ///
    /// `None` waits without limit. Returns whether the state was reached.
    fn poll_state(&self, state: VibeState, timeout: Option<Duration>) -> bool;

    /// Write the resonant frequency offset.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::PropertyWriteFailed` if the write fails.
    fn set_f0_offset(&self, offset: u32) -> DeviceResult;
}

/// Output pin that fires armed effects on every actuator at once.
pub trait GpioTrigger: Send + Sync {
    /// Whether the pin was found and initialised.
    fn is_capable(&self) -> bool;

    /// Drive the pin.
    ///
    /// # Errors
    ///
    /// Returns `DeviceError::Gpio` if the write fails.
    fn set_output(&self, high: bool) -> DeviceResult;
}
