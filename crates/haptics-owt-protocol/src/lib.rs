//! Open-wavetable (OWT) wire layer for haptic actuators.
//!
//! This crate is I/O-free. It knows the effect slot table, the trigger
//! binding word, and how to pack the two firmware waveform formats
//! (composed-effects lists and PWLE envelopes) into a capacity-bounded blob.
//! Nothing in here talks to a device.

#![deny(static_mut_refs)]

pub mod bitstream;
pub mod slots;
pub mod trigger;
pub mod types;

pub use bitstream::{
    COMPOSED_CAPACITY_BYTES, COMPOSED_SECTIONS_MAX, CompositeSegment, PWLE_CAPACITY_BYTES,
    PWLE_DURATION_MAX_MS, PWLE_FREQUENCY_MAX_HZ, PWLE_FREQUENCY_MIN_HZ, PWLE_LEVEL_MAX,
    PWLE_LEVEL_MIN, PWLE_SECTIONS_MAX, PWLE_TOTAL_DURATION_MAX_MS, PackError, PackResult,
    PwleSegment, WaveformBlob,
};
pub use slots::{EffectSlot, MAX_EFFECTS, PHYSICAL_DURATIONS_MS, PHYSICAL_SLOT_COUNT};
pub use trigger::{GPIO_TRIGGER_CONFIG, TriggerBinding};
pub use types::{Braking, WaveformFormat};
