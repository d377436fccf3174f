//! Effect slot table.
//!
//! Identifiers `0..=13` name waveforms baked into the actuator RAM bank
//! ("physical" slots). Two more identifiers address open-wavetable slots
//! that hold a blob uploaded for a single playback.

use serde::{Deserialize, Serialize};

/// Number of physical waveform slots.
pub const PHYSICAL_SLOT_COUNT: u16 = 14;

/// Upper bound of the kernel force-feedback effect table (`FF_MAX_EFFECTS`).
pub const MAX_EFFECTS: u16 = 96;

/// Firmware-controlled duration of each physical slot, in milliseconds.
pub const PHYSICAL_DURATIONS_MS: [u32; PHYSICAL_SLOT_COUNT as usize] =
    [1000, 100, 12, 1000, 300, 130, 150, 500, 100, 5, 12, 1000, 1000, 1000];

/// A waveform slot on the actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum EffectSlot {
    /// Timed vibration for requests of 50 ms and longer.
    LongVibration = 0,
    Reserved1 = 1,
    Click = 2,
    /// Timed vibration for requests shorter than 50 ms.
    ShortVibration = 3,
    Thud = 4,
    Spin = 5,
    QuickRise = 6,
    SlowRise = 7,
    QuickFall = 8,
    LightTick = 9,
    LowTick = 10,
    ReservedMfg1 = 11,
    ReservedMfg2 = 12,
    ReservedMfg3 = 13,
    /// Open-wavetable slot for composed primitive sequences.
    Composed = 14,
    /// Open-wavetable slot for piecewise-linear envelopes.
    PwleEnvelope = 15,
}

impl EffectSlot {
    /// All physical slots, in identifier order.
    pub const PHYSICAL: [EffectSlot; PHYSICAL_SLOT_COUNT as usize] = [
        EffectSlot::LongVibration,
        EffectSlot::Reserved1,
        EffectSlot::Click,
        EffectSlot::ShortVibration,
        EffectSlot::Thud,
        EffectSlot::Spin,
        EffectSlot::QuickRise,
        EffectSlot::SlowRise,
        EffectSlot::QuickFall,
        EffectSlot::LightTick,
        EffectSlot::LowTick,
        EffectSlot::ReservedMfg1,
        EffectSlot::ReservedMfg2,
        EffectSlot::ReservedMfg3,
    ];

    /// Numeric slot identifier.
    pub const fn index(self) -> u16 {
        self as u16
    }

    /// Look up a slot by identifier.
    pub fn from_index(index: u16) -> Option<Self> {
        match index {
            14 => Some(EffectSlot::Composed),
            15 => Some(EffectSlot::PwleEnvelope),
            _ => Self::PHYSICAL.get(usize::from(index)).copied(),
        }
    }

    /// True for the open-wavetable slots that hold uploaded blobs.
    pub const fn is_dynamic(self) -> bool {
        self.index() >= PHYSICAL_SLOT_COUNT
    }

    /// True for the two slots whose duration is rewritten per request.
    pub const fn is_timed_vibration(self) -> bool {
        matches!(self, EffectSlot::LongVibration | EffectSlot::ShortVibration)
    }

    /// Fixed firmware duration of a physical slot. Dynamic slots have none.
    pub fn duration_ms(self) -> Option<u32> {
        PHYSICAL_DURATIONS_MS.get(usize::from(self.index())).copied()
    }
}

impl TryFrom<u16> for EffectSlot {
    type Error = u16;

    fn try_from(index: u16) -> Result<Self, Self::Error> {
        Self::from_index(index).ok_or(index)
    }
}
