//! Small value types shared by the encoder and its callers.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::EffectSlot;
use crate::bitstream::{COMPOSED_CAPACITY_BYTES, PWLE_CAPACITY_BYTES};

/// Braking applied by a PWLE braking segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Braking {
    /// No active braking; the envelope simply holds silence.
    #[default]
    None,
    /// Closed-loop active braking.
    Clab,
}

impl Braking {
    /// Whether the segment sets the brake flag.
    pub const fn is_active(self) -> bool {
        matches!(self, Braking::Clab)
    }
}

impl fmt::Display for Braking {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Braking::None => write!(f, "None"),
            Braking::Clab => write!(f, "Clab"),
        }
    }
}

/// Which of the two open-wavetable formats a blob carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WaveformFormat {
    /// A list of physical-slot references with inter-effect delays.
    ComposedEffects,
    /// A piecewise-linear amplitude/frequency envelope.
    PwleEnvelope,
}

impl WaveformFormat {
    /// Maximum encoded size accepted by the firmware for this format.
    pub const fn capacity(self) -> usize {
        match self {
            WaveformFormat::ComposedEffects => COMPOSED_CAPACITY_BYTES,
            WaveformFormat::PwleEnvelope => PWLE_CAPACITY_BYTES,
        }
    }

    /// Open-wavetable slot the blob is uploaded into.
    pub const fn slot(self) -> EffectSlot {
        match self {
            WaveformFormat::ComposedEffects => EffectSlot::Composed,
            WaveformFormat::PwleEnvelope => EffectSlot::PwleEnvelope,
        }
    }
}

impl fmt::Display for WaveformFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveformFormat::ComposedEffects => write!(f, "composed-effects"),
            WaveformFormat::PwleEnvelope => write!(f, "pwle"),
        }
    }
}
