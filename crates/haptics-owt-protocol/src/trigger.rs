//! Hardware trigger binding word.
//!
//! Bit layout of the 16-bit trigger button field:
//!
//! ```text
//! [15]    edge            1 = rising
//! [14:12] GPI pin         001 = GPI1
//! [11:9]  reserved
//! [8]     bank            0 = RAM, 1 = ROM
//! [7]     buzz generator  0 = off
//! [6:0]   waveform index
//! ```

use serde::{Deserialize, Serialize};

use crate::EffectSlot;

/// Rising edge on GPI1, RAM bank, no buzz generator.
pub const GPIO_TRIGGER_CONFIG: u16 = 0x9100;

const INDEX_MASK: u16 = 0x007F;

/// Trigger binding that lets the GPIO line start a slot without a play command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TriggerBinding(u16);

impl TriggerBinding {
    /// Binding that fires `slot` on a rising edge of GPI1.
    pub const fn gpio_rising(slot: EffectSlot) -> Self {
        Self(GPIO_TRIGGER_CONFIG | (slot.index() & INDEX_MASK))
    }

    /// Raw register value.
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// Waveform index the binding fires.
    pub const fn waveform_index(self) -> u16 {
        self.0 & INDEX_MASK
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_word() {
        assert_eq!(TriggerBinding::gpio_rising(EffectSlot::LongVibration).raw(), 0x9100);
        assert_eq!(TriggerBinding::gpio_rising(EffectSlot::Click).raw(), 0x9102);
        assert_eq!(TriggerBinding::gpio_rising(EffectSlot::PwleEnvelope).raw(), 0x910F);
        assert_eq!(TriggerBinding::gpio_rising(EffectSlot::Composed).waveform_index(), 14);
    }
}
