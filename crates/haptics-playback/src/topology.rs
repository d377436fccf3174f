//! Hardware capability sets fixed at construction.

use std::sync::Arc;

use haptics_owt_protocol::{EffectSlot, TriggerBinding};

use crate::actuator::{Actuator, GpioTrigger};

/// The actuators driven as one logical device.
#[derive(Clone)]
pub enum ActuatorSet {
    Single(Arc<dyn Actuator>),
    /// Two physically independent actuators that always play the same effect.
    Dual {
        primary: Arc<dyn Actuator>,
        secondary: Arc<dyn Actuator>,
    },
}

impl ActuatorSet {
    pub fn single(actuator: Arc<dyn Actuator>) -> Self {
        ActuatorSet::Single(actuator)
    }

    pub fn dual(primary: Arc<dyn Actuator>, secondary: Arc<dyn Actuator>) -> Self {
        ActuatorSet::Dual { primary, secondary }
    }

    pub fn is_dual(&self) -> bool {
        matches!(self, ActuatorSet::Dual { .. })
    }

    pub fn primary(&self) -> &Arc<dyn Actuator> {
        match self {
            ActuatorSet::Single(actuator) => actuator,
            ActuatorSet::Dual { primary, .. } => primary,
        }
    }

    pub fn secondary(&self) -> Option<&Arc<dyn Actuator>> {
        match self {
            ActuatorSet::Single(_) => None,
            ActuatorSet::Dual { secondary, .. } => Some(secondary),
        }
    }

    /// Primary first, then the secondary when dual.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Actuator>> {
        std::iter::once(self.primary()).chain(self.secondary())
    }
}

impl std::fmt::Debug for ActuatorSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.iter().map(|a| a.name()).collect();
        f.debug_struct("ActuatorSet")
            .field("dual", &self.is_dual())
            .field("actuators", &names)
            .finish()
    }
}

/// How playback is started once effects are in place.
#[derive(Clone)]
pub enum TriggerPath {
    /// Arm trigger bindings, then raise the GPIO line.
    Gpio(Arc<dyn GpioTrigger>),
    /// Send a play command to each actuator.
    Direct,
}

impl TriggerPath {
    /// Use the pin when it is present and initialised, else fall back to direct play.
    pub fn detect(gpio: Option<Arc<dyn GpioTrigger>>) -> Self {
        match gpio {
            Some(pin) if pin.is_capable() => TriggerPath::Gpio(pin),
            Some(_) => {
                tracing::error!("GPIO initialization failed, using direct play");
                TriggerPath::Direct
            }
            None => TriggerPath::Direct,
        }
    }

    pub fn is_gpio(&self) -> bool {
        matches!(self, TriggerPath::Gpio(_))
    }

    pub fn gpio(&self) -> Option<&Arc<dyn GpioTrigger>> {
        match self {
            TriggerPath::Gpio(pin) => Some(pin),
            TriggerPath::Direct => None,
        }
    }

    /// Binding attached to uploads and edits of `slot` on this path.
    pub fn binding(&self, slot: EffectSlot) -> Option<TriggerBinding> {
        self.is_gpio().then(|| TriggerBinding::gpio_rising(slot))
    }
}

impl std::fmt::Debug for TriggerPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriggerPath::Gpio(_) => write!(f, "TriggerPath::Gpio"),
            TriggerPath::Direct => write!(f, "TriggerPath::Direct"),
        }
    }
}
