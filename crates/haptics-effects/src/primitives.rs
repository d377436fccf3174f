//! Caller-facing effect request types.

use haptics_owt_protocol::EffectSlot;
use serde::{Deserialize, Serialize};

pub use haptics_owt_protocol::Braking;

/// Building block of a composed effect.
///
/// The discriminant is the bit position in the supported-primitive mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum CompositePrimitive {
    /// Silence; carries only timing.
    Noop = 0,
    Click = 1,
    Thud = 2,
    Spin = 3,
    QuickRise = 4,
    SlowRise = 5,
    QuickFall = 6,
    LightTick = 7,
    LowTick = 8,
}

impl CompositePrimitive {
    pub const ALL: [CompositePrimitive; 9] = [
        CompositePrimitive::Noop,
        CompositePrimitive::Click,
        CompositePrimitive::Thud,
        CompositePrimitive::Spin,
        CompositePrimitive::QuickRise,
        CompositePrimitive::SlowRise,
        CompositePrimitive::QuickFall,
        CompositePrimitive::LightTick,
        CompositePrimitive::LowTick,
    ];

    /// Bit position in the supported-primitive mask.
    pub const fn bit(self) -> u32 {
        self as u32
    }

    /// Physical slot that plays the primitive. `Noop` has none.
    pub const fn slot(self) -> Option<EffectSlot> {
        match self {
            CompositePrimitive::Noop => None,
            CompositePrimitive::Click => Some(EffectSlot::Click),
            CompositePrimitive::Thud => Some(EffectSlot::Thud),
            CompositePrimitive::Spin => Some(EffectSlot::Spin),
            CompositePrimitive::QuickRise => Some(EffectSlot::QuickRise),
            CompositePrimitive::SlowRise => Some(EffectSlot::SlowRise),
            CompositePrimitive::QuickFall => Some(EffectSlot::QuickFall),
            CompositePrimitive::LightTick => Some(EffectSlot::LightTick),
            CompositePrimitive::LowTick => Some(EffectSlot::LowTick),
        }
    }
}

/// One step of a composition: wait `delay_ms`, then play `primitive` at `scale`.
///
/// # Examples
///
/// ```
/// use haptics_effects::{CompositeEffect, CompositePrimitive};
///
/// let step = CompositeEffect::new(CompositePrimitive::Click, 0.8).after(20);
/// assert_eq!(step.delay_ms, 20);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositeEffect {
    pub delay_ms: i32,
    pub primitive: CompositePrimitive,
    pub scale: f32,
}

impl CompositeEffect {
    pub fn new(primitive: CompositePrimitive, scale: f32) -> Self {
        Self {
            delay_ms: 0,
            primitive,
            scale,
        }
    }

    /// Set the silence that precedes this step.
    pub fn after(mut self, delay_ms: i32) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// Linear ramp from a start point to an end point of the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActivePwle {
    pub start_amplitude: f32,
    pub start_frequency_hz: f32,
    pub end_amplitude: f32,
    pub end_frequency_hz: f32,
    pub duration_ms: i32,
}

impl ActivePwle {
    pub fn new(duration_ms: i32, amplitude: (f32, f32), frequency_hz: (f32, f32)) -> Self {
        Self {
            start_amplitude: amplitude.0,
            start_frequency_hz: frequency_hz.0,
            end_amplitude: amplitude.1,
            end_frequency_hz: frequency_hz.1,
            duration_ms,
        }
    }
}

/// Silent hold, optionally with active braking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrakingPwle {
    pub braking: Braking,
    pub duration_ms: i32,
}

/// One entry of a PWLE composition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitivePwle {
    Active(ActivePwle),
    Braking(BrakingPwle),
}

impl PrimitivePwle {
    pub fn active(duration_ms: i32, amplitude: (f32, f32), frequency_hz: (f32, f32)) -> Self {
        PrimitivePwle::Active(ActivePwle::new(duration_ms, amplitude, frequency_hz))
    }

    pub fn braking(duration_ms: i32, braking: Braking) -> Self {
        PrimitivePwle::Braking(BrakingPwle {
            braking,
            duration_ms,
        })
    }
}

/// Predefined effects the driver can play without a composition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    TextureTick,
    Tick,
    Click,
    HeavyClick,
    DoubleClick,
}

impl Effect {
    pub const SUPPORTED: [Effect; 5] = [
        Effect::TextureTick,
        Effect::Tick,
        Effect::Click,
        Effect::HeavyClick,
        Effect::DoubleClick,
    ];
}

/// Strength of a predefined effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EffectStrength {
    Light,
    Medium,
    Strong,
}

impl EffectStrength {
    /// Base intensity before the per-effect factor is applied.
    pub const fn intensity(self) -> f32 {
        match self {
            EffectStrength::Light => 0.5,
            EffectStrength::Medium => 0.7,
            EffectStrength::Strong => 1.0,
        }
    }
}
