//! In-memory actuator and trigger pin.
//!
//! These model the kernel force-feedback device closely enough to run the
//! full playback lifecycle without hardware: ids are allocated like the
//! kernel does, storage shrinks on upload, and the firmware state is
//! observable through a condition variable. Faults can be injected per
//! operation.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use bitflags::bitflags;
use haptics_errors::{DeviceError, DeviceResult};
use haptics_owt_protocol::{EffectSlot, MAX_EFFECTS, PHYSICAL_SLOT_COUNT, TriggerBinding};
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::actuator::{Actuator, EraseTarget, GpioTrigger, VibeState};

/// Wavetable storage of a fresh simulated actuator.
pub const SIMULATED_STORAGE_BYTES: usize = 8192;

bitflags! {
    /// Operations a simulated device can be told to fail.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct FaultSet: u32 {
        const UPLOAD       = 1 << 0;
        const EDIT         = 1 << 1;
        const PLAY         = 1 << 2;
        const STOP         = 1 << 3;
        const GAIN         = 1 << 4;
        const ERASE        = 1 << 5;
        const F0_OFFSET    = 1 << 6;
        const FREE_SPACE   = 1 << 7;
        const EFFECT_COUNT = 1 << 8;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SimEffect {
    slot: EffectSlot,
    duration_ms: u16,
    trigger: Option<TriggerBinding>,
    bytes: usize,
}

#[derive(Debug)]
struct SimState {
    effects: BTreeMap<u16, SimEffect>,
    vibe: VibeState,
    playing: Option<u16>,
    last_armed: Option<u16>,
    gain: u8,
    f0_offset: u32,
    free_bytes: usize,
    faults: FaultSet,
    auto_complete: bool,
    play_count: u32,
    upload_count: u32,
}

impl SimState {
    fn check(&self, op: FaultSet) -> bool {
        self.faults.contains(op)
    }
}

/// Actuator backed by memory.
#[derive(Debug)]
pub struct SimulatedActuator {
    name: String,
    state: Mutex<SimState>,
    changed: Condvar,
}

impl SimulatedActuator {
    /// A manual-completion actuator: playback ends only on
    /// [`finish_playback`](Self::finish_playback) or a stop.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(SimState {
                effects: BTreeMap::new(),
                vibe: VibeState::Stopped,
                playing: None,
                last_armed: None,
                gain: 100,
                f0_offset: 0,
                free_bytes: SIMULATED_STORAGE_BYTES,
                faults: FaultSet::empty(),
                auto_complete: false,
                play_count: 0,
                upload_count: 0,
            }),
            changed: Condvar::new(),
        }
    }

    /// Finish every playback as soon as someone waits for it to stop.
    #[must_use]
    pub fn with_auto_complete(self, enabled: bool) -> Self {
        self.state.lock().auto_complete = enabled;
        self
    }

    #[must_use]
    pub fn with_storage(self, bytes: usize) -> Self {
        self.state.lock().free_bytes = bytes;
        self
    }

    pub fn into_shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn inject_faults(&self, faults: FaultSet) {
        self.state.lock().faults.insert(faults);
    }

    pub fn clear_faults(&self) {
        self.state.lock().faults = FaultSet::empty();
    }

    /// Firmware reports the current effect as finished.
    pub fn finish_playback(&self) {
        let mut state = self.state.lock();
        state.vibe = VibeState::Stopped;
        state.playing = None;
        self.changed.notify_all();
    }

    /// Rising edge on the trigger pin: start the most recently armed effect.
    pub fn fire_trigger(&self) {
        let mut state = self.state.lock();
        if let Some(id) = state.last_armed {
            trace!(actuator = %self.name, effect_id = id, "trigger fired");
            state.playing = Some(id);
            state.vibe = VibeState::Haptic;
            state.play_count += 1;
            self.changed.notify_all();
        }
    }

    /// Register a dynamic effect nobody will clean up.
    pub fn insert_stale_effect(&self) -> Option<u16> {
        let mut state = self.state.lock();
        let id = next_free_id(&state.effects)?;
        state.effects.insert(
            id,
            SimEffect {
                slot: EffectSlot::Composed,
                duration_ms: 0,
                trigger: None,
                bytes: 0,
            },
        );
        Some(id)
    }

    pub fn gain(&self) -> u8 {
        self.state.lock().gain
    }

    pub fn f0_offset(&self) -> u32 {
        self.state.lock().f0_offset
    }

    pub fn vibe_state(&self) -> VibeState {
        self.state.lock().vibe
    }

    pub fn playing(&self) -> Option<u16> {
        self.state.lock().playing
    }

    pub fn effect_ids(&self) -> Vec<u16> {
        self.state.lock().effects.keys().copied().collect()
    }

    pub fn effect_duration(&self, id: u16) -> Option<u16> {
        self.state.lock().effects.get(&id).map(|e| e.duration_ms)
    }

    pub fn trigger_for(&self, id: u16) -> Option<TriggerBinding> {
        self.state.lock().effects.get(&id).and_then(|e| e.trigger)
    }

    pub fn free_bytes(&self) -> usize {
        self.state.lock().free_bytes
    }

    pub fn play_count(&self) -> u32 {
        self.state.lock().play_count
    }

    pub fn upload_count(&self) -> u32 {
        self.state.lock().upload_count
    }
}

fn next_free_id(effects: &BTreeMap<u16, SimEffect>) -> Option<u16> {
    (PHYSICAL_SLOT_COUNT..MAX_EFFECTS).find(|id| !effects.contains_key(id))
}

impl Actuator for SimulatedActuator {
    fn name(&self) -> &str {
        &self.name
    }

    fn upload_waveform(
        &self,
        slot: EffectSlot,
        bytes: &[u8],
        trigger: Option<TriggerBinding>,
    ) -> DeviceResult<u16> {
        let mut state = self.state.lock();
        if state.check(FaultSet::UPLOAD) {
            return Err(DeviceError::upload(&self.name, "injected fault"));
        }
        if bytes.len() > state.free_bytes {
            return Err(DeviceError::upload(&self.name, "no space left in wavetable"));
        }
        let id = next_free_id(&state.effects)
            .ok_or_else(|| DeviceError::upload(&self.name, "effect table full"))?;
        state.effects.insert(
            id,
            SimEffect {
                slot,
                duration_ms: 0,
                trigger,
                bytes: bytes.len(),
            },
        );
        state.free_bytes -= bytes.len();
        state.upload_count += 1;
        if trigger.is_some() {
            state.last_armed = Some(id);
        }
        trace!(actuator = %self.name, effect_id = id, bytes = bytes.len(), "uploaded");
        Ok(id)
    }

    fn set_effect_duration(
        &self,
        slot: EffectSlot,
        duration_ms: u16,
        trigger: Option<TriggerBinding>,
    ) -> DeviceResult {
        let mut state = self.state.lock();
        if state.check(FaultSet::EDIT) {
            return Err(DeviceError::edit(&self.name, slot.index(), "injected fault"));
        }
        let id = slot.index();
        state.effects.insert(
            id,
            SimEffect {
                slot,
                duration_ms,
                trigger,
                bytes: 0,
            },
        );
        if trigger.is_some() {
            state.last_armed = Some(id);
        }
        Ok(())
    }

    fn arm_trigger(&self, slot: EffectSlot, binding: TriggerBinding) -> DeviceResult {
        let mut state = self.state.lock();
        if state.check(FaultSet::EDIT) {
            return Err(DeviceError::edit(&self.name, slot.index(), "injected fault"));
        }
        let id = slot.index();
        let effect = state
            .effects
            .get_mut(&id)
            .ok_or_else(|| DeviceError::edit(&self.name, id, "effect not installed"))?;
        effect.trigger = Some(binding);
        state.last_armed = Some(id);
        Ok(())
    }

    fn set_playing(&self, effect_id: u16, play: bool) -> DeviceResult {
        let mut state = self.state.lock();
        if play {
            if state.check(FaultSet::PLAY) || !state.effects.contains_key(&effect_id) {
                return Err(DeviceError::play(&self.name, effect_id));
            }
            state.playing = Some(effect_id);
            state.vibe = VibeState::Haptic;
            state.play_count += 1;
        } else {
            if state.check(FaultSet::STOP) {
                return Err(DeviceError::stop(&self.name, effect_id));
            }
            state.playing = None;
            state.vibe = VibeState::Stopped;
        }
        self.changed.notify_all();
        Ok(())
    }

    fn set_gain(&self, scale: u8) -> DeviceResult {
        let mut state = self.state.lock();
        if state.check(FaultSet::GAIN) {
            return Err(DeviceError::gain(&self.name));
        }
        state.gain = scale;
        Ok(())
    }

    fn free_storage_bytes(&self) -> DeviceResult<usize> {
        let state = self.state.lock();
        if state.check(FaultSet::FREE_SPACE) {
            return Err(DeviceError::Unavailable(self.name.clone()));
        }
        Ok(state.free_bytes)
    }

    fn erase(&self, target: EraseTarget) -> DeviceResult {
        let mut state = self.state.lock();
        if state.check(FaultSet::ERASE) {
            return Err(DeviceError::erase(&self.name, target.to_string()));
        }
        let doomed: Vec<u16> = match target {
            EraseTarget::Slot(id) => vec![id],
            EraseTarget::AllDynamic => state
                .effects
                .keys()
                .copied()
                .filter(|id| *id >= PHYSICAL_SLOT_COUNT)
                .collect(),
        };
        for id in doomed {
            if let Some(effect) = state.effects.remove(&id) {
                state.free_bytes += effect.bytes;
            }
        }
        Ok(())
    }

    fn live_effect_count(&self) -> DeviceResult<u32> {
        let state = self.state.lock();
        if state.check(FaultSet::EFFECT_COUNT) {
            return Err(DeviceError::Unavailable(self.name.clone()));
        }
        Ok(u32::try_from(state.effects.len()).unwrap_or(u32::MAX))
    }

    fn poll_state(&self, wanted: VibeState, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();
        loop {
            if state.auto_complete && wanted == VibeState::Stopped && state.vibe == VibeState::Haptic
            {
                state.vibe = VibeState::Stopped;
                state.playing = None;
            }
            if state.vibe == wanted {
                return true;
            }
            match deadline {
                Some(deadline) => {
                    if self.changed.wait_until(&mut state, deadline).timed_out() {
                        return state.vibe == wanted;
                    }
                }
                None => self.changed.wait(&mut state),
            }
        }
    }

    fn set_f0_offset(&self, offset: u32) -> DeviceResult {
        let mut state = self.state.lock();
        if state.check(FaultSet::F0_OFFSET) {
            return Err(DeviceError::f0_offset(&self.name));
        }
        state.f0_offset = offset;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct GpioState {
    level: bool,
    fail_on_level: Option<bool>,
    rising_edges: u32,
}

/// Trigger pin wired to a set of simulated actuators.
#[derive(Debug)]
pub struct SimulatedGpio {
    capable: bool,
    state: Mutex<GpioState>,
    wired: Vec<Arc<SimulatedActuator>>,
}

impl SimulatedGpio {
    pub fn new(wired: Vec<Arc<SimulatedActuator>>) -> Self {
        Self {
            capable: true,
            state: Mutex::new(GpioState::default()),
            wired,
        }
    }

    /// A pin that failed to initialise.
    pub fn absent() -> Self {
        Self {
            capable: false,
            state: Mutex::new(GpioState::default()),
            wired: Vec::new(),
        }
    }

    /// Make writes of `level` fail; `None` clears the fault.
    pub fn fail_on_level(&self, level: Option<bool>) {
        self.state.lock().fail_on_level = level;
    }

    pub fn level(&self) -> bool {
        self.state.lock().level
    }

    pub fn rising_edges(&self) -> u32 {
        self.state.lock().rising_edges
    }
}

impl GpioTrigger for SimulatedGpio {
    fn is_capable(&self) -> bool {
        self.capable
    }

    fn set_output(&self, high: bool) -> DeviceResult {
        let rising = {
            let mut state = self.state.lock();
            if state.fail_on_level == Some(high) {
                return Err(DeviceError::gpio(if high { "set high" } else { "set low" }));
            }
            let rising = high && !state.level;
            state.level = high;
            if rising {
                state.rising_edges += 1;
            }
            rising
        };
        if rising {
            for actuator in &self.wired {
                actuator.fire_trigger();
            }
        }
        Ok(())
    }
}
