//! Playback state machine.
//!
//! ```text
//! Idle ──start(waveform)──► Uploading ──trigger──► Playing
//!   ▲  ──start(physical)─────────────────────────►   │
//!   │                                                │
//!   └──────────── completion task / stop() ◄─────────┘
//! ```
//!
//! At most one effect is in flight. Each successful start spawns a named
//! completion thread that is the sole owner of post-playback cleanup and
//! signals the controller over a single-slot channel when it is done. A new
//! start waits a bounded time for that signal.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{self, Receiver, RecvTimeoutError};
use haptics_errors::{DeviceError, DeviceResult, ErrorSeverity, HapticError, HapticResult};
use haptics_owt_protocol::{EffectSlot, PHYSICAL_SLOT_COUNT, TriggerBinding, WaveformBlob};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::actuator::{Actuator, EraseTarget, VibeState};
use crate::config::PlaybackConfig;
use crate::session::PlaybackSession;
use crate::topology::{ActuatorSet, TriggerPath};

/// Gain written when no effect-specific level applies.
pub const FULL_GAIN: u8 = 100;

/// Error a completion callback may report. It is logged, never surfaced.
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// Invoked once by the completion task after cleanup.
pub type CompletionCallback = Box<dyn FnOnce() -> Result<(), CallbackError> + Send + 'static>;

/// What to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackRequest {
    /// A physical slot with a caller-chosen duration (long/short vibration).
    Timed { slot: EffectSlot, duration_ms: u16 },
    /// A physical slot at its firmware-controlled duration.
    Physical(EffectSlot),
    /// An encoded blob for the dynamic slot matching its format.
    Waveform(WaveformBlob),
}

impl PlaybackRequest {
    pub fn slot(&self) -> EffectSlot {
        match self {
            PlaybackRequest::Timed { slot, .. } | PlaybackRequest::Physical(slot) => *slot,
            PlaybackRequest::Waveform(blob) => blob.format().slot(),
        }
    }
}

/// Frequency offsets applied during timed vibrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct F0Offsets {
    pub primary: u32,
    pub secondary: u32,
}

/// Completion task of the most recent start.
struct PendingCompletion {
    done: Receiver<()>,
    handle: JoinHandle<()>,
}

/// State shared with the completion task.
struct ControllerCore {
    actuators: ActuatorSet,
    trigger: TriggerPath,
    config: PlaybackConfig,
    session: Mutex<PlaybackSession>,
}

/// Drives one logical vibrator: one or two actuators and a trigger path.
pub struct PlaybackController {
    core: Arc<ControllerCore>,
    pending: Mutex<Option<PendingCompletion>>,
    f0_offsets: F0Offsets,
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("actuators", &self.core.actuators)
            .field("trigger", &self.core.trigger)
            .field("session", &*self.core.session.lock())
            .finish_non_exhaustive()
    }
}

impl PlaybackController {
    pub fn new(actuators: ActuatorSet, trigger: TriggerPath, config: PlaybackConfig) -> Self {
        Self {
            core: Arc::new(ControllerCore {
                actuators,
                trigger,
                config,
                session: Mutex::new(PlaybackSession::new()),
            }),
            pending: Mutex::new(None),
            f0_offsets: F0Offsets::default(),
        }
    }

    #[must_use]
    pub fn with_f0_offsets(mut self, offsets: F0Offsets) -> Self {
        self.f0_offsets = offsets;
        self
    }

    pub fn actuators(&self) -> &ActuatorSet {
        &self.core.actuators
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.core.config
    }

    /// Snapshot of the current session.
    pub fn session(&self) -> PlaybackSession {
        *self.core.session.lock()
    }

    /// Start playback and hand cleanup to a completion task.
    ///
    /// # Errors
    ///
    /// - `IllegalState` if the previous playback is still pending or any
    ///   hardware step fails; the session is back to idle.
    /// - `ResourceExhausted` if a waveform does not fit an actuator's free
    ///   storage.
    pub fn start(
        &self,
        request: PlaybackRequest,
        callback: Option<CompletionCallback>,
    ) -> HapticResult<()> {
        let mut pending = self.pending.lock();
        self.await_previous(&mut pending)?;

        let core = &self.core;
        let slot = request.slot();
        let binding = core.trigger.binding(slot);

        let (primary_id, secondary_id) = match &request {
            PlaybackRequest::Waveform(blob) => core.upload(blob, binding)?,
            PlaybackRequest::Timed { slot, duration_ms } => {
                for actuator in core.actuators.iter() {
                    actuator
                        .set_effect_duration(*slot, *duration_ms, binding)
                        .map_err(|e| {
                            error!(actuator = actuator.name(), slot = ?slot, error = %e, "Failed to edit effect");
                            HapticError::from(e)
                        })?;
                }
                let id = slot.index();
                (id, core.actuators.is_dual().then_some(id))
            }
            PlaybackRequest::Physical(slot) => {
                let id = slot.index();
                (id, core.actuators.is_dual().then_some(id))
            }
        };

        {
            let mut session = core.session.lock();
            session.start_playing(primary_id, secondary_id);
            if let Err(e) = core.trigger_playback(&request, primary_id, secondary_id) {
                if matches!(request, PlaybackRequest::Waveform(_)) {
                    core.discard_upload(primary_id, secondary_id);
                }
                session.clear();
                return Err(e);
            }
        }

        let (done_tx, done_rx) = channel::bounded(1);
        let task_core = Arc::clone(core);
        let span = tracing::Span::current();
        let handle = thread::Builder::new()
            .name(format!("haptics-complete-{primary_id}"))
            .spawn(move || {
                span.in_scope(|| task_core.wait_for_complete(callback));
                if done_tx.send(()).is_err() {
                    debug!("Controller dropped before completion was observed");
                }
            })
            .map_err(|e| {
                error!(error = %e, "Failed to spawn completion task");
                core.session.lock().clear();
                HapticError::illegal_state(format!("failed to spawn completion task: {e}"))
            })?;

        *pending = Some(PendingCompletion {
            done: done_rx,
            handle,
        });
        debug!(effect_id = primary_id, slot = ?slot, "Playback started");
        Ok(())
    }

    /// Stop the active effect and restore the gain and frequency baseline.
    ///
    /// Succeeds without I/O on the playing path when nothing is active. The
    /// completion task is left to finish on its own.
    ///
    /// # Errors
    ///
    /// `IllegalState` if a stop request or the GPIO reset fails.
    pub fn stop(&self) -> HapticResult<()> {
        let core = &self.core;
        let mut session = core.session.lock();
        let mut failure: Option<DeviceError> = None;

        if let Some(active) = session.active_id() {
            debug!(effect_id = active, "Stopping active effect");
            for (actuator, id) in core.with_ids(active, session.secondary_id()) {
                if let Err(e) = actuator.set_playing(id, false) {
                    error!(actuator = actuator.name(), effect_id = id, error = %e, "Failed to stop effect");
                    failure = Some(e);
                }
            }
            if let Some(gpio) = core.trigger.gpio() {
                gpio.set_output(false).map_err(|e| {
                    error!(error = %e, "Failed to reset GPIO");
                    HapticError::from(e)
                })?;
            }
        } else {
            debug!("Vibrator is already off");
        }

        if let Err(e) = core.set_gain(FULL_GAIN) {
            warn!(error = %e, "Failed to restore full gain");
        }
        if self.f0_offsets.primary != 0 {
            core.write_f0_offsets(F0Offsets::default(), self.f0_offsets);
        }

        match failure {
            Some(e) => Err(e.into()),
            None => {
                session.clear();
                debug!("Stop done");
                Ok(())
            }
        }
    }

    /// Write the gain on every actuator.
    ///
    /// # Errors
    ///
    /// `IllegalState` on the first actuator that rejects the write.
    pub fn set_gain(&self, scale: u8) -> HapticResult<()> {
        self.core.set_gain(scale).map_err(HapticError::from)
    }

    /// Apply the configured frequency offsets, if any.
    pub fn apply_f0_offsets(&self) {
        if self.f0_offsets.primary != 0 {
            self.core.write_f0_offsets(self.f0_offsets, self.f0_offsets);
        }
    }

    /// Block until the last completion task has finished or `timeout` expires.
    ///
    /// Returns whether the controller is ready for a new start.
    pub fn wait_for_completion(&self, timeout: Duration) -> bool {
        let mut pending = self.pending.lock();
        Self::reap(&mut pending, timeout)
    }

    fn await_previous(&self, pending: &mut Option<PendingCompletion>) -> HapticResult<()> {
        if Self::reap(pending, self.core.config.completion_wait()) {
            return Ok(());
        }
        let session = self.core.session.lock();
        error!(active = ?session.active_id(), "Previous vibration pending");
        Err(HapticError::illegal_state("previous vibration still pending"))
    }

    fn reap(pending: &mut Option<PendingCompletion>, timeout: Duration) -> bool {
        let Some(task) = pending.as_ref() else {
            return true;
        };
        match task.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                if let Some(task) = pending.take()
                    && task.handle.join().is_err()
                {
                    error!("Completion task panicked");
                }
                true
            }
            Err(RecvTimeoutError::Timeout) => false,
        }
    }
}

impl ControllerCore {
    /// Pair each actuator in use with its effect id.
    fn with_ids(
        &self,
        primary_id: u16,
        secondary_id: Option<u16>,
    ) -> impl Iterator<Item = (&Arc<dyn Actuator>, u16)> {
        let secondary = self
            .actuators
            .secondary()
            .map(|actuator| (actuator, secondary_id.unwrap_or(primary_id)));
        std::iter::once((self.actuators.primary(), primary_id)).chain(secondary)
    }

    fn upload(
        &self,
        blob: &WaveformBlob,
        binding: Option<TriggerBinding>,
    ) -> HapticResult<(u16, Option<u16>)> {
        let slot = blob.format().slot();
        let required = blob.len();
        for actuator in self.actuators.iter() {
            let available = actuator.free_storage_bytes().map_err(|e| {
                error!(actuator = actuator.name(), error = %e, "Failed to read free wavetable space");
                HapticError::from(e)
            })?;
            if required > available {
                error!(actuator = actuator.name(), required, available, slot = ?slot, "Waveform does not fit");
                return Err(HapticError::resource_exhausted(
                    format!("wavetable storage on {}", actuator.name()),
                    required,
                    available,
                ));
            }
        }

        self.session.lock().begin_upload();
        let primary = self.actuators.primary();
        let primary_id = primary
            .upload_waveform(slot, blob.as_bytes(), binding)
            .map_err(|e| self.upload_failed(primary.name(), e))?;

        let secondary_id = match self.actuators.secondary() {
            Some(secondary) => {
                match secondary.upload_waveform(slot, blob.as_bytes(), binding) {
                    Ok(id) => Some(id),
                    Err(e) => {
                        if let Err(erase) = primary.erase(EraseTarget::Slot(primary_id)) {
                            warn!(error = %erase, effect_id = primary_id, "Failed to roll back primary upload");
                        }
                        return Err(self.upload_failed(secondary.name(), e));
                    }
                }
            }
            None => None,
        };
        debug!(slot = ?slot, bytes = required, effect_id = primary_id, "Waveform uploaded");
        Ok((primary_id, secondary_id))
    }

    /// Erase a dynamic effect that was uploaded but never started.
    fn discard_upload(&self, primary_id: u16, secondary_id: Option<u16>) {
        for (actuator, id) in self.with_ids(primary_id, secondary_id) {
            if let Err(e) = actuator.erase(EraseTarget::Slot(id)) {
                warn!(actuator = actuator.name(), effect_id = id, error = %e, "Failed to discard unplayed upload");
            }
        }
    }

    fn upload_failed(&self, actuator: &str, e: DeviceError) -> HapticError {
        error!(actuator, error = %e, "Failed to upload waveform");
        self.session.lock().clear();
        HapticError::from(e)
    }

    /// Fire the effect. Called with the session lock held.
    fn trigger_playback(
        &self,
        request: &PlaybackRequest,
        primary_id: u16,
        secondary_id: Option<u16>,
    ) -> HapticResult<()> {
        match &self.trigger {
            TriggerPath::Gpio(gpio) => {
                if let PlaybackRequest::Physical(slot) = request {
                    let binding = TriggerBinding::gpio_rising(*slot);
                    for actuator in self.actuators.iter() {
                        actuator.arm_trigger(*slot, binding).map_err(|e| {
                            error!(actuator = actuator.name(), slot = ?slot, error = %e, "Failed to arm trigger");
                            HapticError::from(e)
                        })?;
                    }
                }
                gpio.set_output(true).map_err(|e| {
                    error!(effect_id = primary_id, error = %e, "Failed to trigger effect by GPIO");
                    HapticError::from(e)
                })
            }
            TriggerPath::Direct => {
                for (actuator, id) in self.with_ids(primary_id, secondary_id) {
                    actuator.set_playing(id, true).map_err(|e| {
                        error!(actuator = actuator.name(), effect_id = id, error = %e, "Failed to play effect");
                        HapticError::from(e)
                    })?;
                }
                Ok(())
            }
        }
    }

    fn set_gain(&self, scale: u8) -> DeviceResult {
        for actuator in self.actuators.iter() {
            actuator.set_gain(scale).inspect_err(|e| {
                error!(actuator = actuator.name(), scale, error = %e, "Failed to set gain");
            })?;
        }
        Ok(())
    }

    /// Write `offsets`; the secondary is only touched when `configured` has one.
    fn write_f0_offsets(&self, offsets: F0Offsets, configured: F0Offsets) {
        let primary = self.actuators.primary();
        if let Err(e) = primary.set_f0_offset(offsets.primary) {
            warn!(actuator = primary.name(), error = %e, "Failed to write F0 offset");
        }
        if let Some(secondary) = self.actuators.secondary()
            && configured.secondary != 0
            && let Err(e) = secondary.set_f0_offset(offsets.secondary)
        {
            warn!(actuator = secondary.name(), error = %e, "Failed to write F0 offset");
        }
    }

    /// Body of the completion task.
    fn wait_for_complete(&self, callback: Option<CompletionCallback>) {
        debug!(callback = callback.is_some(), "Waiting for playback to complete");

        let primary = self.actuators.primary();
        if !primary.poll_state(VibeState::Haptic, Some(self.config.active_poll())) {
            debug!("Failed to get state \"Haptic\"");
        }
        for actuator in self.actuators.iter() {
            self.await_stopped(actuator.as_ref());
        }
        debug!("Playback stopped");

        {
            let mut session = self.session.lock();
            match session.active_id() {
                Some(active) if active >= PHYSICAL_SLOT_COUNT => {
                    for (actuator, id) in self.with_ids(active, session.secondary_id()) {
                        if let Err(e) = actuator.erase(EraseTarget::Slot(id)) {
                            report(&e, "Failed to clean up the composed effect");
                        }
                    }
                }
                Some(_) => {}
                None => debug!("Vibrator is already off"),
            }

            if let Some(gpio) = self.trigger.gpio()
                && let Err(e) = gpio.set_output(false)
            {
                report(&e, "Failed to reset GPIO");
            }

            for actuator in self.actuators.iter() {
                self.recovery_sweep(actuator.as_ref());
            }
            session.clear();
        }

        if let Some(callback) = callback
            && let Err(e) = callback()
        {
            error!(error = %e, "Failed completion callback");
        }
        info!("Playback complete");
    }

    /// Drop leaked dynamic effects once the table grows past the physical set.
    fn recovery_sweep(&self, actuator: &dyn Actuator) {
        let count = match actuator.live_effect_count() {
            Ok(count) => count,
            Err(e) => {
                warn!(actuator = actuator.name(), error = %e, "Failed to read effect count");
                return;
            }
        };
        if count > u32::from(PHYSICAL_SLOT_COUNT) {
            warn!(actuator = actuator.name(), count, "Stale dynamic effects, erasing all");
            if let Err(e) = actuator.erase(EraseTarget::AllDynamic) {
                report(&e, "Failed to clean up all composed effects");
            }
        }
    }

    /// Wait for `Stopped`; an expired bounded wait is logged and cleanup proceeds.
    fn await_stopped(&self, actuator: &dyn Actuator) {
        if actuator.poll_state(VibeState::Stopped, self.config.stop_poll()) {
            return;
        }
        let waited_ms = self.config.stop_poll_ms.map_or(0, u64::from);
        report(
            &DeviceError::timeout(actuator.name(), waited_ms),
            "Actuator did not report \"Stopped\"",
        );
    }
}

/// Log a failure the completion task cannot return, at its severity.
fn report(e: &DeviceError, message: &str) {
    match e.severity() {
        ErrorSeverity::Critical | ErrorSeverity::Error => {
            error!(error = %e, severity = %e.severity(), "{message}");
        }
        ErrorSeverity::Warning | ErrorSeverity::Info => {
            warn!(error = %e, severity = %e.severity(), "{message}");
        }
    }
}
