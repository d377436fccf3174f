//! Playback lifecycle against simulated actuators.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use haptics_calibration::CalibrationProfile;
use haptics_effects::{CompositeEffect, CompositePrimitive, Effect, EffectStrength, PrimitivePwle};
use haptics_errors::{ErrorKind, HapticError};
use haptics_owt_protocol::{EffectSlot, PHYSICAL_SLOT_COUNT};
use haptics_playback::{
    ActuatorSet, CompletionCallback, FaultSet, PlaybackConfig, PlaybackState, SimulatedActuator,
    SimulatedGpio, TriggerPath, VibeState, Vibrator,
};

type TestResult = Result<(), Box<dyn std::error::Error>>;

const SETTLE: Duration = Duration::from_secs(2);

fn fast_config() -> Result<PlaybackConfig, HapticError> {
    PlaybackConfig::builder()
        .completion_wait_ms(10)
        .active_poll_ms(5)
        .build()
}

fn single(actuator: &Arc<SimulatedActuator>) -> Result<Vibrator, HapticError> {
    Vibrator::new(
        CalibrationProfile::default(),
        ActuatorSet::single(actuator.clone()),
        TriggerPath::Direct,
        fast_config()?,
    )
}

fn dual(
    primary: &Arc<SimulatedActuator>,
    secondary: &Arc<SimulatedActuator>,
) -> Result<Vibrator, HapticError> {
    Vibrator::new(
        CalibrationProfile::default(),
        ActuatorSet::dual(primary.clone(), secondary.clone()),
        TriggerPath::Direct,
        fast_config()?,
    )
}

fn counting_callback(counter: &Arc<AtomicU32>) -> Option<CompletionCallback> {
    let counter = Arc::clone(counter);
    Some(Box::new(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }))
}

fn composition() -> Vec<CompositeEffect> {
    vec![
        CompositeEffect::new(CompositePrimitive::Click, 0.8),
        CompositeEffect::new(CompositePrimitive::Thud, 0.4).after(20),
    ]
}

mod construction {
    use super::*;

    #[test]
    fn test_physical_table_installed() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let _vibrator = dual(&base, &flip)?;

        for actuator in [&base, &flip] {
            assert_eq!(actuator.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
            assert_eq!(actuator.effect_duration(EffectSlot::Click.index()), Some(12));
            assert_eq!(actuator.effect_duration(EffectSlot::SlowRise.index()), Some(500));
        }
        Ok(())
    }

    #[test]
    fn test_invalid_profile_rejected() {
        let base = SimulatedActuator::new("base").into_shared();
        let profile = CalibrationProfile::default().with_long_frequency_shift(5000);
        let result = Vibrator::new(
            profile,
            ActuatorSet::single(base),
            TriggerPath::Direct,
            PlaybackConfig::default(),
        );
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
    }

    #[test]
    fn test_absent_gpio_falls_back_to_direct() {
        let path = TriggerPath::detect(Some(Arc::new(SimulatedGpio::absent())));
        assert!(!path.is_gpio());
        assert!(!TriggerPath::detect(None).is_gpio());
    }
}

mod single_effect_in_flight {
    use super::*;

    #[test]
    fn test_pending_start_rejected_until_complete() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = single(&base)?;

        vibrator.on(100, None)?;
        assert_eq!(vibrator.session().state(), PlaybackState::Playing);
        assert_eq!(vibrator.session().active_id(), Some(EffectSlot::LongVibration.index()));

        let again = vibrator.on(100, None);
        assert_eq!(again.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));

        base.finish_playback();
        assert!(vibrator.wait_for_completion(SETTLE));
        assert!(vibrator.session().is_idle());

        vibrator.on(100, None)?;
        base.finish_playback();
        assert!(vibrator.wait_for_completion(SETTLE));
        Ok(())
    }

    #[test]
    fn test_timed_vibration_slot_and_duration() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let vibrator = single(&base)?;

        vibrator.on(20, None)?;
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(base.effect_duration(EffectSlot::ShortVibration.index()), Some(26));

        vibrator.on(50, None)?;
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(base.effect_duration(EffectSlot::LongVibration.index()), Some(56));

        // No room for the cold-start pad at the ceiling.
        vibrator.on(65_535, None)?;
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(base.effect_duration(EffectSlot::LongVibration.index()), Some(65_535));

        let too_long = vibrator.on(65_536, None);
        assert_eq!(too_long.err().map(|e| e.kind()), Some(ErrorKind::InvalidArgument));
        Ok(())
    }

    #[test]
    fn test_callback_runs_once_per_playback() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let vibrator = single(&base)?;
        let calls = Arc::new(AtomicU32::new(0));

        vibrator.perform(Effect::Tick, EffectStrength::Light, counting_callback(&calls))?;
        assert!(vibrator.wait_for_completion(SETTLE));
        vibrator.compose(&composition(), counting_callback(&calls))?;
        assert!(vibrator.wait_for_completion(SETTLE));

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        Ok(())
    }
}

mod dynamic_waveforms {
    use super::*;

    #[test]
    fn test_composed_slot_erased_after_completion() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let vibrator = single(&base)?;
        let free_before = base.free_bytes();

        let duration = vibrator.compose(&composition(), None)?;
        assert_eq!(duration, 12 + 20 + 300);
        assert!(vibrator.wait_for_completion(SETTLE));

        assert_eq!(base.upload_count(), 1);
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        assert_eq!(base.free_bytes(), free_before);
        assert_eq!(base.gain(), 100);
        Ok(())
    }

    #[test]
    fn test_storage_shortfall_is_resource_exhausted() -> TestResult {
        let base = SimulatedActuator::new("base").with_storage(8).into_shared();
        let vibrator = single(&base)?;

        let result = vibrator.compose(&composition(), None);
        assert!(matches!(
            result,
            Err(HapticError::ResourceExhausted { available: 8, .. })
        ));
        assert_eq!(base.upload_count(), 0);
        assert!(vibrator.session().is_idle());
        Ok(())
    }

    #[test]
    fn test_upload_failure_is_illegal_state() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = single(&base)?;
        base.inject_faults(FaultSet::UPLOAD);

        let result = vibrator.compose(&composition(), None);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert!(vibrator.session().is_idle());
        Ok(())
    }

    #[test]
    fn test_play_failure_discards_upload() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let vibrator = dual(&base, &flip)?;
        let free_before = flip.free_bytes();
        flip.inject_faults(FaultSet::PLAY);

        let result = vibrator.compose(&composition(), None);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert!(vibrator.session().is_idle());
        for actuator in [&base, &flip] {
            assert_eq!(actuator.upload_count(), 1);
            assert_eq!(actuator.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        }
        assert_eq!(flip.free_bytes(), free_before);
        Ok(())
    }

    #[test]
    fn test_double_click_uploads_composition() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let vibrator = single(&base)?;

        let duration = vibrator.perform(Effect::DoubleClick, EffectStrength::Strong, None)?;
        assert_eq!(duration, 137);
        assert_eq!(base.upload_count(), 1);
        assert!(vibrator.wait_for_completion(SETTLE));
        Ok(())
    }

    #[test]
    fn test_pwle_requires_capability() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let request = [
            PrimitivePwle::active(100, (0.0, 0.5), (50.0, 50.0)),
            PrimitivePwle::braking(20, haptics_effects::Braking::None),
        ];

        let plain = single(&base)?;
        assert!(matches!(
            plain.compose_pwle(&request, None),
            Err(HapticError::Unsupported(_))
        ));
        drop(plain);

        let chirping = Vibrator::new(
            CalibrationProfile::default().with_chirp(true),
            ActuatorSet::single(base.clone()),
            TriggerPath::Direct,
            fast_config()?,
        )?;
        assert_eq!(chirping.compose_pwle(&request, None)?, 126);
        assert!(chirping.wait_for_completion(SETTLE));
        Ok(())
    }

    #[test]
    fn test_recovery_sweep_clears_stale_effects() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let vibrator = single(&base)?;
        assert!(base.insert_stale_effect().is_some());
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT) + 1);

        vibrator.perform(Effect::Click, EffectStrength::Strong, None)?;
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        Ok(())
    }
}

mod dual_actuators {
    use super::*;

    #[test]
    fn test_both_actuators_play_and_clean_up() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let vibrator = dual(&base, &flip)?;

        vibrator.compose(&composition(), None)?;
        let session = vibrator.session();
        assert_eq!(session.active_id(), Some(PHYSICAL_SLOT_COUNT));
        assert_eq!(session.secondary_id(), Some(PHYSICAL_SLOT_COUNT));
        assert_eq!(base.vibe_state(), VibeState::Haptic);
        assert_eq!(flip.vibe_state(), VibeState::Haptic);

        base.finish_playback();
        flip.finish_playback();
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(flip.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        Ok(())
    }

    #[test]
    fn test_secondary_upload_failure() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let vibrator = dual(&base, &flip)?;
        flip.inject_faults(FaultSet::UPLOAD);

        let result = vibrator.compose(&composition(), None);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert_eq!(vibrator.session().state(), PlaybackState::Idle);
        // Primary upload is rolled back.
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        assert_eq!(base.play_count(), 0);
        Ok(())
    }

    #[test]
    fn test_secondary_play_failure_clears_session() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let vibrator = dual(&base, &flip)?;
        flip.inject_faults(FaultSet::PLAY);

        let result = vibrator.perform(Effect::Click, EffectStrength::Medium, None);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert!(vibrator.session().is_idle());
        Ok(())
    }

    #[test]
    fn test_gain_written_to_both() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let vibrator = dual(&base, &flip)?;

        vibrator.set_amplitude(0.5)?;
        assert_eq!(base.gain(), 50);
        assert_eq!(flip.gain(), 50);

        vibrator.off()?;
        assert_eq!(base.gain(), 100);
        assert_eq!(flip.gain(), 100);
        Ok(())
    }
}

mod stop {
    use super::*;

    #[test]
    fn test_off_when_idle_restores_baseline() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = Vibrator::new(
            CalibrationProfile::default().with_long_frequency_shift(3),
            ActuatorSet::single(base.clone()),
            TriggerPath::Direct,
            fast_config()?,
        )?;

        vibrator.set_amplitude(0.3)?;
        vibrator.off()?;
        assert_eq!(base.gain(), 100);
        assert_eq!(base.f0_offset(), 0);
        Ok(())
    }

    #[test]
    fn test_off_stops_active_effect() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = Vibrator::new(
            CalibrationProfile::default().with_long_frequency_shift(3),
            ActuatorSet::single(base.clone()),
            TriggerPath::Direct,
            fast_config()?,
        )?;

        vibrator.on(1000, None)?;
        assert_eq!(base.f0_offset(), 3 << 14);

        vibrator.off()?;
        assert_eq!(base.vibe_state(), VibeState::Stopped);
        assert_eq!(base.f0_offset(), 0);
        assert!(vibrator.wait_for_completion(SETTLE));
        assert!(vibrator.session().is_idle());
        Ok(())
    }

    #[test]
    fn test_off_during_composition_reclaims_slot() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = single(&base)?;
        let free_before = base.free_bytes();

        vibrator.compose(&composition(), None)?;
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT) + 1);
        assert_eq!(base.playing(), Some(PHYSICAL_SLOT_COUNT));

        vibrator.off()?;
        assert!(vibrator.session().is_idle());
        assert!(vibrator.wait_for_completion(SETTLE));

        let physical: Vec<u16> = (0..PHYSICAL_SLOT_COUNT).collect();
        assert_eq!(base.effect_ids(), physical);
        assert_eq!(base.free_bytes(), free_before);

        assert_eq!(vibrator.compose(&composition(), None)?, 332);
        base.finish_playback();
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(base.effect_ids(), physical);
        Ok(())
    }

    #[test]
    fn test_off_during_pwle_reclaims_slot() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = Vibrator::new(
            CalibrationProfile::default().with_chirp(true),
            ActuatorSet::single(base.clone()),
            TriggerPath::Direct,
            fast_config()?,
        )?;
        let envelope = [PrimitivePwle::active(100, (0.0, 0.5), (50.0, 50.0))];

        vibrator.compose_pwle(&envelope, None)?;
        vibrator.off()?;
        assert!(vibrator.wait_for_completion(SETTLE));
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        Ok(())
    }

    #[test]
    fn test_stop_failure_keeps_session() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = single(&base)?;

        vibrator.on(1000, None)?;
        base.inject_faults(FaultSet::STOP);
        let result = vibrator.off();
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert_eq!(vibrator.session().state(), PlaybackState::Playing);

        base.clear_faults();
        vibrator.off()?;
        assert!(vibrator.wait_for_completion(SETTLE));
        Ok(())
    }
}

mod gpio_path {
    use super::*;

    fn gpio_vibrator(
        base: &Arc<SimulatedActuator>,
        flip: &Arc<SimulatedActuator>,
        gpio: &Arc<SimulatedGpio>,
    ) -> Result<Vibrator, HapticError> {
        Vibrator::new(
            CalibrationProfile::default(),
            ActuatorSet::dual(base.clone(), flip.clone()),
            TriggerPath::detect(Some(gpio.clone())),
            fast_config()?,
        )
    }

    #[test]
    fn test_trigger_armed_on_both_actuators() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let gpio = Arc::new(SimulatedGpio::new(vec![base.clone(), flip.clone()]));
        let vibrator = gpio_vibrator(&base, &flip, &gpio)?;

        vibrator.perform(Effect::Click, EffectStrength::Strong, None)?;
        let click = EffectSlot::Click.index();
        assert_eq!(base.trigger_for(click).map(|b| b.raw()), Some(0x9102));
        assert_eq!(flip.trigger_for(click).map(|b| b.raw()), Some(0x9102));
        assert!(gpio.level());
        assert_eq!(base.playing(), Some(click));
        assert_eq!(flip.playing(), Some(click));

        base.finish_playback();
        flip.finish_playback();
        assert!(vibrator.wait_for_completion(SETTLE));
        assert!(!gpio.level());
        Ok(())
    }

    #[test]
    fn test_uploads_carry_binding() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let gpio = Arc::new(SimulatedGpio::new(vec![base.clone(), flip.clone()]));
        let vibrator = gpio_vibrator(&base, &flip, &gpio)?;

        vibrator.compose(&composition(), None)?;
        assert_eq!(
            base.trigger_for(PHYSICAL_SLOT_COUNT).map(|b| b.waveform_index()),
            Some(EffectSlot::Composed.index())
        );
        assert_eq!(base.playing(), Some(PHYSICAL_SLOT_COUNT));

        base.finish_playback();
        flip.finish_playback();
        assert!(vibrator.wait_for_completion(SETTLE));
        Ok(())
    }

    #[test]
    fn test_gpio_reset_failure_on_off() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let gpio = Arc::new(SimulatedGpio::new(vec![base.clone(), flip.clone()]));
        let vibrator = gpio_vibrator(&base, &flip, &gpio)?;

        vibrator.on(500, None)?;
        gpio.fail_on_level(Some(false));
        let result = vibrator.off();
        assert!(matches!(result, Err(HapticError::Device(_))));
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert!(gpio.level());

        gpio.fail_on_level(None);
        assert!(vibrator.wait_for_completion(SETTLE));
        assert!(vibrator.session().is_idle());
        Ok(())
    }

    #[test]
    fn test_trigger_failure_aborts_start() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let flip = SimulatedActuator::new("flip").into_shared();
        let gpio = Arc::new(SimulatedGpio::new(vec![base.clone(), flip.clone()]));
        let vibrator = gpio_vibrator(&base, &flip, &gpio)?;
        gpio.fail_on_level(Some(true));

        let result = vibrator.perform(Effect::Tick, EffectStrength::Medium, None);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert!(vibrator.session().is_idle());

        let result = vibrator.compose(&composition(), None);
        assert_eq!(result.err().map(|e| e.kind()), Some(ErrorKind::IllegalState));
        assert_eq!(base.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        assert_eq!(flip.effect_ids().len(), usize::from(PHYSICAL_SLOT_COUNT));
        Ok(())
    }
}

mod queries {
    use haptics_playback::Capabilities;

    use super::*;

    #[test]
    fn test_capabilities_follow_chirp_and_storage() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let plain = single(&base)?;
        let caps = plain.capabilities();
        assert!(caps.contains(Capabilities::COMPOSE_EFFECTS | Capabilities::AMPLITUDE_CONTROL));
        assert!(!caps.intersects(Capabilities::FREQUENCY_CONTROL | Capabilities::COMPOSE_PWLE_EFFECTS));
        assert!(matches!(plain.frequency_minimum(), Err(HapticError::Unsupported(_))));
        assert!(matches!(plain.supported_braking(), Err(HapticError::Unsupported(_))));

        let chirping = Vibrator::new(
            CalibrationProfile::default().with_chirp(true),
            ActuatorSet::single(base.clone()),
            TriggerPath::Direct,
            fast_config()?,
        )?;
        assert!(chirping.capabilities().contains(Capabilities::COMPOSE_PWLE_EFFECTS));
        assert_eq!(chirping.bandwidth_amplitude_map()?.len(), 1000);
        assert_eq!(chirping.pwle_composition_size_max()?, 127);

        let full = SimulatedActuator::new("full").with_storage(0).into_shared();
        let starved = Vibrator::new(
            CalibrationProfile::default().with_chirp(true),
            ActuatorSet::single(full),
            TriggerPath::Direct,
            fast_config()?,
        )?;
        assert!(!starved.capabilities().intersects(
            Capabilities::COMPOSE_EFFECTS | Capabilities::COMPOSE_PWLE_EFFECTS
        ));
        Ok(())
    }

    #[test]
    fn test_resonance_requires_calibration() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let uncalibrated = single(&base)?;
        assert_eq!(
            uncalibrated.resonant_frequency().err().map(|e| e.kind()),
            Some(ErrorKind::IllegalState)
        );
        assert_eq!(
            uncalibrated.q_factor().err().map(|e| e.kind()),
            Some(ErrorKind::IllegalState)
        );

        let calibrated = Vibrator::new(
            CalibrationProfile::default().with_resonance(150 << 14, 20 << 16),
            ActuatorSet::single(base.clone()),
            TriggerPath::Direct,
            fast_config()?,
        )?;
        assert!((calibrated.resonant_frequency()? - 150.0).abs() < 1e-3);
        assert!((calibrated.q_factor()? - 20.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn test_amplitude_range() -> TestResult {
        let base = SimulatedActuator::new("base").into_shared();
        let vibrator = single(&base)?;
        for bad in [0.0, -0.5, 1.01, f32::NAN] {
            assert_eq!(
                vibrator.set_amplitude(bad).err().map(|e| e.kind()),
                Some(ErrorKind::InvalidArgument)
            );
        }
        vibrator.set_amplitude(1.0)?;
        assert_eq!(base.gain(), 100);
        vibrator.set_amplitude(0.25)?;
        assert_eq!(base.gain(), 25);
        Ok(())
    }

    #[test]
    fn test_perform_sets_effect_gain() -> TestResult {
        let base = SimulatedActuator::new("base")
            .with_auto_complete(true)
            .into_shared();
        let vibrator = single(&base)?;

        assert_eq!(vibrator.perform(Effect::Click, EffectStrength::Medium, None)?, 18);
        assert_eq!(base.gain(), 50);
        assert!(vibrator.wait_for_completion(SETTLE));

        assert_eq!(vibrator.perform(Effect::HeavyClick, EffectStrength::Strong, None)?, 18);
        assert_eq!(base.gain(), 95);
        assert!(vibrator.wait_for_completion(SETTLE));
        Ok(())
    }
}
