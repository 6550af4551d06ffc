//! Integration tests for the Controller tick and command pipeline.
//!
//! Each test drives the controller against `MockHvac` and asserts on the
//! actuator call history, the emitted events and the query surface.

use futures_lite::future::block_on;

use dualzone::adapters::store::MemoryStore;
use dualzone::app::actuation::ActuationTiming;
use dualzone::app::commands::ControllerCommand;
use dualzone::app::events::{ControllerEvent, LearningStatus};
use dualzone::app::ports::SnapshotStore;
use dualzone::app::service::{Controller, TickOutcome};
use dualzone::config::ControllerConfig;
use dualzone::control::arbiter::ConflictWinner;
use dualzone::control::rates::ZoneRates;
use dualzone::error::{ActuatorError, Error, SensorError, StorageError};
use dualzone::zone::{FanSpeed, HvacMode, UserMode, ZoneId};

use crate::mock_hvac::{FlakyStore, HvacCall, MockHvac, RecordingSink};

const Z1: ZoneId = ZoneId::Zone1;
const Z2: ZoneId = ZoneId::Zone2;

fn make_controller(modes: [UserMode; 2]) -> Controller {
    let mut c = Controller::new(&ControllerConfig::default()).with_timing(ActuationTiming::IMMEDIATE);
    let mut snap = c.snapshot();
    snap.zone1.user_mode = modes[0];
    snap.zone2.user_mode = modes[1];
    c.restore(&snap, 0.0).unwrap();
    c
}

// ── Scenario A: heat/cool conflict, larger error wins ────────

#[test]
fn conflict_forces_smaller_error_zone_to_fan_only() {
    let mut c = make_controller([UserMode::Heat, UserMode::Cool]);
    let mut hw = MockHvac::new([65.0, 75.0]);
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    let report = outcome.report().expect("tick should complete");

    assert_eq!(report.desired, [HvacMode::Heat, HvacMode::Cool]);
    assert_eq!(report.conflict, Some(ConflictWinner::Zone(Z2)));
    assert_eq!(report.commands[0].mode, HvacMode::FanOnly);
    assert_eq!(report.commands[1].mode, HvacMode::Cool);
    assert_eq!(report.lead, Some(Z2));

    // Idle zone circulates quietly; the winner boosts on a 7° error.
    assert_eq!(report.commands[0].fan, FanSpeed::Quiet);
    assert_eq!(report.commands[1].fan, FanSpeed::High);

    assert_eq!(hw.mode(Z1), HvacMode::FanOnly);
    assert_eq!(hw.mode(Z2), HvacMode::Cool);
    assert_eq!(hw.setpoint(Z1), Some(68.0));
    assert_eq!(hw.setpoint(Z2), Some(68.0));
    assert!(sink.any(|e| matches!(
        e,
        ControllerEvent::ModeConflict {
            winner: ConflictWinner::Zone(ZoneId::Zone2),
            ..
        }
    )));
}

#[test]
fn close_conflict_sends_both_zones_to_fan_only() {
    let mut c = make_controller([UserMode::Heat, UserMode::Cool]);
    let mut hw = MockHvac::new([65.0, 71.0]);
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    let report = outcome.report().unwrap();
    assert_eq!(report.conflict, Some(ConflictWinner::Neither));
    assert_eq!(report.commands[0].mode, HvacMode::FanOnly);
    assert_eq!(report.commands[1].mode, HvacMode::FanOnly);
    assert_eq!(report.lead, None);
    assert!(report.compressor.is_none());
}

#[test]
fn actuation_order_is_mode_then_fan_then_setpoints() {
    let mut c = make_controller([UserMode::Heat, UserMode::Cool]);
    let mut hw = MockHvac::new([65.0, 75.0]);
    let mut sink = RecordingSink::new();
    block_on(c.tick(&mut hw, &mut sink, 0.0));

    assert!(matches!(hw.calls[0], HvacCall::Mode { zone: ZoneId::Zone1, .. }));
    assert!(matches!(hw.calls[1], HvacCall::Fan { zone: ZoneId::Zone1, .. }));
    assert!(matches!(hw.calls[2], HvacCall::Mode { zone: ZoneId::Zone2, .. }));
    assert!(matches!(hw.calls[3], HvacCall::Fan { zone: ZoneId::Zone2, .. }));
    assert!(matches!(hw.calls[4], HvacCall::Setpoint { zone: ZoneId::Zone1, .. }));
    assert!(matches!(hw.calls[5], HvacCall::Setpoint { zone: ZoneId::Zone2, .. }));
    assert_eq!(hw.calls.len(), 6);
}

// ── Scenario B: shared heat, lead zone offset ─────────────────

#[test]
fn shared_heat_offsets_lead_zone_setpoint() {
    let mut c = make_controller([UserMode::Heat, UserMode::Heat]);
    let mut snap = c.snapshot();
    snap.rates[0] = ZoneRates {
        heating: 0.3,
        cooling: 0.0,
        leakage: 0.2,
    };
    snap.rates[1].heating = 0.25;
    c.restore(&snap, 0.0).unwrap();

    // Zone1: 3° at 0.3/min = 10 min.  Zone2: 3.5° at 0.25/min = 14 min.
    let mut hw = MockHvac::new([65.0, 64.5]);
    let mut sink = RecordingSink::new();
    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    let report = outcome.report().unwrap();

    let comp = report.compensation.expect("compensation expected");
    assert_eq!(comp.lead, Z1);
    assert!((comp.eta_gap - 4.0).abs() < 1e-3, "gap={}", comp.eta_gap);
    assert!((comp.offset - 0.8).abs() < 1e-3, "offset={}", comp.offset);

    let sp1 = hw.setpoint(Z1).unwrap();
    assert!((sp1 - 67.2).abs() < 1e-3, "sp1={sp1}");
    assert_eq!(hw.setpoint(Z2), Some(68.0));
    assert_eq!(report.lead, Some(Z1));
    assert!(sink.any(|e| matches!(e, ControllerEvent::LeakageCompensation { lead: ZoneId::Zone1, .. })));
}

#[test]
fn shared_heat_without_rates_sends_plain_targets() {
    let mut c = make_controller([UserMode::Heat, UserMode::Heat]);
    let mut hw = MockHvac::new([65.0, 64.5]);
    let mut sink = RecordingSink::new();
    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    let report = outcome.report().unwrap();
    assert!(report.compensation.is_none());
    assert_eq!(report.lead, None);
    assert_eq!(hw.setpoint(Z1), Some(68.0));
    assert_eq!(hw.setpoint(Z2), Some(68.0));
}

#[test]
fn off_time_veto_drops_pending_compensation() {
    let mut c = make_controller([UserMode::Heat, UserMode::Heat]);
    let mut snap = c.snapshot();
    snap.rates[0] = ZoneRates {
        heating: 0.3,
        cooling: 0.0,
        leakage: 0.2,
    };
    snap.rates[1].heating = 0.25;
    c.restore(&snap, 0.0).unwrap();

    let mut hw = MockHvac::new([65.0, 64.5]);
    let mut sink = RecordingSink::new();
    let r = block_on(c.tick(&mut hw, &mut sink, 0.0));
    assert!(r.report().unwrap().compensation.is_some());

    // Both satisfied after the minimum runtime: compressor stops.
    hw.set_temp(Z1, 68.5);
    hw.set_temp(Z2, 68.5);
    block_on(c.tick(&mut hw, &mut sink, 180.0));
    assert!(!c.cycle_guard().is_running());

    // Demand returns inside the off-time: both zones idle, plain targets.
    hw.set_temp(Z1, 65.0);
    hw.set_temp(Z2, 64.5);
    let r = block_on(c.tick(&mut hw, &mut sink, 240.0));
    let report = r.report().unwrap();
    assert_eq!(report.desired, [HvacMode::Heat, HvacMode::Heat]);
    assert_eq!(report.commands[0].mode, HvacMode::FanOnly);
    assert_eq!(report.commands[1].mode, HvacMode::FanOnly);
    assert!(report.compensation.is_none());
    assert_eq!(report.commands[0].setpoint, 68.0);
    assert_eq!(hw.setpoint(Z1), Some(68.0));
    assert_eq!(
        sink.count(|e| matches!(e, ControllerEvent::LeakageCompensation { .. })),
        1
    );
}

// ── Sensor failures ───────────────────────────────────────────

#[test]
fn missing_temperature_aborts_without_mutation() {
    let mut c = make_controller([UserMode::Heat, UserMode::Cool]);
    let mut hw = MockHvac::new([65.0, 75.0]);
    hw.temp_unavailable[1] = true;
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    assert_eq!(
        outcome,
        TickOutcome::Aborted(SensorError::TemperatureUnavailable(Z2))
    );
    assert_eq!(c.iteration_count(), 0);
    assert!(hw.calls.is_empty());
    assert_eq!(c.rate_learner().history_len(Z1), 0);
    assert_eq!(c.zone(Z1).last_commanded_mode, HvacMode::Off);
    assert!(!c.cycle_guard().is_running());
    assert!(sink.any(|e| matches!(e, ControllerEvent::TickAborted(_))));

    // Sensor back: the next tick runs normally.
    hw.temp_unavailable[1] = false;
    let outcome = block_on(c.tick(&mut hw, &mut sink, 60.0));
    assert!(outcome.report().is_some());
    assert_eq!(c.iteration_count(), 1);
}

#[test]
fn unreadable_mode_is_treated_as_off() {
    let mut c = make_controller([UserMode::Heat, UserMode::Off]);
    let mut hw = MockHvac::new([65.0, 68.0]);
    hw.modes[0] = HvacMode::Heat;
    hw.mode_unavailable[0] = true;
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    let report = outcome.report().unwrap();
    assert_eq!(report.readings[0].mode, HvacMode::Off);
    assert_eq!(report.commands[0].mode, HvacMode::Heat);
}

#[test]
fn non_finite_temperature_aborts_tick() {
    let mut c = make_controller([UserMode::Heat, UserMode::Heat]);
    let mut hw = MockHvac::new([65.0, 66.0]);
    hw.set_temp(Z1, f32::NAN);
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    assert_eq!(
        outcome,
        TickOutcome::Aborted(SensorError::TemperatureUnavailable(Z1))
    );
    assert_eq!(c.iteration_count(), 0);
    assert!(hw.calls.is_empty());
    assert_eq!(c.rate_learner().history_len(Z1), 0);

    hw.set_temp(Z1, 65.0);
    hw.set_temp(Z2, f32::INFINITY);
    let outcome = block_on(c.tick(&mut hw, &mut sink, 60.0));
    assert_eq!(
        outcome,
        TickOutcome::Aborted(SensorError::TemperatureUnavailable(Z2))
    );
    assert_eq!(sink.count(|e| matches!(e, ControllerEvent::TickAborted(_))), 2);
}

// ── Actuator failures ─────────────────────────────────────────

#[test]
fn failed_mode_write_skips_fan_and_continues_other_zone() {
    let mut c = make_controller([UserMode::Heat, UserMode::Cool]);
    let mut hw = MockHvac::new([65.0, 75.0]);
    hw.fail_mode_write[0] = true;
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    let report = outcome.report().unwrap();
    assert_eq!(report.actuator_errors, 1);

    let z1 = hw.calls_for(Z1);
    assert!(!z1.iter().any(|c| matches!(c, HvacCall::Fan { .. })));
    assert!(z1.iter().any(|c| matches!(c, HvacCall::Setpoint { .. })));
    assert_eq!(hw.mode(Z2), HvacMode::Cool);
    assert_eq!(hw.fan(Z2), FanSpeed::High);

    assert!(sink.any(|e| matches!(
        e,
        ControllerEvent::ActuatorFault(ActuatorError::ModeWriteFailed(ZoneId::Zone1))
    )));
    // The command is booked as applied.
    assert_eq!(c.zone(Z1).last_commanded_mode, HvacMode::FanOnly);
}

#[test]
fn fan_readback_mismatch_is_reported_not_retried() {
    let mut c = make_controller([UserMode::Heat, UserMode::Cool]);
    let mut hw = MockHvac::new([65.0, 75.0]);
    hw.fan_cap[1] = Some(FanSpeed::Low);
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    assert_eq!(outcome.report().unwrap().actuator_errors, 0);
    assert!(sink.any(|e| matches!(
        e,
        ControllerEvent::FanMismatch {
            zone: ZoneId::Zone2,
            requested: FanSpeed::High,
            actual: FanSpeed::Low,
        }
    )));
    let fan_writes = hw
        .calls_for(Z2)
        .iter()
        .filter(|c| matches!(c, HvacCall::Fan { .. }))
        .count();
    assert_eq!(fan_writes, 1);
}

// ── Commands ──────────────────────────────────────────────────

#[test]
fn set_target_temperature_persists_then_ticks() {
    let mut c = make_controller([UserMode::Heat, UserMode::Off]);
    let mut hw = MockHvac::new([66.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.handle_command(
        ControllerCommand::SetTargetTemperature {
            zone: Z1,
            temperature: 70.0,
        },
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap();

    assert_eq!(c.zone(Z1).target_setpoint, 70.0);
    assert_eq!(c.zone(Z1).target_low, 68.0);
    assert_eq!(c.zone(Z1).target_high, 72.0);
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.load().unwrap().unwrap().zone1.target_setpoint, 70.0);

    let report = outcome.report().unwrap();
    assert_eq!(report.commands[0].mode, HvacMode::Heat);
    assert_eq!(hw.setpoint(Z1), Some(70.0));
    assert_eq!(c.get_state().zone1.target_setpoint, 70.0);
}

#[test]
fn invalid_arguments_change_nothing() {
    let mut c = make_controller([UserMode::Auto, UserMode::Auto]);
    let mut hw = MockHvac::new([68.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    let err = block_on(c.handle_command(
        ControllerCommand::SetTargetTemperature {
            zone: Z1,
            temperature: f32::NAN,
        },
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    let err = block_on(c.handle_command(
        ControllerCommand::SetTargetRange {
            zone: Z2,
            low: 72.0,
            high: 66.0,
        },
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap_err();
    assert!(matches!(err, Error::Config(_)));

    assert_eq!(c.zone(Z1).target_setpoint, 68.0);
    assert_eq!(c.zone(Z2).target_low, 66.0);
    assert_eq!(c.zone(Z2).target_high, 70.0);
    assert!(store.is_empty());
    assert!(hw.calls.is_empty());
    assert_eq!(c.iteration_count(), 0);
}

#[test]
fn target_range_drives_auto_mode() {
    let mut c = make_controller([UserMode::Auto, UserMode::Off]);
    let mut hw = MockHvac::new([71.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    // Default range 66..70 with 0.5 deadband: 71 is too warm.
    let outcome = block_on(c.tick(&mut hw, &mut sink, 0.0));
    assert_eq!(outcome.report().unwrap().commands[0].mode, HvacMode::Cool);

    let outcome = block_on(c.handle_command(
        ControllerCommand::SetTargetRange {
            zone: Z1,
            low: 68.0,
            high: 74.0,
        },
        &mut hw,
        &mut store,
        &mut sink,
        60.0,
    ))
    .unwrap();
    assert_eq!(c.zone(Z1).target_setpoint, 71.0);
    let view = c.zone_view(Z1);
    assert!(view.uses_range);
    assert_eq!(view.current_temperature, Some(71.0));
    // Inside the new range; the compressor is held by its minimum runtime.
    let report = outcome.report().unwrap();
    assert_eq!(report.desired[0], HvacMode::FanOnly);
    assert!(report.cycle_override.is_some());
    assert_eq!(report.commands[0].mode, HvacMode::Cool);
}

#[test]
fn nominal_fan_speed_shapes_idle_fan() {
    let mut c = make_controller([UserMode::FanOnly, UserMode::Off]);
    let mut hw = MockHvac::new([68.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.handle_command(
        ControllerCommand::SetNominalFanSpeed {
            zone: Z1,
            speed: FanSpeed::High,
        },
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap();
    assert_eq!(outcome.report().unwrap().commands[0].fan, FanSpeed::High);
    assert_eq!(outcome.report().unwrap().commands[1].fan, FanSpeed::Quiet);
    assert_eq!(c.get_state().zone1.nominal_fan_speed, FanSpeed::High);
    assert_eq!(
        store.load().unwrap().unwrap().zone1.nominal_fan_speed,
        FanSpeed::High
    );
}

#[test]
fn user_mode_off_commands_off() {
    let mut c = make_controller([UserMode::Auto, UserMode::Auto]);
    let mut hw = MockHvac::new([50.0, 90.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    block_on(c.handle_command(
        ControllerCommand::SetHvacMode {
            zone: Z1,
            mode: UserMode::Off,
        },
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap();
    assert_eq!(hw.mode(Z1), HvacMode::Off);
    assert_eq!(hw.fan(Z1), FanSpeed::Quiet);
    assert_eq!(hw.mode(Z2), HvacMode::Cool);
}

#[test]
fn disabled_controller_skips_ticks_until_reenabled() {
    let mut c = make_controller([UserMode::Heat, UserMode::Off]);
    let mut hw = MockHvac::new([60.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    let outcome = block_on(c.handle_command(
        ControllerCommand::SetEnabled(false),
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap();
    assert_eq!(outcome, TickOutcome::Skipped);
    assert!(!c.is_enabled());
    assert!(!store.load().unwrap().unwrap().enabled);

    assert_eq!(block_on(c.tick(&mut hw, &mut sink, 60.0)), TickOutcome::Skipped);
    assert!(hw.calls.is_empty());
    assert_eq!(c.iteration_count(), 0);
    assert_eq!(c.rate_learner().history_len(Z1), 0);

    let outcome = block_on(c.handle_command(
        ControllerCommand::SetEnabled(true),
        &mut hw,
        &mut store,
        &mut sink,
        120.0,
    ))
    .unwrap();
    assert!(outcome.report().is_some());
    assert_eq!(hw.mode(Z1), HvacMode::Heat);
    assert_eq!(sink.count(|e| matches!(e, ControllerEvent::EnabledChanged(_))), 2);
}

// ── Scenario D: reset learning ────────────────────────────────

#[test]
fn reset_learning_zeroes_every_rate() {
    let mut c = make_controller([UserMode::Off, UserMode::Off]);
    let mut snap = c.snapshot();
    snap.rates = [
        ZoneRates {
            heating: 0.3,
            cooling: 0.2,
            leakage: 0.1,
        },
        ZoneRates {
            heating: 0.25,
            cooling: 0.4,
            leakage: 0.05,
        },
    ];
    c.restore(&snap, 0.0).unwrap();
    assert_eq!(c.diagnostics(0.0).status, LearningStatus::Active);

    let mut hw = MockHvac::new([68.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();
    block_on(c.handle_command(
        ControllerCommand::ResetLearning,
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap();

    let state = c.get_state();
    assert_eq!(state.heating_rate, [0.0, 0.0]);
    assert_eq!(state.cooling_rate, [0.0, 0.0]);
    assert_eq!(state.leakage_rate, [0.0, 0.0]);
    assert_eq!(c.diagnostics(0.0).status, LearningStatus::Learning);
    assert_eq!(store.load().unwrap().unwrap().rates, [ZoneRates::default(); 2]);
    assert!(sink.any(|e| matches!(e, ControllerEvent::LearningReset)));
}

// ── Rate learning and persistence ─────────────────────────────

#[test]
fn heating_rate_is_learned_and_auto_saved() {
    let mut c = make_controller([UserMode::Heat, UserMode::Off]);
    let mut hw = MockHvac::new([60.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();

    // First tick commands heat (the compressor start marks state dirty at
    // t=0); the actuator reports heat from tick 2 on.  Samples land on
    // ticks 3, 4 and 5; the third one sets the rate.
    let mut now = 0.0;
    for t in [60.0, 60.0, 60.5, 61.0, 61.5] {
        hw.set_temp(Z1, t);
        block_on(c.tick(&mut hw, &mut sink, now));
        now += 60.0;
    }
    assert_eq!(c.get_state().heating_rate[0], 0.5);
    assert!(c.is_dirty());
    assert!(sink.any(|e| matches!(e, ControllerEvent::RateLearned(_))));

    assert!(!c.auto_save_if_needed(&mut store, &mut sink, 299.0));
    assert!(store.is_empty());
    assert!(c.auto_save_if_needed(&mut store, &mut sink, 300.0));
    assert!(!c.is_dirty());
    assert_eq!(store.load().unwrap().unwrap().rates[0].heating, 0.5);
    assert_eq!(store.load().unwrap().unwrap().compressor_start_times.len(), 1);
}

#[test]
fn start_restores_persisted_state() {
    let mut first = make_controller([UserMode::Cool, UserMode::Heat]);
    let mut hw = MockHvac::new([68.0, 68.0]);
    let mut store = MemoryStore::new();
    let mut sink = RecordingSink::new();
    block_on(first.handle_command(
        ControllerCommand::SetTargetTemperature {
            zone: Z2,
            temperature: 72.5,
        },
        &mut hw,
        &mut store,
        &mut sink,
        0.0,
    ))
    .unwrap();

    let mut second = Controller::new(&ControllerConfig::default());
    assert!(second.start(&store, &mut sink, 10.0));
    assert_eq!(second.zone(Z2).target_setpoint, 72.5);
    assert_eq!(second.zone(Z1).user_mode, UserMode::Cool);
    assert!(sink.any(|e| matches!(e, ControllerEvent::Started { restored: true, .. })));
}

#[test]
fn corrupt_snapshot_falls_back_to_configuration() {
    let store = MemoryStore::with_blob(vec![0xff; 7]);
    assert_eq!(
        store.load(),
        Err(Error::Storage(StorageError::Corrupted))
    );
    let mut c = Controller::new(&ControllerConfig::default());
    let mut sink = RecordingSink::new();
    assert!(!c.start(&store, &mut sink, 0.0));
    assert_eq!(c.zone(Z1).target_setpoint, 68.0);
    assert!(c.is_enabled());
}

#[test]
fn failed_command_save_is_retried_by_auto_save() {
    let mut c = make_controller([UserMode::Off, UserMode::Off]);
    let mut hw = MockHvac::new([68.0, 68.0]);
    let mut store = FlakyStore::failing();
    let mut sink = RecordingSink::new();

    let cmd = ControllerCommand::SetTargetTemperature {
        zone: Z1,
        temperature: 72.0,
    };
    let outcome = block_on(c.handle_command(cmd, &mut hw, &mut store, &mut sink, 100.0)).unwrap();
    assert!(outcome.report().is_some());
    assert!(c.is_dirty());
    assert!(sink.any(|e| matches!(e, ControllerEvent::PersistFailed(StorageError::Io))));
    assert_eq!(store.inner.save_count(), 0);

    // Still failing at the deadline: stays dirty.
    assert!(!c.auto_save_if_needed(&mut store, &mut sink, 400.0));
    assert!(c.is_dirty());

    store.fail_saves = false;
    assert!(c.auto_save_if_needed(&mut store, &mut sink, 401.0));
    assert!(!c.is_dirty());
    let saved = store.inner.load().unwrap().unwrap();
    assert_eq!(saved.zone1.target_setpoint, 72.0);
}

#[test]
fn failed_command_save_is_flushed_on_shutdown() {
    let mut c = make_controller([UserMode::Off, UserMode::Off]);
    let mut hw = MockHvac::new([68.0, 68.0]);
    let mut store = FlakyStore::failing();
    let mut sink = RecordingSink::new();

    let cmd = ControllerCommand::SetNominalFanSpeed {
        zone: Z2,
        speed: FanSpeed::High,
    };
    block_on(c.handle_command(cmd, &mut hw, &mut store, &mut sink, 0.0)).unwrap();
    assert!(c.is_dirty());

    store.fail_saves = false;
    c.force_save_if_dirty(&mut store, &mut sink);
    assert!(!c.is_dirty());
    assert_eq!(store.inner.save_count(), 1);
    let saved = store.inner.load().unwrap().unwrap();
    assert_eq!(saved.zone2.nominal_fan_speed, FanSpeed::High);
}
