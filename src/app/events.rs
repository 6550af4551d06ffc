//! Outbound controller events and read-only state views.
//!
//! The [`Controller`](super::service::Controller) emits events through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other side
//! decide what to do with them: log them, publish them, update a UI.
//!
//! The view structs are what the query methods return; they are plain
//! `Serialize` data so a host can expose them as JSON.

use serde::Serialize;

use crate::control::arbiter::ConflictWinner;
use crate::control::rates::{RateUpdate, ZoneRates};
use crate::cycle_guard::{CompressorTransition, CycleOverride};
use crate::error::{ActuatorError, SensorError, StorageError};
use crate::zone::{FanSpeed, HvacMode, UserMode, ZoneCommand, ZoneId, ZoneReading};

/// Structured events emitted by the controller.
#[derive(Debug, Clone)]
pub enum ControllerEvent {
    /// Controller constructed or restored.
    Started { enabled: bool, restored: bool },

    /// Per-tick summary after actuation.
    Telemetry(TelemetryData),

    /// A tick was abandoned before any state changed.
    TickAborted(SensorError),

    /// Desired modes conflicted and were arbitrated.
    ModeConflict {
        desired: [HvacMode; 2],
        winner: ConflictWinner,
    },

    /// The lead zone's commanded setpoint was offset.
    LeakageCompensation {
        lead: ZoneId,
        offset: f32,
        eta_gap_min: f32,
    },

    /// Compressor protection replaced the arbitrated modes.
    CycleOverride(CycleOverride),

    /// A zone's commanded mode differs from last tick's.
    ModeChanged {
        zone: ZoneId,
        from: HvacMode,
        to: HvacMode,
    },

    /// The shared compressor started or stopped.
    Compressor(CompressorTransition),

    /// A learned rate moved.
    RateLearned(RateUpdate),

    /// An actuator write failed; the tick carried on.
    ActuatorFault(ActuatorError),

    /// A fan write was accepted but the read-back disagrees.
    FanMismatch {
        zone: ZoneId,
        requested: FanSpeed,
        actual: FanSpeed,
    },

    EnabledChanged(bool),

    LearningReset,

    /// Snapshot write failed; state stays dirty and is retried later.
    PersistFailed(StorageError),
}

/// Per-tick summary.
#[derive(Debug, Clone, Serialize)]
pub struct TelemetryData {
    pub iteration: u64,
    pub readings: [ZoneReading; 2],
    pub commands: [ZoneCommand; 2],
    pub targets: [f32; 2],
    pub rates: [ZoneRates; 2],
    pub lead: Option<ZoneId>,
    pub effective_deadband: f32,
    pub compressor_running: bool,
    pub starts_last_hour: usize,
}

// ───────────────────────────────────────────────────────────────
// Query views
// ───────────────────────────────────────────────────────────────

/// Per-zone part of [`ControllerState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneSummary {
    pub target_setpoint: f32,
    pub nominal_fan_speed: FanSpeed,
}

/// Result of `get_state`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ControllerState {
    pub zone1: ZoneSummary,
    pub zone2: ZoneSummary,
    pub enabled: bool,
    /// Zone1 then zone2, °/min.
    pub heating_rate: [f32; 2],
    pub cooling_rate: [f32; 2],
    pub leakage_rate: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LearningStatus {
    /// No rate learned for either zone.
    Learning,
    Active,
}

/// Controller health summary.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostics {
    pub status: LearningStatus,
    pub enabled: bool,
    pub rates: [ZoneRates; 2],
    pub starts_last_hour: usize,
    pub compressor_running: bool,
    pub iteration_count: u64,
    pub last_readings: [Option<ZoneReading>; 2],
    pub last_commands: [Option<ZoneCommand>; 2],
}

/// One zone presented as a thermostat.
#[derive(Debug, Clone, Serialize)]
pub struct ZoneView {
    pub zone: ZoneId,
    pub climate_entity: String,
    /// `None` until the first successful tick.
    pub current_temperature: Option<f32>,
    pub target_setpoint: f32,
    pub target_low: f32,
    pub target_high: f32,
    pub user_mode: UserMode,
    /// `true` when the zone is steered by `target_low..target_high`.
    pub uses_range: bool,
    pub nominal_fan_speed: FanSpeed,
    pub last_commanded_mode: HvacMode,
    pub rates: ZoneRates,
}
