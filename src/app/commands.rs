//! Inbound commands to the controller.
//!
//! These represent actions requested by the outside world (UI, automation,
//! CLI) that the [`Controller`](super::service::Controller) applies, then
//! persists, then follows with one control tick.

use crate::zone::{FanSpeed, UserMode, ZoneId};

/// Commands that external adapters can send into the controller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControllerCommand {
    /// Single setpoint; the display range is re-derived as ±2°.
    SetTargetTemperature { zone: ZoneId, temperature: f32 },

    /// Auto range; the setpoint becomes the midpoint.  Rejected when
    /// `low > high`.
    SetTargetRange { zone: ZoneId, low: f32, high: f32 },

    /// Change the user-selected operating intent.
    SetHvacMode { zone: ZoneId, mode: UserMode },

    /// Baseline the fan planner modulates around.
    SetNominalFanSpeed { zone: ZoneId, speed: FanSpeed },

    /// Disabled ticks no-op without reading sensors.
    SetEnabled(bool),

    /// Zero every learned rate and sample window.
    ResetLearning,
}

impl ControllerCommand {
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SetTargetTemperature { .. } => "set_target_temperature",
            Self::SetTargetRange { .. } => "set_target_range",
            Self::SetHvacMode { .. } => "set_hvac_mode",
            Self::SetNominalFanSpeed { .. } => "set_nominal_fan_speed",
            Self::SetEnabled(_) => "set_enabled",
            Self::ResetLearning => "reset_learning",
        }
    }
}
