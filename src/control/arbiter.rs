//! Desired-mode selection and cross-zone conflict arbitration.

use log::info;

use crate::zone::{HvacMode, UserMode, ZoneId, ZoneState};

/// Error beyond which `dry` stops dehumidifying and falls back to fan.
pub const DRY_MAX_ERROR: f32 = 5.0;

/// Mode a zone wants this tick, ignoring the other zone.
pub fn desired_mode(zone: &ZoneState, current: f32, deadband: f32) -> HvacMode {
    match zone.user_mode {
        UserMode::Off => HvacMode::Off,
        UserMode::Auto => {
            if current < zone.target_low - deadband {
                HvacMode::Heat
            } else if current > zone.target_high + deadband {
                HvacMode::Cool
            } else {
                HvacMode::FanOnly
            }
        }
        UserMode::Heat => {
            if zone.target_setpoint - current > deadband {
                HvacMode::Heat
            } else {
                HvacMode::FanOnly
            }
        }
        UserMode::Cool => {
            if zone.target_setpoint - current < -deadband {
                HvacMode::Cool
            } else {
                HvacMode::FanOnly
            }
        }
        UserMode::Dry => {
            if zone.error_abs(current) < DRY_MAX_ERROR {
                HvacMode::Dry
            } else {
                HvacMode::FanOnly
            }
        }
        UserMode::FanOnly => HvacMode::FanOnly,
    }
}

/// `true` when the pair would drive the shared compressor in opposite
/// directions.  Dry counts as cooling, so cool+dry is compatible.
pub fn modes_conflict(a: HvacMode, b: HvacMode) -> bool {
    use HvacMode::{Cool, Dry, Heat};
    matches!((a, b), (Heat, Cool) | (Cool, Heat) | (Heat, Dry) | (Dry, Heat))
}

/// Outcome of a conflict: which zone (if any) kept its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictWinner {
    Zone(ZoneId),
    /// Errors too close to call; both zones fall back to fan.
    Neither,
}

/// Settle a conflict by error magnitude.  The loser (or both, on a tie
/// within `threshold`) is forced to `fan_only`.
pub fn resolve_conflict(
    desired: [HvacMode; 2],
    err_abs: [f32; 2],
    threshold: f32,
) -> ([HvacMode; 2], ConflictWinner) {
    let [e1, e2] = err_abs;
    if e1 > e2 + threshold {
        info!(
            "CONFLICT RESOLUTION: zone1 wins (error {:.2} > {:.2} + {:.1})",
            e1, e2, threshold
        );
        ([desired[0], HvacMode::FanOnly], ConflictWinner::Zone(ZoneId::Zone1))
    } else if e2 > e1 + threshold {
        info!(
            "CONFLICT RESOLUTION: zone2 wins (error {:.2} > {:.2} + {:.1})",
            e2, e1, threshold
        );
        ([HvacMode::FanOnly, desired[1]], ConflictWinner::Zone(ZoneId::Zone2))
    } else {
        info!(
            "CONFLICT RESOLUTION: both zones to fan_only (errors too close: {:.2} vs {:.2})",
            e1, e2
        );
        ([HvacMode::FanOnly, HvacMode::FanOnly], ConflictWinner::Neither)
    }
}
