//! Leakage compensation for two zones conditioning in the same direction.
//!
//! The zone that reaches its target first (the lead) coasts and keeps
//! leaking conditioned air into the lagging zone.  Pushing the lead's
//! commanded setpoint past its displayed target by roughly the leakage it
//! will cause over the ETA gap counteracts that.

use crate::zone::{HvacMode, ZoneId};

/// Rates at or below this are treated as unknown.
pub const MIN_USABLE_RATE: f32 = 0.001;
/// Leakage rates below this fall back to [`DEFAULT_LEAKAGE`].
pub const MIN_USABLE_LEAKAGE: f32 = 0.01;
/// Conservative leakage assumption (°/min) before one has been learned.
pub const DEFAULT_LEAKAGE: f32 = 0.15;
/// Upper clamp on the setpoint offset (°).
pub const MAX_OFFSET: f32 = 4.0;

/// Minutes until a zone closes `err_abs` at `rate`; infinite when the rate
/// is unknown.
pub fn time_to_target(err_abs: f32, rate: f32) -> f32 {
    if rate <= MIN_USABLE_RATE {
        f32::INFINITY
    } else {
        err_abs / rate
    }
}

/// Zone with the strictly smaller finite ETA, if any.
pub fn lead_zone(eta: [f32; 2]) -> Option<ZoneId> {
    let [e1, e2] = eta;
    if e1 < e2 && e1.is_finite() {
        Some(ZoneId::Zone1)
    } else if e2 < e1 && e2.is_finite() {
        Some(ZoneId::Zone2)
    } else {
        None
    }
}

/// Setpoint offset for the lead zone, in `[min_offset, MAX_OFFSET]`.
///
/// `lead_leakage` is the lead zone's learned leakage rate; `eta_gap` the
/// lag ETA minus the lead ETA (minutes).
pub fn compensation_offset(lead_leakage: f32, eta_gap: f32, min_offset: f32) -> f32 {
    let leakage = if lead_leakage < MIN_USABLE_LEAKAGE {
        DEFAULT_LEAKAGE
    } else {
        lead_leakage
    };
    // An infinite gap (lag rate unknown) saturates at the ceiling.
    (leakage * eta_gap).max(min_offset).min(MAX_OFFSET)
}

/// Commanded setpoint for the lead zone: overshoot in its own direction.
pub fn offset_setpoint(target: f32, mode: HvacMode, offset: f32) -> f32 {
    match mode {
        HvacMode::Heat => target - offset,
        HvacMode::Cool => target + offset,
        _ => target,
    }
}

/// Result of a compensation pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Compensation {
    pub lead: ZoneId,
    pub offset: f32,
    /// ETA gap in minutes.
    pub eta_gap: f32,
    /// Commanded setpoints, zone1 then zone2.
    pub setpoints: [f32; 2],
}

/// Compute compensation for a shared heat/cool tick.
///
/// `targets` and `err_abs` are per zone; `rates` the learned rate for
/// `mode`; `leakage` the learned leakage rates.  Returns `None` when no
/// zone leads.
pub fn compensate(
    mode: HvacMode,
    targets: [f32; 2],
    err_abs: [f32; 2],
    rates: [f32; 2],
    leakage: [f32; 2],
    min_offset: f32,
) -> Option<Compensation> {
    let eta = [
        time_to_target(err_abs[0], rates[0]),
        time_to_target(err_abs[1], rates[1]),
    ];
    let lead = lead_zone(eta)?;
    let l = lead.index();
    let lag = lead.other().index();

    let eta_gap = eta[lag] - eta[l];
    let offset = compensation_offset(leakage[l], eta_gap, min_offset);
    let mut setpoints = targets;
    setpoints[l] = offset_setpoint(targets[l], mode, offset);

    Some(Compensation {
        lead,
        offset,
        eta_gap,
        setpoints,
    })
}
