//! Fan-speed planning around each zone's nominal speed.

use crate::zone::{FanSpeed, HvacMode};

const BOOST_HIGH_ERROR: f32 = 5.0;
const BOOST_TWO_ERROR: f32 = 3.0;
const BOOST_ONE_ERROR: f32 = 1.5;
const LEAD_QUIET_ERROR: f32 = 0.5;

/// Fan speed for one zone this tick.
///
/// `err_abs` is the distance to the plain setpoint; `other_mode` the mode
/// the other zone is being commanded this tick.
pub fn plan(
    nominal: FanSpeed,
    mode: HvacMode,
    err_abs: f32,
    is_lead: bool,
    other_mode: HvacMode,
) -> FanSpeed {
    let level = nominal.level();
    match mode {
        // Circulating next to an active zone picks up its leakage.
        HvacMode::FanOnly if other_mode.is_conditioning() => FanSpeed::Quiet,
        HvacMode::FanOnly => nominal,
        HvacMode::Off => FanSpeed::Quiet,
        HvacMode::Heat | HvacMode::Cool => {
            if err_abs > BOOST_HIGH_ERROR {
                FanSpeed::High
            } else if err_abs > BOOST_TWO_ERROR {
                FanSpeed::from_level(level + 2)
            } else if err_abs > BOOST_ONE_ERROR {
                FanSpeed::from_level(level + 1)
            } else if is_lead {
                if err_abs < LEAD_QUIET_ERROR {
                    FanSpeed::Quiet
                } else {
                    FanSpeed::from_level(level.saturating_sub(2))
                }
            } else {
                FanSpeed::from_level(level.saturating_sub(1))
            }
        }
        HvacMode::Dry => nominal,
    }
}
