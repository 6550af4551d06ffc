//! Two-phase actuator command protocol.
//!
//! An actuator's fan-speed acceptance can depend on its operating mode, so
//! each zone is driven as:
//!
//! ```text
//!  command_mode ─▶ settle ─▶ command_fan ─▶ verify wait ─▶ read_fan
//! ```
//!
//! Both waits are bounded and configurable; a zero wait is skipped.  A fan
//! read-back that disagrees is logged and reported, never retried.

use core::time::Duration;

use log::{debug, info, warn};

use crate::config::ControlSettings;
use crate::zone::{FanSpeed, HvacMode, ZoneId};

use super::events::ControllerEvent;
use super::ports::{ClimatePort, EventSink};

/// Waits between the protocol phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationTiming {
    pub mode_settle: Duration,
    pub fan_verify: Duration,
}

impl ActuationTiming {
    /// No waits (tests and simulated plants that apply writes instantly).
    pub const IMMEDIATE: Self = Self {
        mode_settle: Duration::ZERO,
        fan_verify: Duration::ZERO,
    };

    pub fn from_settings(settings: &ControlSettings) -> Self {
        Self {
            mode_settle: Duration::from_millis(u64::from(settings.mode_settle_ms)),
            fan_verify: Duration::from_millis(u64::from(settings.fan_verify_ms)),
        }
    }
}

/// Reactor-driven wait; returns immediately for a zero duration.
pub async fn settle(duration: Duration) {
    if !duration.is_zero() {
        async_io_mini::Timer::after(duration).await;
    }
}

/// Drive one zone's mode then fan.  Returns the number of failed writes.
///
/// A failed mode write skips the fan write for that zone: the actuator is
/// in an unknown mode and may reject or misapply it.
pub async fn apply_mode_and_fan(
    hw: &mut impl ClimatePort,
    sink: &mut impl EventSink,
    timing: ActuationTiming,
    zone: ZoneId,
    mode: HvacMode,
    fan: FanSpeed,
) -> u32 {
    debug!("{}: mode={} fan={}", zone, mode, fan);

    if let Err(e) = hw.command_mode(zone, mode).await {
        warn!("{}: {}", zone, e);
        sink.emit(&ControllerEvent::ActuatorFault(e));
        return 1;
    }
    settle(timing.mode_settle).await;

    if let Err(e) = hw.command_fan(zone, fan).await {
        warn!("{}: {}", zone, e);
        sink.emit(&ControllerEvent::ActuatorFault(e));
        return 1;
    }
    settle(timing.fan_verify).await;

    match hw.read_fan(zone).await {
        Ok(actual) if actual == fan => {
            debug!("{}: fan confirmed {}", zone, actual);
        }
        Ok(actual) => {
            warn!(
                "{}: fan mode did not change as expected (requested {}, actual {}, mode {})",
                zone, fan, actual, mode
            );
            sink.emit(&ControllerEvent::FanMismatch {
                zone,
                requested: fan,
                actual,
            });
        }
        Err(e) => info!("{}: fan read-back unavailable: {}", zone, e),
    }
    0
}

/// Send one zone's setpoint.  Returns the number of failed writes.
pub async fn apply_setpoint(
    hw: &mut impl ClimatePort,
    sink: &mut impl EventSink,
    zone: ZoneId,
    setpoint: f32,
) -> u32 {
    match hw.command_temperature(zone, setpoint).await {
        Ok(()) => 0,
        Err(e) => {
            warn!("{}: {}", zone, e);
            sink.emit(&ControllerEvent::ActuatorFault(e));
            1
        }
    }
}
