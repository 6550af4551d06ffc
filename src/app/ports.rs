//! Port traits: the hexagonal boundary between the control core and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Controller (domain)
//! ```
//!
//! Driven adapters (the two climate actuators, event sinks, snapshot
//! storage, clocks) implement these traits.  The
//! [`Controller`](super::service::Controller) takes them as generics at
//! each call site, so the control core never touches a device, a file or
//! the system clock directly.
//!
//! All port errors are typed; callers handle every variant explicitly.

use crate::error::{ActuatorError, Result, SensorError};
use crate::zone::{FanSpeed, HvacMode, ZoneId};

use super::events::ControllerEvent;
use super::snapshot::ControllerSnapshot;

// ───────────────────────────────────────────────────────────────
// Climate port (driven adapter: actuators ↔ domain)
// ───────────────────────────────────────────────────────────────

/// Per-zone sensor and actuator access.
///
/// Calls may be real asynchronous I/O; the controller awaits them strictly
/// in sequence, never concurrently.
#[allow(async_fn_in_trait)]
pub trait ClimatePort {
    /// Current temperature reported by the zone's actuator.
    async fn read_temperature(&mut self, zone: ZoneId) -> core::result::Result<f32, SensorError>;

    /// Current operating mode.  Callers treat an error as `off`.
    async fn read_mode(&mut self, zone: ZoneId) -> core::result::Result<HvacMode, SensorError>;

    /// Current fan speed, used to verify a fan write took effect.
    async fn read_fan(&mut self, zone: ZoneId) -> core::result::Result<FanSpeed, SensorError>;

    /// Switch operating mode.  Resolves once the actuator accepted it.
    async fn command_mode(
        &mut self,
        zone: ZoneId,
        mode: HvacMode,
    ) -> core::result::Result<(), ActuatorError>;

    /// Switch fan speed.
    async fn command_fan(
        &mut self,
        zone: ZoneId,
        fan: FanSpeed,
    ) -> core::result::Result<(), ActuatorError>;

    /// Send the (possibly offset) setpoint.
    async fn command_temperature(
        &mut self,
        zone: ZoneId,
        setpoint: f32,
    ) -> core::result::Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The controller emits structured [`ControllerEvent`]s through this
/// port.  Adapters decide where they go.
pub trait EventSink {
    fn emit(&mut self, event: &ControllerEvent);
}

// ───────────────────────────────────────────────────────────────
// Snapshot store port (driven adapter: domain ↔ persistent state)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the controller snapshot.
///
/// Writes MUST be atomic: a crash mid-save leaves the previous snapshot
/// readable.
pub trait SnapshotStore {
    /// `Ok(None)` when nothing has been saved yet.
    fn load(&self) -> Result<Option<ControllerSnapshot>>;

    fn save(&mut self, snapshot: &ControllerSnapshot) -> Result<()>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock seconds, used for compressor timing and persisted start
/// timestamps.
pub trait Clock {
    fn now_secs(&self) -> f64;
}
