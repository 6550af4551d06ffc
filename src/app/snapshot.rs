//! Persisted controller state.
//!
//! What survives a restart: user intent per zone, learned rates, the
//! enabled flag and recent compressor starts.  Histories, sample windows
//! and compressor on/off state are rebuilt from live readings.

use heapless::Vec;
use serde::{Deserialize, Serialize};

use crate::control::rates::ZoneRates;
use crate::cycle_guard::START_HISTORY;
use crate::error::{Result, StorageError};
use crate::zone::{FanSpeed, UserMode, ZoneState};

/// Persisted part of one [`ZoneState`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ZoneSnapshot {
    pub target_setpoint: f32,
    pub target_low: f32,
    pub target_high: f32,
    pub user_mode: UserMode,
    pub nominal_fan_speed: FanSpeed,
}

impl ZoneSnapshot {
    pub fn capture(zone: &ZoneState) -> Self {
        Self {
            target_setpoint: zone.target_setpoint,
            target_low: zone.target_low,
            target_high: zone.target_high,
            user_mode: zone.user_mode,
            nominal_fan_speed: zone.nominal_fan_speed,
        }
    }

    /// Write the persisted fields back into a live zone.
    pub fn apply_to(&self, zone: &mut ZoneState) {
        zone.target_setpoint = self.target_setpoint;
        zone.target_low = self.target_low;
        zone.target_high = self.target_high;
        zone.user_mode = self.user_mode;
        zone.nominal_fan_speed = self.nominal_fan_speed;
    }

    fn is_valid(&self) -> bool {
        self.target_setpoint.is_finite()
            && self.target_low.is_finite()
            && self.target_high.is_finite()
            && self.target_low <= self.target_high
    }
}

/// Full persisted state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub zone1: ZoneSnapshot,
    pub zone2: ZoneSnapshot,
    /// Zone1 then zone2.
    pub rates: [ZoneRates; 2],
    pub enabled: bool,
    /// Wall-clock seconds, oldest first.
    pub compressor_start_times: Vec<f64, START_HISTORY>,
}

impl ControllerSnapshot {
    /// Reject snapshots a restore would turn into nonsense state.
    pub fn validate(&self) -> Result<()> {
        if !self.zone1.is_valid() || !self.zone2.is_valid() {
            return Err(StorageError::Corrupted.into());
        }
        let rates_ok = self.rates.iter().all(|r| {
            [r.heating, r.cooling, r.leakage]
                .iter()
                .all(|v| v.is_finite() && *v >= 0.0)
        });
        if !rates_ok {
            return Err(StorageError::Corrupted.into());
        }
        if self.compressor_start_times.iter().any(|t| !t.is_finite()) {
            return Err(StorageError::Corrupted.into());
        }
        Ok(())
    }

    /// Decode a postcard blob and validate it.
    pub fn from_postcard(bytes: &[u8]) -> Result<Self> {
        let snap: Self = postcard::from_bytes(bytes).map_err(|_| StorageError::Corrupted)?;
        snap.validate()?;
        Ok(snap)
    }

    pub fn to_postcard(&self) -> Result<std::vec::Vec<u8>> {
        postcard::to_allocvec(self).map_err(|_| StorageError::Encode.into())
    }
}
