//! Controller configuration.
//!
//! Supplied once at startup.  Every tuning field defaults, so a config
//! file only has to name the two actuators and their initial targets.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::zone::ZoneId;

/// One zone's actuator binding and initial target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoneConfig {
    /// Actuator reference handed to the climate port.
    pub climate_entity: String,
    /// Initial setpoint (°).
    pub target_temperature: f32,
}

/// Tunable control parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlSettings {
    // --- Arbitration ---
    /// Band around the setpoint with no active conditioning (°).
    pub deadband: f32,
    /// Smallest leakage offset applied to a lead zone (°).
    pub min_offset: f32,
    /// Error margin one zone needs over the other to win a conflict (°).
    pub conflict_threshold: f32,

    // --- Timing ---
    /// Seconds between scheduled control ticks.
    pub update_interval: u32,

    // --- Compressor protection ---
    /// Starts within the trailing hour before the deadband widens.
    pub max_starts_per_hour: u32,
    /// Minimum compressor runtime once started (seconds).
    pub min_compressor_runtime: u32,
    /// Minimum compressor rest before the next start (seconds).
    pub min_compressor_off_time: u32,

    // --- Actuation protocol ---
    /// Wait after a mode write before issuing the fan write (ms).
    pub mode_settle_ms: u32,
    /// Wait after a fan write before verifying it (ms).
    pub fan_verify_ms: u32,

    // --- Persistence ---
    /// Seconds an unsaved learned-state change may linger before auto-save.
    pub autosave_secs: u32,
}

impl Default for ControlSettings {
    fn default() -> Self {
        Self {
            deadband: 0.5,
            min_offset: 0.3,
            conflict_threshold: 2.0,

            update_interval: 60,

            max_starts_per_hour: 3,
            min_compressor_runtime: 180, // 3 min
            min_compressor_off_time: 180,

            mode_settle_ms: 200,
            fan_verify_ms: 1000,

            autosave_secs: 300,
        }
    }
}

/// Full controller configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ControllerConfig {
    pub zone1: ZoneConfig,
    pub zone2: ZoneConfig,
    #[serde(default)]
    pub settings: ControlSettings,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            zone1: ZoneConfig {
                climate_entity: "climate.zone_1".into(),
                target_temperature: 68.0,
            },
            zone2: ZoneConfig {
                climate_entity: "climate.zone_2".into(),
                target_temperature: 68.0,
            },
            settings: ControlSettings::default(),
        }
    }
}

impl ControllerConfig {
    pub fn zone(&self, id: ZoneId) -> &ZoneConfig {
        match id {
            ZoneId::Zone1 => &self.zone1,
            ZoneId::Zone2 => &self.zone2,
        }
    }

    /// Range-check every field.  Invalid values are rejected, not clamped.
    pub fn validate(&self) -> Result<()> {
        for id in ZoneId::ALL {
            let z = self.zone(id);
            if z.climate_entity.trim().is_empty() {
                return Err(Error::Config("climate_entity must not be empty"));
            }
            if !z.target_temperature.is_finite() {
                return Err(Error::Config("target_temperature must be finite"));
            }
        }

        let s = &self.settings;
        if !(s.deadband > 0.0 && s.deadband <= 10.0) {
            return Err(Error::Config("deadband must be in (0, 10]"));
        }
        if !(0.0..=4.0).contains(&s.min_offset) {
            return Err(Error::Config("min_offset must be 0.0–4.0"));
        }
        if !(s.conflict_threshold >= 0.0 && s.conflict_threshold.is_finite()) {
            return Err(Error::Config("conflict_threshold must be >= 0"));
        }
        if !(1..=3600).contains(&s.update_interval) {
            return Err(Error::Config("update_interval must be 1–3600 s"));
        }
        if !(1..=20).contains(&s.max_starts_per_hour) {
            return Err(Error::Config("max_starts_per_hour must be 1–20"));
        }
        if s.min_compressor_runtime > 3600 {
            return Err(Error::Config("min_compressor_runtime must be <= 3600 s"));
        }
        if s.min_compressor_off_time > 3600 {
            return Err(Error::Config("min_compressor_off_time must be <= 3600 s"));
        }
        if s.mode_settle_ms > 10_000 || s.fan_verify_ms > 10_000 {
            return Err(Error::Config("actuation waits must be <= 10000 ms"));
        }
        Ok(())
    }
}
