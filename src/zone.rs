//! Zone domain types shared by every control stage.
//!
//! `ZoneState` is the per-zone record the controller owns: user intent
//! (mode, setpoints, nominal fan) plus the mode actually commanded last
//! tick.  `ZoneReading` is the per-tick sensor snapshot and `ZoneCommand`
//! the per-tick actuator output, mirroring the snapshot-in / commands-out
//! split of the control tick.

use core::fmt;

use heapless::Deque;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Half-width of the display range derived from a single setpoint.
pub const RANGE_HALF_WIDTH: f32 = 2.0;

// ---------------------------------------------------------------------------
// Zone identity
// ---------------------------------------------------------------------------

/// One of the two zones sharing the air handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZoneId {
    Zone1,
    Zone2,
}

impl ZoneId {
    pub const ALL: [ZoneId; 2] = [ZoneId::Zone1, ZoneId::Zone2];

    /// Array index for per-zone tables.
    pub const fn index(self) -> usize {
        match self {
            Self::Zone1 => 0,
            Self::Zone2 => 1,
        }
    }

    /// The zone sharing the airstream with this one.
    pub const fn other(self) -> Self {
        match self {
            Self::Zone1 => Self::Zone2,
            Self::Zone2 => Self::Zone1,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zone1 => "zone1",
            Self::Zone2 => "zone2",
        }
    }
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Modes
// ---------------------------------------------------------------------------

/// User-selected operating intent.  Independent of what gets commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserMode {
    Heat,
    Cool,
    /// Hold the temperature inside `[target_low, target_high]`.
    #[serde(rename = "heat_cool", alias = "auto")]
    Auto,
    Dry,
    FanOnly,
    Off,
}

impl UserMode {
    /// `true` when the zone is steered by a low/high range rather than a
    /// single setpoint.
    pub const fn uses_range(self) -> bool {
        matches!(self, Self::Auto)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Auto => "heat_cool",
            Self::Dry => "dry",
            Self::FanOnly => "fan_only",
            Self::Off => "off",
        }
    }
}

/// Operating mode actually sent to an actuator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HvacMode {
    Heat,
    Cool,
    Dry,
    FanOnly,
    Off,
}

impl HvacMode {
    /// Modes that run the shared compressor.
    pub const fn is_compressor(self) -> bool {
        matches!(self, Self::Heat | Self::Cool | Self::Dry)
    }

    /// Modes that actively push temperature (and so leak into the other zone).
    pub const fn is_conditioning(self) -> bool {
        matches!(self, Self::Heat | Self::Cool)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heat => "heat",
            Self::Cool => "cool",
            Self::Dry => "dry",
            Self::FanOnly => "fan_only",
            Self::Off => "off",
        }
    }
}

impl fmt::Display for HvacMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Fan speed
// ---------------------------------------------------------------------------

/// Discrete fan speeds, ordered quiet → high.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanSpeed {
    Quiet = 0,
    Low = 1,
    #[default]
    Medium = 2,
    High = 3,
}

impl FanSpeed {
    /// Ordinal level used for boost/reduce arithmetic.
    pub const fn level(self) -> u8 {
        self as u8
    }

    /// Speed for an ordinal level; levels above `High` saturate.
    pub const fn from_level(level: u8) -> Self {
        match level {
            0 => Self::Quiet,
            1 => Self::Low,
            2 => Self::Medium,
            _ => Self::High,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Quiet => "quiet",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for FanSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Zone state
// ---------------------------------------------------------------------------

/// Per-zone record owned by the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ZoneState {
    /// Actuator reference (e.g. `climate.living_room`).
    pub climate_entity: String,
    pub target_setpoint: f32,
    pub target_low: f32,
    pub target_high: f32,
    pub user_mode: UserMode,
    /// Mode sent to the actuator on the previous tick.
    pub last_commanded_mode: HvacMode,
    pub nominal_fan_speed: FanSpeed,
}

impl ZoneState {
    /// Fresh zone in `auto` with a ±2° range around `target`.
    pub fn new(climate_entity: impl Into<String>, target: f32) -> Self {
        Self {
            climate_entity: climate_entity.into(),
            target_setpoint: target,
            target_low: target - RANGE_HALF_WIDTH,
            target_high: target + RANGE_HALF_WIDTH,
            user_mode: UserMode::Auto,
            last_commanded_mode: HvacMode::Off,
            nominal_fan_speed: FanSpeed::default(),
        }
    }

    /// Set a single setpoint and re-derive the display range around it.
    pub fn set_setpoint(&mut self, target: f32) {
        self.target_setpoint = target;
        self.target_low = target - RANGE_HALF_WIDTH;
        self.target_high = target + RANGE_HALF_WIDTH;
    }

    /// Set the auto range; the setpoint becomes its midpoint.
    pub fn set_range(&mut self, low: f32, high: f32) -> Result<()> {
        if !low.is_finite() || !high.is_finite() {
            return Err(Error::Config("target range must be finite"));
        }
        if low > high {
            return Err(Error::Config("target_low must be <= target_high"));
        }
        self.target_low = low;
        self.target_high = high;
        self.target_setpoint = (low + high) / 2.0;
        Ok(())
    }

    /// Absolute distance between `current` and the plain setpoint.
    pub fn error_abs(&self, current: f32) -> f32 {
        (self.target_setpoint - current).abs()
    }
}

// ---------------------------------------------------------------------------
// Per-tick snapshot and commands
// ---------------------------------------------------------------------------

/// What a zone's actuator reported at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneReading {
    pub temperature: f32,
    pub mode: HvacMode,
}

/// What the tick decided to send to a zone's actuator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ZoneCommand {
    pub mode: HvacMode,
    pub fan: FanSpeed,
    /// Setpoint sent to the actuator (may carry a leakage offset).
    pub setpoint: f32,
}

// ---------------------------------------------------------------------------
// Bounded window
// ---------------------------------------------------------------------------

/// Fixed-capacity, most-recent-last buffer.  Pushing into a full window
/// evicts the oldest entry, so memory never grows past `N`.
#[derive(Debug, Clone)]
pub struct Window<T, const N: usize> {
    buf: Deque<T, N>,
}

impl<T: Copy, const N: usize> Window<T, N> {
    pub const CAPACITY: usize = N;

    pub const fn new() -> Self {
        Self { buf: Deque::new() }
    }

    pub fn push(&mut self, value: T) {
        if self.buf.is_full() {
            self.buf.pop_front();
        }
        // A slot is always free here.
        let _ = self.buf.push_back(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Most recent entry.
    pub fn last(&self) -> Option<T> {
        self.buf.back().copied()
    }

    /// Entry `n` places back from the most recent (`0` = most recent).
    pub fn from_back(&self, n: usize) -> Option<T> {
        let len = self.buf.len();
        if n >= len {
            return None;
        }
        self.buf.iter().nth(len - 1 - n).copied()
    }

    /// Up to `k` most recent entries, oldest first.
    pub fn recent(&self, k: usize) -> impl Iterator<Item = T> + '_ {
        let skip = self.buf.len().saturating_sub(k);
        self.buf.iter().skip(skip).copied()
    }

    /// All entries, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.buf.iter().copied()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }
}

impl<T: Copy, const N: usize> Default for Window<T, N> {
    fn default() -> Self {
        Self::new()
    }
}
