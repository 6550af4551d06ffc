//! Unified error types for the dual-zone controller.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control tick's error handling uniform.  All variants are `Copy` so they
//! can be carried in tick outcomes and events without allocation.
//!
//! None of these conditions is fatal: the controller logs them and retries
//! on the next tick.

use core::fmt;

use crate::zone::ZoneId;

// ---------------------------------------------------------------------------
// Top-level controller error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A zone's sensor could not be read.
    Sensor(SensorError),
    /// An actuator command failed.
    Actuator(ActuatorError),
    /// Snapshot storage failed.
    Storage(StorageError),
    /// Configuration or command argument is invalid.
    Config(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sensor(e) => write!(f, "sensor: {e}"),
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(msg) => write!(f, "config: {msg}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Sensor errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorError {
    /// The zone's actuator reports no usable temperature.
    TemperatureUnavailable(ZoneId),
    /// The zone's actuator state is unknown or unavailable.
    ModeUnavailable(ZoneId),
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemperatureUnavailable(z) => write!(f, "{z} temperature unavailable"),
            Self::ModeUnavailable(z) => write!(f, "{z} mode unavailable"),
        }
    }
}

impl From<SensorError> for Error {
    fn from(e: SensorError) -> Self {
        Self::Sensor(e)
    }
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// The actuator rejected or failed the mode write.
    ModeWriteFailed(ZoneId),
    /// The actuator rejected or failed the fan-speed write.
    FanWriteFailed(ZoneId),
    /// The actuator rejected or failed the setpoint write.
    SetpointWriteFailed(ZoneId),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ModeWriteFailed(z) => write!(f, "{z} mode write failed"),
            Self::FanWriteFailed(z) => write!(f, "{z} fan write failed"),
            Self::SetpointWriteFailed(z) => write!(f, "{z} setpoint write failed"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Storage errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// Stored snapshot failed deserialization.
    Corrupted,
    /// Snapshot could not be encoded.
    Encode,
    /// Generic I/O error from the storage backend.
    Io,
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Corrupted => write!(f, "snapshot corrupted"),
            Self::Encode => write!(f, "snapshot encode failed"),
            Self::Io => write!(f, "I/O error"),
        }
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
