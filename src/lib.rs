//! Dual-zone HVAC coordinator.
//!
//! Drives two independently controllable climate actuators that share one
//! outdoor compressor.  The controller arbitrates heat/cool conflicts,
//! compensates for inter-zone thermal leakage, learns per-zone rates,
//! shapes fan speeds and protects the compressor from short-cycling.
//!
//! Everything below the [`adapters`] layer is pure logic behind port
//! traits, so the whole controller runs against mocks in tests.

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod control;
pub mod cycle_guard;
pub mod error;
pub mod runtime;
pub mod zone;
