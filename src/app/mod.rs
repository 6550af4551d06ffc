//! Application core: control orchestration, zero direct I/O.
//!
//! The [`service::Controller`] runs the control tick and the command
//! surface.  All interaction with actuators, storage and logging happens
//! through the **port traits** in [`ports`], keeping this layer fully
//! testable without real equipment.

pub mod actuation;
pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod snapshot;
