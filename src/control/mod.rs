//! Pure control algorithms.  No I/O, no clocks: every input is passed in.
//!
//! | Module    | Stage                                          |
//! |-----------|------------------------------------------------|
//! | `rates`   | learn heating/cooling/leakage rates            |
//! | `arbiter` | desired mode per zone, conflict arbitration    |
//! | `leakage` | lead/lag ETA and setpoint offset               |
//! | `fan`     | fan speed around the nominal speed             |
//!
//! Compressor timing lives in [`crate::cycle_guard`] because it is stateful
//! across ticks in wall-clock time.

pub mod arbiter;
pub mod fan;
pub mod leakage;
pub mod rates;
