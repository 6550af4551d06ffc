//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                      |
//! |-------------|---------------|----------------------------------|
//! | `log_sink`  | EventSink     | `log` facade                     |
//! | `sim_plant` | ClimatePort   | simulated two-zone thermal model |
//! | `store`     | SnapshotStore | memory (postcard) / JSON file    |
//! | `time`      | Clock         | system clock / scaled sim clock  |

pub mod log_sink;
pub mod sim_plant;
pub mod store;
pub mod time;
