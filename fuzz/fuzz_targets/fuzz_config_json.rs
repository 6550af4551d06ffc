//! Fuzz target: controller configuration parsing and validation
//!
//! Arbitrary JSON must either be rejected or produce a configuration that
//! passes validation and builds a controller.
//!
//! cargo fuzz run fuzz_config_json

#![no_main]

use dualzone::app::service::Controller;
use dualzone::config::ControllerConfig;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(config) = serde_json::from_slice::<ControllerConfig>(data) else {
        return;
    };
    if config.validate().is_err() {
        return;
    }
    let controller = Controller::new(&config);
    assert!(controller.is_enabled());
    assert_eq!(controller.iteration_count(), 0);
});
