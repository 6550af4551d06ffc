//! Fuzz target: `ControllerSnapshot::from_postcard` + `Controller::restore`
//!
//! Any blob the decoder accepts must restore cleanly and leave the
//! controller in a state it can snapshot again.
//!
//! cargo fuzz run fuzz_snapshot_decode

#![no_main]

use dualzone::app::service::Controller;
use dualzone::app::snapshot::ControllerSnapshot;
use dualzone::config::ControllerConfig;
use dualzone::zone::ZoneId;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(snap) = ControllerSnapshot::from_postcard(data) else {
        return;
    };

    let mut controller = Controller::new(&ControllerConfig::default());
    controller
        .restore(&snap, 1.0e9)
        .expect("validated snapshot must restore");

    for id in ZoneId::ALL {
        let z = controller.zone(id);
        assert!(z.target_setpoint.is_finite());
        assert!(z.target_low <= z.target_high);
    }
    let again = controller.snapshot();
    assert!(again.validate().is_ok());
    let _ = again.to_postcard();
});
