//! Clock adapters.
//!
//! - [`SystemClock`]: wall-clock seconds since the Unix epoch, for real
//!   deployments where start timestamps must survive a restart.
//! - [`ScaledClock`]: a simulation clock that runs `speedup` times faster
//!   than real time from a fixed epoch, driven by `std::time::Instant`.

use std::time::{Instant, SystemTime, UNIX_EPOCH};

use crate::app::ports::Clock;

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_secs(&self) -> f64 {
        // A clock before 1970 reads as the epoch.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0.0, |d| d.as_secs_f64())
    }
}

/// Accelerated clock for simulation.  Copies share the same timeline.
#[derive(Debug, Clone, Copy)]
pub struct ScaledClock {
    start: Instant,
    epoch: f64,
    speedup: f64,
}

impl ScaledClock {
    /// Clock reading `epoch` now and advancing `speedup` seconds per real
    /// second.
    pub fn new(epoch: f64, speedup: f64) -> Self {
        Self {
            start: Instant::now(),
            epoch,
            speedup: speedup.max(f64::MIN_POSITIVE),
        }
    }

    pub fn speedup(&self) -> f64 {
        self.speedup
    }
}

impl Clock for ScaledClock {
    fn now_secs(&self) -> f64 {
        self.epoch + self.start.elapsed().as_secs_f64() * self.speedup
    }
}
