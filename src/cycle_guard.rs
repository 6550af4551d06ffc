//! Compressor protection supervisor.
//!
//! Both zones share one compressor.  The guard keeps an explicit
//! running/stopped state plus the last transition times and enforces three
//! rules:
//!
//! 1. **Minimum off-time**: a start within `min_compressor_off_time` of the
//!    last stop is vetoed; both zones are held in `fan_only`.
//! 2. **Minimum runtime**: a stop within `min_compressor_runtime` of the
//!    last start is vetoed; each zone keeps its previous commanded mode.
//! 3. **Start-rate limit**: once `max_starts_per_hour` starts fall in the
//!    trailing hour, the arbitration deadband triples so fewer starts are
//!    requested in the first place.
//!
//! Rules 1 and 2 act *after* arbitration, rule 3 *before* it.
//!
//! ## State lifecycle
//!
//! 1. The control tick calls [`CycleGuard::enforce`] with the arbitrated
//!    modes and gets back the modes to command.
//! 2. After actuation it calls [`CycleGuard::record_applied`] exactly once;
//!    this is the only place `running` changes.
//! 3. A start pushes `now` into a 20-entry window; entries older than an
//!    hour stop counting but are only evicted by newer starts.

use log::{debug, info, warn};

use crate::config::ControlSettings;
use crate::zone::{HvacMode, Window};

/// Starts retained for rate limiting.
pub const START_HISTORY: usize = 20;
/// Trailing window for the start-rate limit (seconds).
pub const START_WINDOW_SECS: f64 = 3600.0;
/// Deadband multiplier once the start limit is reached.
pub const DEADBAND_EXPANSION: f32 = 3.0;

/// A timing rule overrode the arbitrated modes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOverride {
    /// Start vetoed; compressor has only been off `off_for` seconds.
    MinOffTime { off_for: f64, remaining: f64 },
    /// Stop vetoed; compressor has only run `ran_for` seconds.
    MinRuntime { ran_for: f64, remaining: f64 },
}

impl CycleOverride {
    pub const fn rule(&self) -> &'static str {
        match self {
            Self::MinOffTime { .. } => "MIN OFF-TIME",
            Self::MinRuntime { .. } => "MIN RUNTIME",
        }
    }
}

/// Compressor state change recorded after actuation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CompressorTransition {
    Started { starts_last_hour: usize },
    /// `runtime` is `None` when the start time is unknown (after a restart).
    Stopped { runtime: Option<f64> },
}

/// `start` lies in `(now - START_WINDOW_SECS, now]`.
fn in_start_window(now: f64, start: f64) -> bool {
    (0.0..START_WINDOW_SECS).contains(&(now - start))
}

/// `true` when either mode runs the compressor.
pub fn compressor_demanded(modes: [HvacMode; 2]) -> bool {
    modes.iter().any(|m| m.is_compressor())
}

/// Compressor protection state machine.
#[derive(Debug, Clone)]
pub struct CycleGuard {
    min_runtime: f64,
    min_off_time: f64,
    max_starts_per_hour: usize,
    running: bool,
    last_start: Option<f64>,
    last_stop: Option<f64>,
    starts: Window<f64, START_HISTORY>,
}

impl CycleGuard {
    pub fn new(settings: &ControlSettings) -> Self {
        Self {
            min_runtime: f64::from(settings.min_compressor_runtime),
            min_off_time: f64::from(settings.min_compressor_off_time),
            max_starts_per_hour: settings.max_starts_per_hour as usize,
            running: false,
            last_start: None,
            last_stop: None,
            starts: Window::new(),
        }
    }

    /// Apply the runtime/off-time rules to this tick's arbitrated modes.
    ///
    /// `previous` is what each zone was commanded last tick.
    pub fn enforce(
        &self,
        desired: [HvacMode; 2],
        previous: [HvacMode; 2],
        now: f64,
    ) -> ([HvacMode; 2], Option<CycleOverride>) {
        let demanded = compressor_demanded(desired);
        let would_start = demanded && !self.running;
        let would_stop = !demanded && self.running;

        if would_start {
            if let Some(stop) = self.last_stop {
                let off_for = now - stop;
                if off_for < self.min_off_time {
                    let remaining = self.min_off_time - off_for;
                    warn!(
                        "MIN OFF-TIME: preventing compressor start (off {:.0}s, need {:.0}s, {:.0}s left)",
                        off_for, self.min_off_time, remaining
                    );
                    return (
                        [HvacMode::FanOnly, HvacMode::FanOnly],
                        Some(CycleOverride::MinOffTime { off_for, remaining }),
                    );
                }
            }
        }

        if would_stop {
            if let Some(start) = self.last_start {
                let ran_for = now - start;
                if ran_for < self.min_runtime {
                    // Continuing with non-compressor modes would not keep it
                    // running; let the stop through.
                    if !compressor_demanded(previous) {
                        debug!("MIN RUNTIME: previous modes {:?} do not run compressor, allowing stop", previous);
                        return (desired, None);
                    }
                    let remaining = self.min_runtime - ran_for;
                    warn!(
                        "MIN RUNTIME: preventing compressor stop (ran {:.0}s, need {:.0}s, {:.0}s left)",
                        ran_for, self.min_runtime, remaining
                    );
                    return (
                        previous,
                        Some(CycleOverride::MinRuntime { ran_for, remaining }),
                    );
                }
            }
        }

        (desired, None)
    }

    /// Book-keep the modes that were actually commanded this tick.
    pub fn record_applied(&mut self, modes: [HvacMode; 2], now: f64) -> Option<CompressorTransition> {
        let running = compressor_demanded(modes);
        let transition = match (self.running, running) {
            (false, true) => {
                self.starts.push(now);
                self.last_start = Some(now);
                let starts_last_hour = self.count_recent_starts(now);
                warn!("COMPRESSOR START: {} starts in last hour", starts_last_hour);
                Some(CompressorTransition::Started { starts_last_hour })
            }
            (true, false) => {
                self.last_stop = Some(now);
                let runtime = self.last_start.map(|s| now - s);
                match runtime {
                    Some(r) => info!("COMPRESSOR STOP: after {:.0}s runtime", r),
                    None => info!("COMPRESSOR STOP"),
                }
                Some(CompressorTransition::Stopped { runtime })
            }
            _ => None,
        };
        self.running = running;
        transition
    }

    /// Starts strictly within the trailing hour.  Future timestamps never
    /// count.
    pub fn count_recent_starts(&self, now: f64) -> usize {
        self.starts
            .iter()
            .filter(|&t| in_start_window(now, t))
            .count()
    }

    /// Deadband for this tick's arbitration: tripled at the start limit.
    pub fn dynamic_deadband(&self, now: f64, base: f32) -> f32 {
        let recent = self.count_recent_starts(now);
        if recent >= self.max_starts_per_hour {
            let widened = base * DEADBAND_EXPANSION;
            warn!(
                "START LIMIT: {} starts in last hour (limit {}), deadband {:.1} -> {:.1}",
                recent, self.max_starts_per_hour, base, widened
            );
            widened
        } else {
            base
        }
    }

    /// Reload persisted start times, dropping any outside the trailing hour
    /// or later than `now`.
    pub fn restore_starts(&mut self, starts: impl IntoIterator<Item = f64>, now: f64) -> usize {
        self.starts.clear();
        for t in starts {
            if in_start_window(now, t) {
                self.starts.push(t);
            }
        }
        info!("Restored {} compressor starts from last hour", self.starts.len());
        self.starts.len()
    }

    /// Start timestamps currently held, oldest first.
    pub fn start_times(&self) -> impl Iterator<Item = f64> + '_ {
        self.starts.iter()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn last_start(&self) -> Option<f64> {
        self.last_start
    }

    pub fn last_stop(&self) -> Option<f64> {
        self.last_stop
    }
}
