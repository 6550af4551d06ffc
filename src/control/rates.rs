//! Learned heating, cooling and leakage rates (°/minute).
//!
//! Each tick records one temperature/mode sample per zone.  The delta
//! against the previous sample is attributed by the mode the actuator was
//! in over that interval:
//!
//! | previous mode | other zone | delta        | feeds   |
//! |---------------|------------|--------------|---------|
//! | heat          | any        | > 0          | heating |
//! | cool          | any        | < 0          | cooling |
//! | fan_only      | heat/cool  | \|d\| > 0.05 | leakage |
//!
//! Rates blend as a 70/30 exponential moving average; the first
//! observation seeds the estimate.  Rates never decay on their own.
//!
//! Every sample list is a fixed-capacity window sized to the largest
//! average ever read from it, so memory stays constant no matter how long
//! the controller runs.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::zone::{HvacMode, Window, ZoneId};

/// Temperature/mode history depth per zone.
pub const HISTORY_LEN: usize = 10;
/// Raw-delta window depth per zone per kind.
pub const SAMPLE_WINDOW: usize = 5;

const ACTIVE_MIN_SAMPLES: usize = 3;
const ACTIVE_AVG_SAMPLES: usize = 5;
const LEAKAGE_MIN_SAMPLES: usize = 2;
const LEAKAGE_AVG_SAMPLES: usize = 3;
/// Passive drift below this is sensor noise, not leakage.
const LEAKAGE_MIN_DELTA: f32 = 0.05;

const EMA_KEEP: f32 = 0.7;
const EMA_NEW: f32 = 0.3;

/// One zone's learned rates.  `0.0` means "not learned yet".
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ZoneRates {
    pub heating: f32,
    pub cooling: f32,
    pub leakage: f32,
}

impl ZoneRates {
    /// `true` once any rate has been observed.
    pub fn any_learned(&self) -> bool {
        self.heating > 0.0 || self.cooling > 0.0 || self.leakage > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKind {
    Heating,
    Cooling,
    Leakage,
}

impl RateKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heating => "heating",
            Self::Cooling => "cooling",
            Self::Leakage => "leakage",
        }
    }
}

/// A rate estimate that moved this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateUpdate {
    pub zone: ZoneId,
    pub kind: RateKind,
    pub old: f32,
    pub new: f32,
}

#[derive(Debug, Clone, Default)]
struct ZoneTrack {
    temperatures: Window<f32, HISTORY_LEN>,
    modes: Window<HvacMode, HISTORY_LEN>,
    heating: Window<f32, SAMPLE_WINDOW>,
    cooling: Window<f32, SAMPLE_WINDOW>,
    leakage: Window<f32, SAMPLE_WINDOW>,
    rates: ZoneRates,
}

impl ZoneTrack {
    /// Fold the sample window for `kind` into its rate, if the window is
    /// deep enough.  Returns `(old, new)`.
    fn blend(&mut self, kind: RateKind, per_minute: f32) -> Option<(f32, f32)> {
        let (samples, min, take, rate) = match kind {
            RateKind::Heating => (
                &self.heating,
                ACTIVE_MIN_SAMPLES,
                ACTIVE_AVG_SAMPLES,
                &mut self.rates.heating,
            ),
            RateKind::Cooling => (
                &self.cooling,
                ACTIVE_MIN_SAMPLES,
                ACTIVE_AVG_SAMPLES,
                &mut self.rates.cooling,
            ),
            RateKind::Leakage => (
                &self.leakage,
                LEAKAGE_MIN_SAMPLES,
                LEAKAGE_AVG_SAMPLES,
                &mut self.rates.leakage,
            ),
        };
        if samples.len() < min {
            return None;
        }

        let (sum, n) = samples
            .recent(take)
            .fold((0.0_f32, 0_usize), |(s, n), v| (s + v, n + 1));
        let avg = sum / n as f32 * per_minute;

        let old = *rate;
        *rate = if old == 0.0 {
            avg
        } else {
            EMA_KEEP * old + EMA_NEW * avg
        };
        Some((old, *rate))
    }
}

/// Per-zone rate estimator.
#[derive(Debug, Clone)]
pub struct RateLearner {
    /// Scale from "per tick" deltas to "per minute".
    per_minute: f32,
    zones: [ZoneTrack; 2],
}

impl RateLearner {
    pub fn new(update_interval_secs: u32) -> Self {
        Self {
            per_minute: 60.0 / update_interval_secs.max(1) as f32,
            zones: Default::default(),
        }
    }

    /// Record this tick's reading for `zone`.
    ///
    /// `mode` is the mode the actuator reports now; `other_mode` is the
    /// mode last commanded to the other zone.
    pub fn record_sample(
        &mut self,
        zone: ZoneId,
        temperature: f32,
        mode: HvacMode,
        other_mode: HvacMode,
    ) -> Option<RateUpdate> {
        let per_minute = self.per_minute;
        let track = &mut self.zones[zone.index()];
        track.temperatures.push(temperature);
        track.modes.push(mode);

        let (Some(current), Some(previous)) =
            (track.temperatures.from_back(0), track.temperatures.from_back(1))
        else {
            return None;
        };
        let delta = current - previous;
        let prev_mode = track.modes.from_back(1).unwrap_or(mode);

        debug!(
            "{}: delta={:.3}, prev_mode={}, other_mode={}",
            zone, delta, prev_mode, other_mode
        );

        let kind = if prev_mode == HvacMode::Heat && delta > 0.0 {
            track.heating.push(delta);
            RateKind::Heating
        } else if prev_mode == HvacMode::Cool && delta < 0.0 {
            track.cooling.push(-delta);
            RateKind::Cooling
        } else if prev_mode == HvacMode::FanOnly
            && other_mode.is_conditioning()
            && delta.abs() > LEAKAGE_MIN_DELTA
        {
            track.leakage.push(delta.abs());
            RateKind::Leakage
        } else {
            return None;
        };

        let (old, new) = track.blend(kind, per_minute)?;
        if old == 0.0 {
            info!("{}: initial {} rate learned: {:.3}/min", zone, kind.as_str(), new);
        } else {
            debug!(
                "{}: {} rate updated: {:.3} -> {:.3}/min",
                zone,
                kind.as_str(),
                old,
                new
            );
        }
        Some(RateUpdate {
            zone,
            kind,
            old,
            new,
        })
    }

    pub fn rates(&self, zone: ZoneId) -> ZoneRates {
        self.zones[zone.index()].rates
    }

    /// Overwrite a zone's learned rates (restore from a snapshot).
    pub fn set_rates(&mut self, zone: ZoneId, rates: ZoneRates) {
        self.zones[zone.index()].rates = rates;
    }

    /// Zero every rate and sample window.  Temperature history is kept so
    /// the next tick can still compute a delta.
    pub fn reset(&mut self) {
        for track in &mut self.zones {
            track.rates = ZoneRates::default();
            track.heating.clear();
            track.cooling.clear();
            track.leakage.clear();
        }
    }

    /// Raw samples currently held for `zone`/`kind`.
    pub fn sample_count(&self, zone: ZoneId, kind: RateKind) -> usize {
        let track = &self.zones[zone.index()];
        match kind {
            RateKind::Heating => track.heating.len(),
            RateKind::Cooling => track.cooling.len(),
            RateKind::Leakage => track.leakage.len(),
        }
    }

    /// Temperature samples currently held for `zone`.
    pub fn history_len(&self, zone: ZoneId) -> usize {
        self.zones[zone.index()].temperatures.len()
    }
}
