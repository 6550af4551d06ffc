//! Controller service: the hexagonal core.
//!
//! [`Controller`] owns both zones, the rate learner and the compressor
//! guard.  It exposes the control tick plus the command and query surface.
//! All I/O flows through port traits injected at call sites, so the whole
//! service runs against mock adapters in tests.
//!
//! ```text
//!  ClimatePort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                  │          Controller           │
//!  ClimatePort ◀── │ Rates · Arbiter · Leakage ·   │ ◀─▶ SnapshotStore
//!                  │ CycleGuard · Fan planner      │
//!                  └──────────────────────────────┘
//! ```
//!
//! ## Tick pipeline
//!
//! 1. Read both temperatures (abort with no mutation if either fails),
//!    then both modes (`off` on failure).
//! 2. Feed the rate learner.
//! 3. Desired modes with the guard's dynamic deadband.
//! 4. Conflict arbitration, or leakage compensation for a shared
//!    heat/cool, or pass-through.
//! 5. Compressor runtime/off-time rules.
//! 6. Lead zone and fan speeds from the final modes.
//! 7. Actuate (mode → fan per zone, then setpoints), then book-keep.

use log::{debug, info, warn};

use crate::config::{ControlSettings, ControllerConfig};
use crate::control::arbiter::{self, ConflictWinner};
use crate::control::fan;
use crate::control::leakage::{self, Compensation};
use crate::control::rates::{RateLearner, ZoneRates};
use crate::cycle_guard::{CompressorTransition, CycleGuard, CycleOverride};
use crate::error::{Error, Result, SensorError};
use crate::zone::{HvacMode, ZoneCommand, ZoneId, ZoneReading, ZoneState};

use super::actuation::{self, ActuationTiming};
use super::commands::ControllerCommand;
use super::events::{
    ControllerEvent, ControllerState, Diagnostics, LearningStatus, TelemetryData, ZoneSummary,
    ZoneView,
};
use super::ports::{ClimatePort, EventSink, SnapshotStore};
use super::snapshot::{ControllerSnapshot, ZoneSnapshot};

// ───────────────────────────────────────────────────────────────
// Tick outcome
// ───────────────────────────────────────────────────────────────

/// What one control tick did.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Controller disabled; nothing read, nothing changed.
    Skipped,
    /// A temperature read failed; nothing changed.
    Aborted(SensorError),
    Completed(TickReport),
}

impl TickOutcome {
    pub fn report(&self) -> Option<&TickReport> {
        match self {
            Self::Completed(r) => Some(r),
            _ => None,
        }
    }
}

/// Decisions taken by a completed tick.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub iteration: u64,
    pub readings: [ZoneReading; 2],
    /// Arbiter output before conflict handling.
    pub desired: [HvacMode; 2],
    pub commands: [ZoneCommand; 2],
    pub effective_deadband: f32,
    pub conflict: Option<ConflictWinner>,
    pub compensation: Option<Compensation>,
    pub cycle_override: Option<CycleOverride>,
    pub lead: Option<ZoneId>,
    pub compressor: Option<CompressorTransition>,
    pub actuator_errors: u32,
}

// ───────────────────────────────────────────────────────────────
// Controller
// ───────────────────────────────────────────────────────────────

/// The dual-zone controller.  Sole owner of all zone and learned state.
pub struct Controller {
    settings: ControlSettings,
    timing: ActuationTiming,
    zones: [ZoneState; 2],
    learner: RateLearner,
    guard: CycleGuard,
    enabled: bool,
    iteration_count: u64,
    last_readings: [Option<ZoneReading>; 2],
    last_commands: [Option<ZoneCommand>; 2],
    /// Time of the first unsaved learned-state change.
    dirty_since: Option<f64>,
}

impl Controller {
    /// Build from validated configuration.  Zones start in `auto`.
    pub fn new(config: &ControllerConfig) -> Self {
        let settings = config.settings.clone();
        Self {
            timing: ActuationTiming::from_settings(&settings),
            zones: [
                ZoneState::new(
                    config.zone1.climate_entity.clone(),
                    config.zone1.target_temperature,
                ),
                ZoneState::new(
                    config.zone2.climate_entity.clone(),
                    config.zone2.target_temperature,
                ),
            ],
            learner: RateLearner::new(settings.update_interval),
            guard: CycleGuard::new(&settings),
            enabled: true,
            iteration_count: 0,
            last_readings: [None; 2],
            last_commands: [None; 2],
            dirty_since: None,
            settings,
        }
    }

    /// Override the actuation waits (tests, instant simulated plants).
    pub fn with_timing(mut self, timing: ActuationTiming) -> Self {
        self.timing = timing;
        self
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Load the persisted snapshot, if any, and announce startup.
    ///
    /// A missing or unreadable snapshot leaves the configured defaults in
    /// place.  Returns `true` when state was restored.
    pub fn start(&mut self, store: &impl SnapshotStore, sink: &mut impl EventSink, now: f64) -> bool {
        let restored = match store.load() {
            Ok(Some(snap)) => match self.restore(&snap, now) {
                Ok(()) => true,
                Err(e) => {
                    warn!("Ignoring persisted state: {}", e);
                    false
                }
            },
            Ok(None) => {
                info!("No persisted state, starting from configuration");
                false
            }
            Err(e) => {
                warn!("Could not load persisted state: {}", e);
                false
            }
        };
        for id in ZoneId::ALL {
            let z = self.zone(id);
            info!(
                "{}: {} -> {:.1} (mode {}, fan {})",
                id,
                z.climate_entity,
                z.target_setpoint,
                z.user_mode.as_str(),
                z.nominal_fan_speed
            );
        }
        sink.emit(&ControllerEvent::Started {
            enabled: self.enabled,
            restored,
        });
        restored
    }

    /// Apply a persisted snapshot.  Start times older than an hour are
    /// discarded.
    pub fn restore(&mut self, snap: &ControllerSnapshot, now: f64) -> Result<()> {
        snap.validate()?;
        snap.zone1.apply_to(&mut self.zones[0]);
        snap.zone2.apply_to(&mut self.zones[1]);
        for id in ZoneId::ALL {
            self.learner.set_rates(id, snap.rates[id.index()]);
        }
        self.enabled = snap.enabled;
        self.guard
            .restore_starts(snap.compressor_start_times.iter().copied(), now);
        info!(
            "Loaded persisted state: zone1={:.1} (fan {}), zone2={:.1} (fan {})",
            self.zones[0].target_setpoint,
            self.zones[0].nominal_fan_speed,
            self.zones[1].target_setpoint,
            self.zones[1].nominal_fan_speed
        );
        Ok(())
    }

    /// Capture the persisted part of the state.
    pub fn snapshot(&self) -> ControllerSnapshot {
        let mut starts = heapless::Vec::new();
        for t in self.guard.start_times() {
            // The guard window and the snapshot share a capacity.
            let _ = starts.push(t);
        }
        ControllerSnapshot {
            zone1: ZoneSnapshot::capture(&self.zones[0]),
            zone2: ZoneSnapshot::capture(&self.zones[1]),
            rates: [
                self.learner.rates(ZoneId::Zone1),
                self.learner.rates(ZoneId::Zone2),
            ],
            enabled: self.enabled,
            compressor_start_times: starts,
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle.
    ///
    /// The `hw` parameter supplies both sensor reads and actuator writes
    /// for both zones.
    pub async fn tick(
        &mut self,
        hw: &mut impl ClimatePort,
        sink: &mut impl EventSink,
        now: f64,
    ) -> TickOutcome {
        if !self.enabled {
            debug!("Control tick skipped: controller disabled");
            return TickOutcome::Skipped;
        }

        // 1. Sensor snapshot.  Nothing is mutated until both temperatures
        //    are in hand.
        let mut temps = [0.0_f32; 2];
        for id in ZoneId::ALL {
            let reading = hw
                .read_temperature(id)
                .await
                .and_then(|t| {
                    if t.is_finite() {
                        Ok(t)
                    } else {
                        Err(SensorError::TemperatureUnavailable(id))
                    }
                });
            match reading {
                Ok(t) => temps[id.index()] = t,
                Err(e) => {
                    warn!("Unable to read temperature: {}; tick aborted", e);
                    sink.emit(&ControllerEvent::TickAborted(e));
                    return TickOutcome::Aborted(e);
                }
            }
        }
        let mut read_modes = [HvacMode::Off; 2];
        for id in ZoneId::ALL {
            read_modes[id.index()] = hw.read_mode(id).await.unwrap_or_else(|e| {
                debug!("{}; treating as off", e);
                HvacMode::Off
            });
        }
        let readings = [
            ZoneReading {
                temperature: temps[0],
                mode: read_modes[0],
            },
            ZoneReading {
                temperature: temps[1],
                mode: read_modes[1],
            },
        ];

        self.iteration_count += 1;
        debug!(
            "=== Control tick {} === temps {:.1}/{:.1}, modes {}/{}",
            self.iteration_count, temps[0], temps[1], read_modes[0], read_modes[1]
        );

        // 2. Rate learning.
        for id in ZoneId::ALL {
            let other_mode = self.zones[id.other().index()].last_commanded_mode;
            if let Some(update) =
                self.learner
                    .record_sample(id, temps[id.index()], read_modes[id.index()], other_mode)
            {
                self.mark_dirty(now);
                sink.emit(&ControllerEvent::RateLearned(update));
            }
        }

        // 3. Desired modes.
        let deadband = self.guard.dynamic_deadband(now, self.settings.deadband);
        let desired = [
            arbiter::desired_mode(&self.zones[0], temps[0], deadband),
            arbiter::desired_mode(&self.zones[1], temps[1], deadband),
        ];
        let targets = [self.zones[0].target_setpoint, self.zones[1].target_setpoint];
        let err_abs = [
            self.zones[0].error_abs(temps[0]),
            self.zones[1].error_abs(temps[1]),
        ];
        debug!(
            "Desired modes {}/{}, errors {:.2}/{:.2}, deadband {:.2}",
            desired[0], desired[1], err_abs[0], err_abs[1], deadband
        );

        // 4. Conflict or compensation.
        let mut modes = desired;
        let mut setpoints = targets;
        let mut conflict = None;
        let mut compensation = None;
        if arbiter::modes_conflict(desired[0], desired[1]) {
            info!(
                "MODE CONFLICT: zone1 wants {}, zone2 wants {}",
                desired[0], desired[1]
            );
            let (resolved, winner) =
                arbiter::resolve_conflict(desired, err_abs, self.settings.conflict_threshold);
            modes = resolved;
            conflict = Some(winner);
            sink.emit(&ControllerEvent::ModeConflict { desired, winner });
        } else if desired[0] == desired[1] && desired[0].is_conditioning() {
            let mode = desired[0];
            let rates = [
                self.active_rate(ZoneId::Zone1, mode),
                self.active_rate(ZoneId::Zone2, mode),
            ];
            let leakage = [
                self.learner.rates(ZoneId::Zone1).leakage,
                self.learner.rates(ZoneId::Zone2).leakage,
            ];
            match leakage::compensate(
                mode,
                targets,
                err_abs,
                rates,
                leakage,
                self.settings.min_offset,
            ) {
                Some(c) => compensation = Some(c),
                None => debug!("No leakage compensation (ETAs equal or unknown)"),
            }
        }

        // 5. Compressor protection.
        let previous = [
            self.zones[0].last_commanded_mode,
            self.zones[1].last_commanded_mode,
        ];
        let (modes, cycle_override) = self.guard.enforce(modes, previous, now);
        if let Some(ov) = cycle_override {
            sink.emit(&ControllerEvent::CycleOverride(ov));
        }

        // The offset only applies while the lead zone still runs the mode
        // it was computed for.
        let compensation = compensation.filter(|c| {
            let i = c.lead.index();
            let kept = modes[i] == desired[i];
            if !kept {
                debug!("Leakage compensation dropped: {} overridden to {}", c.lead, modes[i]);
            }
            kept
        });
        if let Some(c) = compensation {
            info!(
                "LEAKAGE COMPENSATION: {} leads by {:.1} min, offset {:.2} ({:.1} -> {:.2})",
                c.lead,
                c.eta_gap,
                c.offset,
                targets[c.lead.index()],
                c.setpoints[c.lead.index()]
            );
            setpoints = c.setpoints;
            sink.emit(&ControllerEvent::LeakageCompensation {
                lead: c.lead,
                offset: c.offset,
                eta_gap_min: c.eta_gap,
            });
        }

        // 6. Lead zone and fan speeds.
        let lead = self.lead_zone(modes, err_abs);
        let commands = [ZoneId::Zone1, ZoneId::Zone2].map(|id| {
            let i = id.index();
            ZoneCommand {
                mode: modes[i],
                fan: fan::plan(
                    self.zones[i].nominal_fan_speed,
                    modes[i],
                    err_abs[i],
                    lead == Some(id),
                    modes[id.other().index()],
                ),
                setpoint: setpoints[i],
            }
        });

        // 7. Actuate.
        if read_modes != modes {
            info!(
                "APPLYING MODE CHANGES: zone1 {} -> {}, zone2 {} -> {}",
                read_modes[0], modes[0], read_modes[1], modes[1]
            );
        }
        info!(
            "SETTING CONTROLS: zone1 mode={} fan={} setpoint={:.1} | zone2 mode={} fan={} setpoint={:.1}",
            commands[0].mode,
            commands[0].fan,
            commands[0].setpoint,
            commands[1].mode,
            commands[1].fan,
            commands[1].setpoint
        );
        let mut actuator_errors = 0;
        for id in ZoneId::ALL {
            let c = commands[id.index()];
            actuator_errors +=
                actuation::apply_mode_and_fan(hw, sink, self.timing, id, c.mode, c.fan).await;
        }
        for id in ZoneId::ALL {
            actuator_errors +=
                actuation::apply_setpoint(hw, sink, id, commands[id.index()].setpoint).await;
        }

        // Book-keeping.  Commands count as applied even if a write failed.
        for id in ZoneId::ALL {
            let i = id.index();
            if previous[i] != modes[i] {
                sink.emit(&ControllerEvent::ModeChanged {
                    zone: id,
                    from: previous[i],
                    to: modes[i],
                });
            }
            self.zones[i].last_commanded_mode = modes[i];
            self.last_readings[i] = Some(readings[i]);
            self.last_commands[i] = Some(commands[i]);
        }
        let compressor = self.guard.record_applied(modes, now);
        if let Some(t) = compressor {
            if matches!(t, CompressorTransition::Started { .. }) {
                self.mark_dirty(now);
            }
            sink.emit(&ControllerEvent::Compressor(t));
        }

        let r1 = self.learner.rates(ZoneId::Zone1);
        let r2 = self.learner.rates(ZoneId::Zone2);
        info!(
            "STATUS: Z1[{:.1}->{:.1} ({})] Z2[{:.1}->{:.1} ({})] | Rates: H[{:.3},{:.3}] C[{:.3},{:.3}] L[{:.3},{:.3}]",
            temps[0],
            commands[0].setpoint,
            modes[0],
            temps[1],
            commands[1].setpoint,
            modes[1],
            r1.heating,
            r2.heating,
            r1.cooling,
            r2.cooling,
            r1.leakage,
            r2.leakage
        );
        sink.emit(&ControllerEvent::Telemetry(TelemetryData {
            iteration: self.iteration_count,
            readings,
            commands,
            targets,
            rates: [r1, r2],
            lead,
            effective_deadband: deadband,
            compressor_running: self.guard.is_running(),
            starts_last_hour: self.guard.count_recent_starts(now),
        }));

        TickOutcome::Completed(TickReport {
            iteration: self.iteration_count,
            readings,
            desired,
            commands,
            effective_deadband: deadband,
            conflict,
            compensation,
            cycle_override,
            lead,
            compressor,
            actuator_errors,
        })
    }

    // ── Command handling ──────────────────────────────────────

    /// Apply an external command: mutate → persist → one control tick.
    ///
    /// Invalid arguments are rejected before anything changes.  A failed
    /// save is logged, leaves the change dirty for the next auto-save and
    /// does not stop the tick.
    pub async fn handle_command(
        &mut self,
        cmd: ControllerCommand,
        hw: &mut impl ClimatePort,
        store: &mut impl SnapshotStore,
        sink: &mut impl EventSink,
        now: f64,
    ) -> Result<TickOutcome> {
        debug!("Handling command {}", cmd.name());
        match cmd {
            ControllerCommand::SetTargetTemperature { zone, temperature } => {
                if !temperature.is_finite() {
                    return Err(Error::Config("temperature must be finite"));
                }
                let z = &mut self.zones[zone.index()];
                info!(
                    "COMMAND: {} target {:.1} -> {:.1}",
                    zone, z.target_setpoint, temperature
                );
                z.set_setpoint(temperature);
            }
            ControllerCommand::SetTargetRange { zone, low, high } => {
                let z = &mut self.zones[zone.index()];
                z.set_range(low, high)?;
                info!(
                    "COMMAND: {} range {:.1}..{:.1} (setpoint {:.1})",
                    zone, low, high, z.target_setpoint
                );
            }
            ControllerCommand::SetHvacMode { zone, mode } => {
                let z = &mut self.zones[zone.index()];
                info!(
                    "COMMAND: {} mode {} -> {}",
                    zone,
                    z.user_mode.as_str(),
                    mode.as_str()
                );
                z.user_mode = mode;
            }
            ControllerCommand::SetNominalFanSpeed { zone, speed } => {
                let z = &mut self.zones[zone.index()];
                info!("COMMAND: {} nominal fan {} -> {}", zone, z.nominal_fan_speed, speed);
                z.nominal_fan_speed = speed;
            }
            ControllerCommand::SetEnabled(enabled) => {
                warn!(
                    "COMMAND: controller {} (was {})",
                    if enabled { "enabled" } else { "disabled" },
                    if self.enabled { "enabled" } else { "disabled" }
                );
                self.enabled = enabled;
                sink.emit(&ControllerEvent::EnabledChanged(enabled));
            }
            ControllerCommand::ResetLearning => {
                warn!("COMMAND: resetting all learned rates");
                info!(
                    "Previous rates: zone1 {:?}, zone2 {:?}",
                    self.learner.rates(ZoneId::Zone1),
                    self.learner.rates(ZoneId::Zone2)
                );
                self.learner.reset();
                sink.emit(&ControllerEvent::LearningReset);
            }
        }

        if !self.persist(store, sink) {
            self.mark_dirty(now);
        }
        Ok(self.tick(hw, sink, now).await)
    }

    // ── Queries ───────────────────────────────────────────────

    /// Targets, nominal fans, enabled flag and every learned rate.
    pub fn get_state(&self) -> ControllerState {
        let r1 = self.learner.rates(ZoneId::Zone1);
        let r2 = self.learner.rates(ZoneId::Zone2);
        ControllerState {
            zone1: ZoneSummary {
                target_setpoint: self.zones[0].target_setpoint,
                nominal_fan_speed: self.zones[0].nominal_fan_speed,
            },
            zone2: ZoneSummary {
                target_setpoint: self.zones[1].target_setpoint,
                nominal_fan_speed: self.zones[1].nominal_fan_speed,
            },
            enabled: self.enabled,
            heating_rate: [r1.heating, r2.heating],
            cooling_rate: [r1.cooling, r2.cooling],
            leakage_rate: [r1.leakage, r2.leakage],
        }
    }

    pub fn diagnostics(&self, now: f64) -> Diagnostics {
        let rates = [
            self.learner.rates(ZoneId::Zone1),
            self.learner.rates(ZoneId::Zone2),
        ];
        let status = if rates.iter().any(ZoneRates::any_learned) {
            LearningStatus::Active
        } else {
            LearningStatus::Learning
        };
        Diagnostics {
            status,
            enabled: self.enabled,
            rates,
            starts_last_hour: self.guard.count_recent_starts(now),
            compressor_running: self.guard.is_running(),
            iteration_count: self.iteration_count,
            last_readings: self.last_readings,
            last_commands: self.last_commands,
        }
    }

    pub fn zone_view(&self, id: ZoneId) -> ZoneView {
        let z = &self.zones[id.index()];
        ZoneView {
            zone: id,
            climate_entity: z.climate_entity.clone(),
            current_temperature: self.last_readings[id.index()].map(|r| r.temperature),
            target_setpoint: z.target_setpoint,
            target_low: z.target_low,
            target_high: z.target_high,
            user_mode: z.user_mode,
            uses_range: z.user_mode.uses_range(),
            nominal_fan_speed: z.nominal_fan_speed,
            last_commanded_mode: z.last_commanded_mode,
            rates: self.learner.rates(id),
        }
    }

    pub fn zone(&self, id: ZoneId) -> &ZoneState {
        &self.zones[id.index()]
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Completed control ticks since startup.
    pub fn iteration_count(&self) -> u64 {
        self.iteration_count
    }

    pub fn settings(&self) -> &ControlSettings {
        &self.settings
    }

    pub fn cycle_guard(&self) -> &CycleGuard {
        &self.guard
    }

    pub fn rate_learner(&self) -> &RateLearner {
        &self.learner
    }

    // ── Persistence ───────────────────────────────────────────

    /// Save now.  Returns `true` on success.
    pub fn persist(&mut self, store: &mut impl SnapshotStore, sink: &mut impl EventSink) -> bool {
        match store.save(&self.snapshot()) {
            Ok(()) => {
                self.dirty_since = None;
                debug!("Saved controller state");
                true
            }
            Err(e) => {
                warn!("Could not save state: {}", e);
                if let Error::Storage(se) = e {
                    sink.emit(&ControllerEvent::PersistFailed(se));
                }
                false
            }
        }
    }

    /// Save if learned state has been dirty for `autosave_secs`.
    /// Returns `true` if a save happened.
    pub fn auto_save_if_needed(
        &mut self,
        store: &mut impl SnapshotStore,
        sink: &mut impl EventSink,
        now: f64,
    ) -> bool {
        let Some(since) = self.dirty_since else {
            return false;
        };
        if now - since < f64::from(self.settings.autosave_secs) {
            return false;
        }
        let saved = self.persist(store, sink);
        if saved {
            info!("Learned state auto-saved");
        }
        saved
    }

    /// Save if anything is unsaved (call before shutdown).
    pub fn force_save_if_dirty(&mut self, store: &mut impl SnapshotStore, sink: &mut impl EventSink) {
        if self.dirty_since.is_some() && self.persist(store, sink) {
            info!("Learned state saved before shutdown");
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty_since.is_some()
    }

    // ── Internal ──────────────────────────────────────────────

    fn mark_dirty(&mut self, now: f64) {
        if self.dirty_since.is_none() {
            self.dirty_since = Some(now);
        }
    }

    /// Learned rate for the direction `mode` pushes; `0.0` (unknown) for
    /// non-conditioning modes.
    fn active_rate(&self, id: ZoneId, mode: HvacMode) -> f32 {
        let r = self.learner.rates(id);
        match mode {
            HvacMode::Heat => r.heating,
            HvacMode::Cool => r.cooling,
            _ => 0.0,
        }
    }

    /// Lead zone from the final modes: smaller finite ETA when both zones
    /// condition, the only conditioning zone otherwise.
    fn lead_zone(&self, modes: [HvacMode; 2], err_abs: [f32; 2]) -> Option<ZoneId> {
        match (modes[0].is_conditioning(), modes[1].is_conditioning()) {
            (true, true) => leakage::lead_zone([
                leakage::time_to_target(err_abs[0], self.active_rate(ZoneId::Zone1, modes[0])),
                leakage::time_to_target(err_abs[1], self.active_rate(ZoneId::Zone2, modes[1])),
            ]),
            (true, false) => Some(ZoneId::Zone1),
            (false, true) => Some(ZoneId::Zone2),
            (false, false) => None,
        }
    }
}
