//! Single-threaded cooperative runtime around the [`Controller`].
//!
//! The controller, its adapters and the clock live together behind one
//! async mutex.  Periodic ticks and command-triggered ticks both take that
//! lock for their whole duration (including the actuation waits), so a
//! timer tick that fires while a command is in flight queues behind it
//! instead of interleaving.
//!
//! ```text
//!   ┌──────────────────────────────────────────────────────┐
//!   │  edge_executor::LocalExecutor                        │
//!   │                                                      │
//!   │  ┌──────────────┐          ┌───────────────────┐     │
//!   │  │ run()        │          │ command callers   │     │
//!   │  │ Timer ⏱ tick │          │ set_* / reset ... │     │
//!   │  └──────┬───────┘          └─────────┬─────────┘     │
//!   │         └──────────┬─────────────────┘               │
//!   │                    ▼                                 │
//!   │        Mutex<NoopRawMutex, RuntimeState>             │
//!   │   Controller · ClimatePort · Store · Sink · Clock    │
//!   └──────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;

use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embassy_sync::mutex::Mutex;
use log::{info, warn};

use crate::app::commands::ControllerCommand;
use crate::app::events::{ControllerState, Diagnostics, ZoneView};
use crate::app::ports::{ClimatePort, Clock, EventSink, SnapshotStore};
use crate::app::service::{Controller, TickOutcome};
use crate::error::Result;
use crate::zone::{FanSpeed, UserMode, ZoneId};

/// Everything a tick touches.
pub struct RuntimeState<H, S, E, C> {
    pub controller: Controller,
    pub hw: H,
    pub store: S,
    pub sink: E,
    pub clock: C,
}

/// Serialized access to a controller and its adapters.
pub struct ControllerRuntime<H, S, E, C> {
    state: Mutex<NoopRawMutex, RuntimeState<H, S, E, C>>,
    tick_period: Duration,
}

impl<H, S, E, C> ControllerRuntime<H, S, E, C>
where
    H: ClimatePort,
    S: SnapshotStore,
    E: EventSink,
    C: Clock,
{
    /// `tick_period` is the real-time wait between scheduled ticks; it
    /// differs from `update_interval` only under an accelerated clock.
    pub fn new(state: RuntimeState<H, S, E, C>, tick_period: Duration) -> Self {
        Self {
            state: Mutex::new(state),
            tick_period,
        }
    }

    /// Restore persisted state and run the first tick immediately.
    pub async fn start(&self) -> TickOutcome {
        let mut guard = self.state.lock().await;
        let s = &mut *guard;
        let now = s.clock.now_secs();
        s.controller.start(&s.store, &mut s.sink, now);
        s.controller.tick(&mut s.hw, &mut s.sink, now).await
    }

    /// One scheduled tick followed by the auto-save check.
    pub async fn tick(&self) -> TickOutcome {
        let mut guard = self.state.lock().await;
        let s = &mut *guard;
        let now = s.clock.now_secs();
        let outcome = s.controller.tick(&mut s.hw, &mut s.sink, now).await;
        s.controller
            .auto_save_if_needed(&mut s.store, &mut s.sink, s.clock.now_secs());
        outcome
    }

    /// Tick every `tick_period`.  `None` runs forever.
    pub async fn run(&self, ticks: Option<u64>) {
        info!(
            "Control loop started (period {:.3}s{})",
            self.tick_period.as_secs_f64(),
            ticks.map_or(String::new(), |n| format!(", {n} ticks"))
        );
        let mut done = 0_u64;
        while ticks.is_none_or(|n| done < n) {
            async_io_mini::Timer::after(self.tick_period).await;
            if let TickOutcome::Aborted(e) = self.tick().await {
                warn!("Tick {} aborted: {}", done + 1, e);
            }
            done += 1;
        }
        info!("Control loop finished after {} ticks", done);
    }

    /// Force-save any unsaved learned state.
    pub async fn shutdown(&self) {
        let mut guard = self.state.lock().await;
        let s = &mut *guard;
        s.controller.force_save_if_dirty(&mut s.store, &mut s.sink);
        info!("Controller shut down");
    }

    // ── Command surface ───────────────────────────────────────

    /// Apply a command and run its follow-up tick.
    pub async fn command(&self, cmd: ControllerCommand) -> Result<TickOutcome> {
        let mut guard = self.state.lock().await;
        let s = &mut *guard;
        let now = s.clock.now_secs();
        s.controller
            .handle_command(cmd, &mut s.hw, &mut s.store, &mut s.sink, now)
            .await
    }

    pub async fn set_target_temperature(&self, zone: ZoneId, temperature: f32) -> Result<TickOutcome> {
        self.command(ControllerCommand::SetTargetTemperature { zone, temperature })
            .await
    }

    pub async fn set_target_range(&self, zone: ZoneId, low: f32, high: f32) -> Result<TickOutcome> {
        self.command(ControllerCommand::SetTargetRange { zone, low, high })
            .await
    }

    pub async fn set_hvac_mode(&self, zone: ZoneId, mode: UserMode) -> Result<TickOutcome> {
        self.command(ControllerCommand::SetHvacMode { zone, mode }).await
    }

    pub async fn set_nominal_fan_speed(&self, zone: ZoneId, speed: FanSpeed) -> Result<TickOutcome> {
        self.command(ControllerCommand::SetNominalFanSpeed { zone, speed })
            .await
    }

    pub async fn set_enabled(&self, enabled: bool) -> Result<TickOutcome> {
        self.command(ControllerCommand::SetEnabled(enabled)).await
    }

    pub async fn reset_learning(&self) -> Result<TickOutcome> {
        self.command(ControllerCommand::ResetLearning).await
    }

    // ── Queries ───────────────────────────────────────────────

    pub async fn get_state(&self) -> ControllerState {
        self.state.lock().await.controller.get_state()
    }

    pub async fn diagnostics(&self) -> Diagnostics {
        let s = self.state.lock().await;
        s.controller.diagnostics(s.clock.now_secs())
    }

    pub async fn zone_view(&self, zone: ZoneId) -> ZoneView {
        self.state.lock().await.controller.zone_view(zone)
    }

    /// Run `f` with exclusive access to the whole runtime state.
    pub async fn with_state<R>(&self, f: impl FnOnce(&mut RuntimeState<H, S, E, C>) -> R) -> R {
        let mut guard = self.state.lock().await;
        f(&mut guard)
    }

    /// Consume the runtime and hand back its parts.
    pub fn into_state(self) -> RuntimeState<H, S, E, C> {
        self.state.into_inner()
    }
}
