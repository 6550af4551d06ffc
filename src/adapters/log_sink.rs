//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each controller event as one
//! tagged log line.  A publishing adapter (MQTT, UI state) would implement
//! the same trait.

use log::{debug, info, warn};

use crate::app::events::ControllerEvent;
use crate::app::ports::EventSink;
use crate::control::arbiter::ConflictWinner;
use crate::cycle_guard::{CompressorTransition, CycleOverride};

/// Adapter that logs every [`ControllerEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &ControllerEvent) {
        match event {
            ControllerEvent::Started { enabled, restored } => {
                info!("START | enabled={} restored={}", enabled, restored);
            }
            ControllerEvent::Telemetry(t) => {
                info!(
                    "TELEM | #{} | Z1 {:.1}->{:.1} {} fan={} | Z2 {:.1}->{:.1} {} fan={} | \
                     lead={} | db={:.2} | comp={} starts/h={}",
                    t.iteration,
                    t.readings[0].temperature,
                    t.commands[0].setpoint,
                    t.commands[0].mode,
                    t.commands[0].fan,
                    t.readings[1].temperature,
                    t.commands[1].setpoint,
                    t.commands[1].mode,
                    t.commands[1].fan,
                    t.lead.map_or("none", |z| z.as_str()),
                    t.effective_deadband,
                    if t.compressor_running { "ON" } else { "OFF" },
                    t.starts_last_hour,
                );
            }
            ControllerEvent::TickAborted(e) => {
                warn!("TICK | aborted: {}", e);
            }
            ControllerEvent::ModeConflict { desired, winner } => {
                let winner = match winner {
                    ConflictWinner::Zone(z) => z.as_str(),
                    ConflictWinner::Neither => "neither",
                };
                info!(
                    "CONFLICT | desired {}/{} -> winner {}",
                    desired[0], desired[1], winner
                );
            }
            ControllerEvent::LeakageCompensation {
                lead,
                offset,
                eta_gap_min,
            } => {
                info!(
                    "COMPENSATE | lead={} offset={:.2} gap={:.1}min",
                    lead, offset, eta_gap_min
                );
            }
            ControllerEvent::CycleOverride(ov) => match ov {
                CycleOverride::MinOffTime { off_for, remaining } => warn!(
                    "PROTECT | {} off={:.0}s remaining={:.0}s",
                    ov.rule(),
                    off_for,
                    remaining
                ),
                CycleOverride::MinRuntime { ran_for, remaining } => warn!(
                    "PROTECT | {} ran={:.0}s remaining={:.0}s",
                    ov.rule(),
                    ran_for,
                    remaining
                ),
            },
            ControllerEvent::ModeChanged { zone, from, to } => {
                info!("MODE | {} {} -> {}", zone, from, to);
            }
            ControllerEvent::Compressor(t) => match t {
                CompressorTransition::Started { starts_last_hour } => {
                    info!("COMPRESSOR | start ({} in last hour)", starts_last_hour);
                }
                CompressorTransition::Stopped { runtime: Some(r) } => {
                    info!("COMPRESSOR | stop after {:.0}s", r);
                }
                CompressorTransition::Stopped { runtime: None } => {
                    info!("COMPRESSOR | stop");
                }
            },
            ControllerEvent::RateLearned(u) => {
                debug!(
                    "RATE | {} {} {:.3} -> {:.3}",
                    u.zone,
                    u.kind.as_str(),
                    u.old,
                    u.new
                );
            }
            ControllerEvent::ActuatorFault(e) => {
                warn!("ACTUATOR | {}", e);
            }
            ControllerEvent::FanMismatch {
                zone,
                requested,
                actual,
            } => {
                warn!("FAN | {} requested={} actual={}", zone, requested, actual);
            }
            ControllerEvent::EnabledChanged(enabled) => {
                info!("ENABLE | {}", enabled);
            }
            ControllerEvent::LearningReset => {
                info!("LEARN | reset");
            }
            ControllerEvent::PersistFailed(e) => {
                warn!("PERSIST | failed: {}", e);
            }
        }
    }
}
