//! DualZone host runner.
//!
//! Wires the controller to the simulated two-zone plant and runs it on a
//! single-threaded executor under an accelerated clock.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                   │
//! │                                                           │
//! │  SimulatedPlant   LogEventSink   FileStore   ScaledClock  │
//! │  (ClimatePort)    (EventSink)    (Snapshot)  (Clock)      │
//! │                                                           │
//! │  ────────────── Port Trait Boundary ───────────────       │
//! │                                                           │
//! │  ┌─────────────────────────────────────────────────┐      │
//! │  │            Controller (pure logic)              │      │
//! │  │  Rates · Arbiter · Leakage · Fan · CycleGuard   │      │
//! │  └─────────────────────────────────────────────────┘      │
//! │                                                           │
//! │  ControllerRuntime (tick loop + command serialization)    │
//! └───────────────────────────────────────────────────────────┘
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tracing_subscriber::EnvFilter;

use dualzone::adapters::log_sink::LogEventSink;
use dualzone::adapters::sim_plant::{PlantParams, SimulatedPlant};
use dualzone::adapters::store::FileStore;
use dualzone::adapters::time::{ScaledClock, SystemClock};
use dualzone::app::actuation::ActuationTiming;
use dualzone::app::ports::{ClimatePort, Clock, EventSink, SnapshotStore};
use dualzone::app::service::Controller;
use dualzone::config::ControllerConfig;
use dualzone::runtime::{ControllerRuntime, RuntimeState};
use dualzone::zone::{UserMode, ZoneId};

#[derive(Parser, Debug)]
#[command(name = "dualzone", version, about = "Dual-zone HVAC coordinator (simulated plant)")]
struct Cli {
    /// JSON controller configuration; defaults are used when omitted
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Persisted controller state (JSON)
    #[arg(short, long, default_value = "dualzone-state.json")]
    state: PathBuf,

    /// Number of scheduled ticks to run
    #[arg(short, long, default_value_t = 120)]
    ticks: u64,

    /// Simulated seconds per real second
    #[arg(long, default_value_t = 600.0)]
    speedup: f64,

    /// Starting temperature of zone 1
    #[arg(long, default_value_t = 64.0)]
    zone1_temp: f32,

    /// Starting temperature of zone 2
    #[arg(long, default_value_t = 74.0)]
    zone2_temp: f32,

    /// Mode applied to zone 1 at startup (heat, cool, heat_cool, dry, fan_only, off)
    #[arg(long, value_parser = parse_user_mode)]
    zone1_mode: Option<UserMode>,

    /// Mode applied to zone 2 at startup
    #[arg(long, value_parser = parse_user_mode)]
    zone2_mode: Option<UserMode>,

    /// Raise zone 2's target to this value halfway through the run
    #[arg(long)]
    retarget: Option<f32>,
}

fn parse_user_mode(s: &str) -> Result<UserMode, String> {
    serde_json::from_value(serde_json::Value::String(s.to_owned()))
        .map_err(|_| format!("unknown mode '{s}'"))
}

fn load_config(path: Option<&Path>) -> Result<ControllerConfig> {
    let config = match path {
        Some(p) => {
            let text = fs::read_to_string(p)
                .with_context(|| format!("reading config {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("parsing config {}", p.display()))?
        }
        None => {
            info!("No config file given, using defaults");
            ControllerConfig::default()
        }
    };
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Scripted command traffic interleaved with the tick loop.
async fn script<H, S, E, C>(rt: &ControllerRuntime<H, S, E, C>, cli: &Cli, period: Duration)
where
    H: ClimatePort,
    S: SnapshotStore,
    E: EventSink,
    C: Clock,
{
    for (zone, mode) in [(ZoneId::Zone1, cli.zone1_mode), (ZoneId::Zone2, cli.zone2_mode)] {
        if let Some(mode) = mode {
            if let Err(e) = rt.set_hvac_mode(zone, mode).await {
                warn!("{} mode command rejected: {}", zone, e);
            }
        }
    }
    if let Some(target) = cli.retarget {
        async_io_mini::Timer::after(period.mul_f64(cli.ticks as f64 / 2.0)).await;
        if let Err(e) = rt.set_target_temperature(ZoneId::Zone2, target).await {
            warn!("retarget rejected: {}", e);
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    anyhow::ensure!(
        cli.speedup.is_finite() && cli.speedup >= 1.0,
        "speedup must be >= 1"
    );
    info!("DualZone v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config(cli.config.as_deref())?;
    let clock = ScaledClock::new(SystemClock::new().now_secs(), cli.speedup);
    info!(
        "Simulated plant at {}x real time, {} ticks",
        clock.speedup(),
        cli.ticks
    );
    let plant = SimulatedPlant::new(
        clock,
        PlantParams::default(),
        [cli.zone1_temp, cli.zone2_temp],
    );

    let base = ActuationTiming::from_settings(&config.settings);
    let timing = ActuationTiming {
        mode_settle: base.mode_settle.div_f64(cli.speedup),
        fan_verify: base.fan_verify.div_f64(cli.speedup),
    };
    let period = Duration::from_secs(u64::from(config.settings.update_interval)).div_f64(cli.speedup);

    let store = FileStore::new(&cli.state);
    info!("State file: {}", store.path().display());

    let runtime = ControllerRuntime::new(
        RuntimeState {
            controller: Controller::new(&config).with_timing(timing),
            hw: plant,
            store,
            sink: LogEventSink::new(),
            clock,
        },
        period,
    );

    let executor: edge_executor::LocalExecutor<'_, 8> = edge_executor::LocalExecutor::new();
    futures_lite::future::block_on(executor.run(async {
        runtime.start().await;
        executor.spawn(script(&runtime, &cli, period)).detach();
        runtime.run(Some(cli.ticks)).await;
        runtime.shutdown().await;
    }));

    let (state, diagnostics) =
        futures_lite::future::block_on(async { (runtime.get_state().await, runtime.diagnostics().await) });
    println!("{}", serde_json::to_string_pretty(&state)?);
    println!("{}", serde_json::to_string_pretty(&diagnostics)?);
    Ok(())
}
