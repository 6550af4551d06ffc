//! Simulated two-zone thermal plant.
//!
//! Implements [`ClimatePort`] against a lumped model: each zone's actuator
//! drives its temperature toward its setpoint at a fan-scaled rate, part
//! of that output leaks into the other zone, and both zones drift toward
//! the outdoor temperature.  The model integrates lazily up to the clock's
//! current time whenever it is touched, so it runs equally well in real
//! time or under a [`ScaledClock`](super::time::ScaledClock).

use log::debug;

use crate::app::ports::{ClimatePort, Clock};
use crate::error::{ActuatorError, SensorError};
use crate::zone::{FanSpeed, HvacMode, ZoneId};

/// Largest integration step (minutes).
const MAX_STEP_MIN: f64 = 0.5;

/// Model coefficients.  Rates are °/minute at medium fan.
#[derive(Debug, Clone, Copy)]
pub struct PlantParams {
    pub heat_rate: [f32; 2],
    pub cool_rate: [f32; 2],
    pub dry_rate: f32,
    /// Fraction of a zone's active output that reaches the other zone.
    pub leak_fraction: f32,
    /// Per-minute fraction of the indoor/outdoor gap closed passively.
    pub envelope_loss: f32,
    pub outdoor: f32,
}

impl Default for PlantParams {
    fn default() -> Self {
        Self {
            heat_rate: [0.30, 0.22],
            cool_rate: [0.25, 0.20],
            dry_rate: 0.08,
            leak_fraction: 0.35,
            envelope_loss: 0.004,
            outdoor: 45.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SimZone {
    temperature: f32,
    mode: HvacMode,
    fan: FanSpeed,
    setpoint: f32,
    offline: bool,
}

fn fan_factor(fan: FanSpeed) -> f32 {
    match fan {
        FanSpeed::Quiet => 0.6,
        FanSpeed::Low => 0.8,
        FanSpeed::Medium => 1.0,
        FanSpeed::High => 1.25,
    }
}

/// Simulated plant driven by clock `C`.
#[derive(Debug)]
pub struct SimulatedPlant<C: Clock> {
    clock: C,
    params: PlantParams,
    zones: [SimZone; 2],
    last_update: f64,
}

impl<C: Clock> SimulatedPlant<C> {
    /// Plant with both zones idle at the given starting temperatures.
    pub fn new(clock: C, params: PlantParams, initial: [f32; 2]) -> Self {
        let zone = |t: f32| SimZone {
            temperature: t,
            mode: HvacMode::Off,
            fan: FanSpeed::default(),
            setpoint: t,
            offline: false,
        };
        let last_update = clock.now_secs();
        Self {
            clock,
            params,
            zones: [zone(initial[0]), zone(initial[1])],
            last_update,
        }
    }

    /// Make a zone's sensor unavailable (or available again).
    pub fn set_offline(&mut self, zone: ZoneId, offline: bool) {
        self.zones[zone.index()].offline = offline;
    }

    pub fn temperature(&mut self, zone: ZoneId) -> f32 {
        self.advance();
        self.zones[zone.index()].temperature
    }

    pub fn mode(&self, zone: ZoneId) -> HvacMode {
        self.zones[zone.index()].mode
    }

    pub fn setpoint(&self, zone: ZoneId) -> f32 {
        self.zones[zone.index()].setpoint
    }

    /// Integrate up to the clock's current time.
    fn advance(&mut self) {
        let now = self.clock.now_secs();
        let mut remaining = ((now - self.last_update) / 60.0).max(0.0);
        self.last_update = now;
        while remaining > 0.0 {
            let dt = remaining.min(MAX_STEP_MIN);
            self.step(dt as f32);
            remaining -= dt;
        }
    }

    /// Signed active output of one zone (°/min).
    fn output(&self, i: usize) -> f32 {
        let z = &self.zones[i];
        let ff = fan_factor(z.fan);
        match z.mode {
            HvacMode::Heat if z.temperature < z.setpoint => self.params.heat_rate[i] * ff,
            HvacMode::Cool if z.temperature > z.setpoint => -self.params.cool_rate[i] * ff,
            HvacMode::Dry => -self.params.dry_rate * ff,
            _ => 0.0,
        }
    }

    fn step(&mut self, dt_min: f32) {
        let out = [self.output(0), self.output(1)];
        for i in 0..2 {
            let other = 1 - i;
            let z = &mut self.zones[i];
            let drift = self.params.envelope_loss * (self.params.outdoor - z.temperature);
            z.temperature += (out[i] + self.params.leak_fraction * out[other] + drift) * dt_min;
        }
    }
}

impl<C: Clock> ClimatePort for SimulatedPlant<C> {
    async fn read_temperature(&mut self, zone: ZoneId) -> Result<f32, SensorError> {
        self.advance();
        let z = &self.zones[zone.index()];
        if z.offline {
            return Err(SensorError::TemperatureUnavailable(zone));
        }
        Ok(z.temperature)
    }

    async fn read_mode(&mut self, zone: ZoneId) -> Result<HvacMode, SensorError> {
        let z = &self.zones[zone.index()];
        if z.offline {
            return Err(SensorError::ModeUnavailable(zone));
        }
        Ok(z.mode)
    }

    async fn read_fan(&mut self, zone: ZoneId) -> Result<FanSpeed, SensorError> {
        Ok(self.zones[zone.index()].fan)
    }

    async fn command_mode(&mut self, zone: ZoneId, mode: HvacMode) -> Result<(), ActuatorError> {
        self.advance();
        let z = &mut self.zones[zone.index()];
        if z.offline {
            return Err(ActuatorError::ModeWriteFailed(zone));
        }
        if z.mode != mode {
            debug!("SIM: {} mode {} -> {}", zone, z.mode, mode);
        }
        z.mode = mode;
        Ok(())
    }

    async fn command_fan(&mut self, zone: ZoneId, fan: FanSpeed) -> Result<(), ActuatorError> {
        self.advance();
        let z = &mut self.zones[zone.index()];
        if z.offline {
            return Err(ActuatorError::FanWriteFailed(zone));
        }
        z.fan = fan;
        Ok(())
    }

    async fn command_temperature(&mut self, zone: ZoneId, setpoint: f32) -> Result<(), ActuatorError> {
        self.advance();
        let z = &mut self.zones[zone.index()];
        if z.offline {
            return Err(ActuatorError::SetpointWriteFailed(zone));
        }
        z.setpoint = setpoint;
        Ok(())
    }
}
