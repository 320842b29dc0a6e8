//! Collaborator backends for the pump controller.
//!
//! - `sim`-style types in this module: a small tank model shared between the
//!   relays, the float switch, the current transducer and the probes, so the
//!   controller can be exercised end to end on a workstation.
//! - `w1`: Linux one-wire sysfs reader for DS18B20 probes.
//! - `rpi` (feature `hardware`): rppal-backed relays, switches, MCP3008 ADC
//!   and a PCF8574 I2C character LCD.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;
pub mod w1;

use pump_traits::{
    BoxError, CharacterDisplay, Clock, CurrentSensor, PumpId, RelayBank, SensorId, SwitchBank,
    SwitchId, TemperatureBus,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Instant;

use crate::error::HwError;

/// Full-scale count of the 16-bit ADC reading exposed to the core.
pub const ADC_FULL_SCALE: f32 = 65535.0;

/// Tunables of the simulated tank and transducers.
#[derive(Debug, Clone)]
pub struct SimParams {
    /// Tank fill as a fraction of capacity at start.
    pub initial_level: f32,
    /// Fraction of capacity added per second by the inflow.
    pub inflow_per_s: f32,
    /// Fraction of capacity removed per second by each running pump.
    pub outflow_per_s: f32,
    /// The float lifts (switch closes) at or above this level...
    pub float_on_level: f32,
    /// ...and drops (switch opens) below this one.
    pub float_off_level: f32,
    /// Line current drawn by each pump while its relay is on.
    pub running_amps: [f32; 2],
    pub ambient_c: f32,
    /// Motor temperature rise over ambient while running.
    pub running_rise_c: f32,
    /// Probe ROM codes, pump 1 first.
    pub probes: [SensorId; 2],
    /// Initial switch positions.
    pub manual: bool,
    pub pump_select: bool,
    /// Make every temperature read fail (exercises the recoverable path).
    pub temperature_bus_fails: bool,
    pub adc_reference_v: f32,
    pub current_midpoint_v: f32,
    pub current_sensitivity_v_per_a: f32,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            initial_level: 0.0,
            inflow_per_s: 0.02,
            outflow_per_s: 0.05,
            float_on_level: 0.8,
            float_off_level: 0.2,
            running_amps: [8.5, 8.5],
            ambient_c: 24.0,
            running_rise_c: 18.0,
            probes: [SensorId([0x28, 1, 0, 0, 0, 0, 0, 0]), SensorId([0x28, 2, 0, 0, 0, 0, 0, 0])],
            manual: false,
            pump_select: true,
            temperature_bus_fails: false,
            adc_reference_v: 3.3,
            current_midpoint_v: 1.65,
            current_sensitivity_v_per_a: 0.066,
        }
    }
}

struct SimState {
    params: SimParams,
    clock: Rc<dyn Clock>,
    level: f32,
    float_closed: bool,
    relays: [bool; 2],
    manual: bool,
    pump_select: bool,
    last_update: Instant,
    sample_phase: u32,
    extra_amps: f32,
}

impl SimState {
    /// Integrate the tank level up to "now".
    fn advance(&mut self) {
        let now = self.clock.now();
        let dt = now.saturating_duration_since(self.last_update).as_secs_f32();
        self.last_update = now;
        let running = self.relays.iter().filter(|r| **r).count() as f32;
        let delta = self.params.inflow_per_s * dt - self.params.outflow_per_s * running * dt;
        self.level = (self.level + delta).clamp(0.0, 1.0);
        if self.level >= self.params.float_on_level {
            self.float_closed = true;
        } else if self.level < self.params.float_off_level {
            self.float_closed = false;
        }
    }

    fn line_amps(&self) -> f32 {
        let mut amps = self.extra_amps;
        for (on, rated) in self.relays.iter().zip(self.params.running_amps) {
            if *on {
                amps += rated;
            }
        }
        amps
    }

    fn amps_to_raw(&self, amps: f32) -> u16 {
        let p = &self.params;
        let volts = p.current_midpoint_v + amps * p.current_sensitivity_v_per_a;
        let raw = (volts / p.adc_reference_v * ADC_FULL_SCALE).round();
        raw.clamp(0.0, ADC_FULL_SCALE) as u16
    }
}

/// Simulated pumping station: owns the shared tank model and hands out the
/// collaborator handles the controller needs.
#[derive(Clone)]
pub struct SimulatedStation {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedStation {
    pub fn new(params: SimParams, clock: impl Clock + 'static) -> Self {
        let clock: Rc<dyn Clock> = Rc::new(clock);
        let now = clock.now();
        let mut state = SimState {
            level: params.initial_level.clamp(0.0, 1.0),
            float_closed: false,
            relays: [false; 2],
            manual: params.manual,
            pump_select: params.pump_select,
            last_update: now,
            sample_phase: 0,
            extra_amps: 0.0,
            clock,
            params,
        };
        state.float_closed = state.level >= state.params.float_on_level;
        Self {
            state: Rc::new(RefCell::new(state)),
        }
    }

    pub fn relays(&self) -> SimulatedRelays {
        SimulatedRelays {
            state: self.state.clone(),
        }
    }

    pub fn switches(&self) -> SimulatedSwitches {
        SimulatedSwitches {
            state: self.state.clone(),
        }
    }

    pub fn current_sensor(&self) -> SimulatedCurrentSensor {
        SimulatedCurrentSensor {
            state: self.state.clone(),
        }
    }

    pub fn temperature_bus(&self) -> SimulatedTemperatureBus {
        SimulatedTemperatureBus {
            state: self.state.clone(),
        }
    }

    /// Current tank level (0.0..=1.0).
    pub fn level(&self) -> f32 {
        let mut st = self.state.borrow_mut();
        st.advance();
        st.level
    }

    pub fn relay_on(&self, pump: PumpId) -> bool {
        self.state.borrow().relays[pump.index()]
    }

    /// Flip an operator switch. The float cannot be forced; it follows the level.
    pub fn set_switch(&self, id: SwitchId, on: bool) {
        let mut st = self.state.borrow_mut();
        match id {
            SwitchId::Manual => st.manual = on,
            SwitchId::PumpSelect => st.pump_select = on,
            SwitchId::Float => {
                st.level = if on {
                    st.params.float_on_level
                } else {
                    0.0
                };
                st.float_closed = on;
            }
        }
    }

    /// Add a current offset on the shared line (e.g. a seized impeller).
    pub fn inject_extra_amps(&self, amps: f32) {
        self.state.borrow_mut().extra_amps = amps;
    }
}

pub struct SimulatedRelays {
    state: Rc<RefCell<SimState>>,
}

impl RelayBank for SimulatedRelays {
    fn set_relay(&mut self, pump: PumpId, on: bool) -> Result<(), BoxError> {
        let mut st = self.state.borrow_mut();
        // Settle the level with the old relay state before switching.
        st.advance();
        if st.relays[pump.index()] != on {
            tracing::debug!(pump = pump.number(), on, "relay (simulated)");
        }
        st.relays[pump.index()] = on;
        Ok(())
    }
}

pub struct SimulatedSwitches {
    state: Rc<RefCell<SimState>>,
}

impl SwitchBank for SimulatedSwitches {
    fn read_switch(&mut self, id: SwitchId) -> Result<bool, BoxError> {
        let mut st = self.state.borrow_mut();
        st.advance();
        Ok(match id {
            SwitchId::Manual => st.manual,
            SwitchId::PumpSelect => st.pump_select,
            SwitchId::Float => st.float_closed,
        })
    }
}

/// One shared ACS712 on the common supply line: it sees the sum of both pumps.
pub struct SimulatedCurrentSensor {
    state: Rc<RefCell<SimState>>,
}

impl CurrentSensor for SimulatedCurrentSensor {
    fn read_raw_sample(&mut self) -> Result<u16, BoxError> {
        let mut st = self.state.borrow_mut();
        st.sample_phase = st.sample_phase.wrapping_add(1);
        // Mains ripple: +/-4 % over a 20-sample period.
        let phase = (st.sample_phase % 20) as f32 / 20.0 * std::f32::consts::TAU;
        let amps = st.line_amps() * (1.0 + 0.04 * phase.sin());
        Ok(st.amps_to_raw(amps))
    }
}

pub struct SimulatedTemperatureBus {
    state: Rc<RefCell<SimState>>,
}

impl TemperatureBus for SimulatedTemperatureBus {
    fn start_conversion(&mut self) -> Result<(), BoxError> {
        if self.state.borrow().params.temperature_bus_fails {
            return Err(Box::new(HwError::Simulated("no presence pulse")));
        }
        Ok(())
    }

    fn read_celsius(&mut self, sensor: &SensorId) -> Result<f32, BoxError> {
        let st = self.state.borrow();
        if st.params.temperature_bus_fails {
            return Err(Box::new(HwError::Simulated("no presence pulse")));
        }
        let slot = st
            .params
            .probes
            .iter()
            .position(|p| p == sensor)
            .ok_or_else(|| HwError::SensorMissing {
                sensor: sensor.to_string(),
            })?;
        let rise = if st.relays[slot] {
            st.params.running_rise_c
        } else {
            0.0
        };
        Ok(st.params.ambient_c + rise)
    }
}

/// Character display that prints to stdout; one line per refresh.
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    width: usize,
}

impl ConsoleDisplay {
    pub fn new(width: usize) -> Self {
        Self { width }
    }
}

impl CharacterDisplay for ConsoleDisplay {
    fn width(&self) -> usize {
        if self.width == 0 { 16 } else { self.width }
    }

    fn show_lines(&mut self, line1: &str, line2: &str) -> Result<(), BoxError> {
        println!("LCD [{line1}] [{line2}]");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_traits::ManualClock;
    use std::time::Duration;

    #[test]
    fn test_simulated_current_tracks_relays() {
        let clock = ManualClock::new();
        let station = SimulatedStation::new(SimParams::default(), clock);
        let mut sensor = station.current_sensor();
        let idle = sensor.read_raw_sample().unwrap();
        // Midpoint of a 3.3 V reference is half scale.
        assert!((idle as i32 - 32768).abs() < 5, "idle raw {idle}");

        station.relays().set_relay(PumpId::One, true).unwrap();
        let running = sensor.read_raw_sample().unwrap();
        assert!(running > idle);
    }

    #[test]
    fn test_float_follows_level_with_hysteresis() {
        let clock = ManualClock::new();
        let params = SimParams {
            initial_level: 0.75,
            inflow_per_s: 0.1,
            outflow_per_s: 0.3,
            ..SimParams::default()
        };
        let station = SimulatedStation::new(params, clock.clone());
        let mut switches = station.switches();
        assert!(!switches.read_switch(SwitchId::Float).unwrap());

        clock.advance(Duration::from_secs(1));
        assert!(switches.read_switch(SwitchId::Float).unwrap());

        // Draining below the on-level keeps the float up until the off-level.
        station.relays().set_relay(PumpId::Two, true).unwrap();
        clock.advance(Duration::from_secs(1));
        assert!(switches.read_switch(SwitchId::Float).unwrap());
        clock.advance(Duration::from_secs(3));
        assert!(!switches.read_switch(SwitchId::Float).unwrap());
    }
}
