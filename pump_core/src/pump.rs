//! One controlled pump: relay state, fault latch and last readings.
//!
//! State machine:
//!
//! ```text
//!   Idle --start--> Running --stop--> Idle
//!   Idle|Running --fault--> Faulted --reset_fault--> Idle
//! ```
//!
//! `Faulted` has no automatic exit and `start()` refuses while latched.

use std::fmt;

use pump_traits::{Clock, CurrentSensor, PumpId, RelayBank, TemperatureBus};
use tracing::{error, info};

use crate::config::PumpSpec;
use crate::error::{FaultCause, PumpError};
use crate::hw_error::{map_hw_error, sensor_error};
use crate::sensor::SensorReader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpState {
    Idle,
    Running,
    Faulted,
}

/// Outcome of a successful sensor read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Measurement<T> {
    /// Below the trip limit; stored as the last reading.
    Stored(T),
    /// At or above the limit; the pump is now latched faulted.
    Tripped(FaultCause),
}

impl<T> Measurement<T> {
    pub fn is_tripped(&self) -> bool {
        matches!(self, Measurement::Tripped(_))
    }
}

#[derive(Debug)]
pub struct PumpUnit {
    spec: PumpSpec,
    running: bool,
    faulted: bool,
    fault_cause: Option<FaultCause>,
    last_current: f32,
    last_temperature: i32,
}

impl PumpUnit {
    pub fn new(spec: PumpSpec) -> Self {
        Self {
            spec,
            running: false,
            faulted: false,
            fault_cause: None,
            last_current: 0.0,
            last_temperature: 0,
        }
    }

    pub fn id(&self) -> PumpId {
        self.spec.id
    }

    pub fn spec(&self) -> &PumpSpec {
        &self.spec
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_faulted(&self) -> bool {
        self.faulted
    }

    pub fn fault_cause(&self) -> Option<FaultCause> {
        self.fault_cause
    }

    /// Last stored peak current in amps.
    pub fn last_current(&self) -> f32 {
        self.last_current
    }

    /// Last stored probe temperature in whole degrees Celsius.
    pub fn last_temperature(&self) -> i32 {
        self.last_temperature
    }

    pub fn state(&self) -> PumpState {
        if self.faulted {
            PumpState::Faulted
        } else if self.running {
            PumpState::Running
        } else {
            PumpState::Idle
        }
    }

    /// Energize the relay. Refused while the fault latch is set.
    pub fn start(&mut self, relays: &mut dyn RelayBank) -> Result<(), PumpError> {
        if self.faulted {
            return Err(PumpError::InvalidState(format!(
                "pump {} is faulted; reset required before start",
                self.spec.id
            )));
        }
        relays
            .set_relay(self.spec.id, true)
            .map_err(|e| map_hw_error("relay on", &*e))?;
        if !self.running {
            info!(pump = self.spec.id.number(), "pump start");
        }
        self.running = true;
        Ok(())
    }

    /// De-energize the relay.
    pub fn stop(&mut self, relays: &mut dyn RelayBank) -> Result<(), PumpError> {
        relays
            .set_relay(self.spec.id, false)
            .map_err(|e| map_hw_error("relay off", &*e))?;
        if self.running {
            info!(pump = self.spec.id.number(), "pump stop");
        }
        self.running = false;
        Ok(())
    }

    /// Force a stop and latch the fault.
    ///
    /// The latch is set even when the relay write fails, so the controller
    /// never tries to start this pump again; the relay error is still returned.
    pub fn fault(&mut self, cause: FaultCause, relays: &mut dyn RelayBank) -> Result<(), PumpError> {
        let stopped = self.stop(relays);
        self.running = false;
        if !self.faulted {
            error!(pump = self.spec.id.number(), cause = %cause, "pump fault latched");
            self.fault_cause = Some(cause);
        }
        self.faulted = true;
        stopped
    }

    /// Administrative reset of the fault latch. The relay stays off until the
    /// next `start()`.
    pub fn reset_fault(&mut self) {
        if self.faulted {
            info!(pump = self.spec.id.number(), "fault latch reset");
        }
        self.faulted = false;
        self.fault_cause = None;
    }

    fn check_current(&self, amps: f32) -> Result<f32, PumpError> {
        if amps >= self.spec.current_fault_a {
            return Err(PumpError::ThresholdExceeded {
                pump: self.spec.id,
                cause: FaultCause::OverCurrent {
                    amps,
                    limit: self.spec.current_fault_a,
                },
            });
        }
        Ok(amps)
    }

    fn check_temperature(&self, celsius: i32) -> Result<i32, PumpError> {
        if celsius >= self.spec.temperature_fault_c {
            return Err(PumpError::ThresholdExceeded {
                pump: self.spec.id,
                cause: FaultCause::OverTemperature {
                    celsius,
                    limit: self.spec.temperature_fault_c,
                },
            });
        }
        Ok(celsius)
    }

    /// Sample the current window and compare its peak with the trip limit.
    ///
    /// Returns `SensorCommunication` if the transducer could not be read; the
    /// previous reading is kept and the pump keeps its state.
    pub fn measure_current(
        &mut self,
        reader: &SensorReader,
        sensor: &mut dyn CurrentSensor,
        relays: &mut dyn RelayBank,
        clock: &dyn Clock,
    ) -> Result<Measurement<f32>, PumpError> {
        let peak = reader
            .peak_current(sensor, clock)
            .map_err(|e| sensor_error(self.spec.id, &*e))?;
        match self.check_current(peak) {
            Ok(amps) => {
                self.last_current = amps;
                Ok(Measurement::Stored(amps))
            }
            Err(PumpError::ThresholdExceeded { cause, .. }) => {
                self.fault(cause, relays)?;
                Ok(Measurement::Tripped(cause))
            }
            Err(other) => Err(other),
        }
    }

    /// Convert, settle and read this pump's probe, then compare with the limit.
    pub fn measure_temperature(
        &mut self,
        reader: &SensorReader,
        bus: &mut dyn TemperatureBus,
        relays: &mut dyn RelayBank,
        clock: &dyn Clock,
    ) -> Result<Measurement<i32>, PumpError> {
        let celsius = reader
            .temperature(bus, &self.spec.temperature_sensor, clock)
            .map_err(|e| sensor_error(self.spec.id, &*e))?;
        match self.check_temperature(celsius) {
            Ok(c) => {
                self.last_temperature = c;
                Ok(Measurement::Stored(c))
            }
            Err(PumpError::ThresholdExceeded { cause, .. }) => {
                self.fault(cause, relays)?;
                Ok(Measurement::Tripped(cause))
            }
            Err(other) => Err(other),
        }
    }
}

impl fmt::Display for PumpUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Pump {}: {} V, {:.1} A rated, {:.1} HP",
            self.spec.id,
            self.spec.rated_voltage_v,
            self.spec.rated_current_a,
            self.spec.rated_power_hp
        )
    }
}
