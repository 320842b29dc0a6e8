//! Manual/automatic arbitration and pump alternation.
//!
//! Alternation is a pure function of the number of rising edges seen on the
//! float switch: an even count selects pump 1, an odd count pump 2.

use pump_traits::{PumpId, SwitchId};
use tracing::{debug, info};

use crate::display::{OperatingMode, Screen};
use crate::error::PumpError;
use crate::events::ControlEvent;
use crate::station::Station;

#[derive(Debug, Clone, Default)]
pub struct ModeArbiter {
    cycle_count: u64,
    previous_float: bool,
}

impl ModeArbiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rising edges of the float switch seen so far.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    /// Feed one level read of the float switch. Returns true on a low-to-high
    /// transition, which also increments the cycle count.
    pub fn observe_float(&mut self, level: bool) -> bool {
        let rising = level && !self.previous_float;
        if rising {
            self.cycle_count += 1;
        }
        self.previous_float = level;
        rising
    }

    /// Pump designated by the current cycle parity.
    pub fn automatic_pump(&self) -> PumpId {
        if self.cycle_count % 2 == 0 {
            PumpId::One
        } else {
            PumpId::Two
        }
    }

    pub fn is_manual_mode(&self, station: &mut Station) -> Result<bool, PumpError> {
        station.read_switch(SwitchId::Manual)
    }

    /// Read the float switch, counting a new cycle on a rising edge.
    pub fn is_float_active(&mut self, station: &mut Station) -> Result<bool, PumpError> {
        let level = station.read_switch(SwitchId::Float)?;
        if self.observe_float(level) {
            info!(cycle = self.cycle_count, "float rising edge");
            station.emit(ControlEvent::CycleStarted {
                cycle: self.cycle_count,
            });
        }
        Ok(level)
    }

    /// Selector high selects pump 1.
    pub fn select_manual_pump(&self, station: &mut Station) -> Result<PumpId, PumpError> {
        Ok(if station.read_switch(SwitchId::PumpSelect)? {
            PumpId::One
        } else {
            PumpId::Two
        })
    }

    /// Run the selected pump if the manual switch is on. Returns whether
    /// manual mode handled this tick.
    pub fn run_manual(&mut self, station: &mut Station) -> Result<bool, PumpError> {
        if !self.is_manual_mode(station)? {
            return Ok(false);
        }
        let pump = self.select_manual_pump(station)?;
        debug!(pump = pump.number(), "manual selection");
        station.switch_to(pump, OperatingMode::Manual)?;
        Ok(true)
    }

    /// Follow the float switch when not in manual mode. Returns false (and
    /// touches nothing) if the manual switch is on.
    pub fn run_automatic(&mut self, station: &mut Station) -> Result<bool, PumpError> {
        if self.is_manual_mode(station)? {
            return Ok(false);
        }
        if self.is_float_active(station)? {
            let pump = self.automatic_pump();
            debug!(pump = pump.number(), cycle = self.cycle_count, "automatic selection");
            station.switch_to(pump, OperatingMode::Auto)?;
        } else {
            station.stop_all()?;
            station.show(Screen::Waiting)?;
        }
        Ok(true)
    }
}
