//! Fault escalation: failover to the healthy pump, halt on a dual fault.

use std::fmt;

use pump_traits::PumpId;
use tracing::{error, info, warn};

use crate::arbiter::ModeArbiter;
use crate::display::{AlarmPage, OperatingMode, Screen};
use crate::error::PumpError;
use crate::events::ControlEvent;
use crate::station::Station;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorMode {
    /// No latched faults; the arbiter drives both pumps.
    Normal,
    /// One pump latched; the healthy one follows the float switch alone.
    Degraded { healthy: PumpId },
    /// Both latched. Terminal until an administrative reset.
    Halted,
}

impl fmt::Display for SupervisorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SupervisorMode::Normal => f.write_str("normal"),
            SupervisorMode::Degraded { healthy } => write!(f, "degraded (pump {healthy} only)"),
            SupervisorMode::Halted => f.write_str("halted"),
        }
    }
}

#[derive(Debug)]
pub struct FaultSupervisor {
    mode: SupervisorMode,
    page: AlarmPage,
}

impl Default for FaultSupervisor {
    fn default() -> Self {
        Self {
            mode: SupervisorMode::Normal,
            page: AlarmPage::default(),
        }
    }
}

impl FaultSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> SupervisorMode {
        self.mode
    }

    /// Mode implied by the fault latches.
    pub fn derive_mode(station: &Station) -> SupervisorMode {
        match (
            station.pump(PumpId::One).is_faulted(),
            station.pump(PumpId::Two).is_faulted(),
        ) {
            (true, true) => SupervisorMode::Halted,
            (true, false) => SupervisorMode::Degraded {
                healthy: PumpId::Two,
            },
            (false, true) => SupervisorMode::Degraded {
                healthy: PumpId::One,
            },
            (false, false) => SupervisorMode::Normal,
        }
    }

    fn set_mode(&mut self, mode: SupervisorMode, station: &mut Station) {
        if mode == self.mode {
            return;
        }
        match mode {
            SupervisorMode::Halted => error!(from = %self.mode, "both pumps faulted; halting"),
            SupervisorMode::Degraded { healthy } => {
                warn!(from = %self.mode, healthy = healthy.number(), "running degraded")
            }
            SupervisorMode::Normal => info!(from = %self.mode, "back to normal operation"),
        }
        self.mode = mode;
        self.page = AlarmPage::default();
        station.emit(ControlEvent::ModeChanged(mode));
    }

    /// Called after a pump's fault latch was observed to flip.
    ///
    /// The mode follows the latches even if stopping a relay fails; the relay
    /// error is returned afterwards.
    pub fn escalate(&mut self, station: &mut Station) -> Result<SupervisorMode, PumpError> {
        let mode = Self::derive_mode(station);
        let stopped = match mode {
            SupervisorMode::Halted => station.stop_all(),
            SupervisorMode::Degraded { healthy } => station.stop_pump(healthy.other()),
            SupervisorMode::Normal => Ok(()),
        };
        self.set_mode(mode, station);
        stopped.map(|()| self.mode)
    }

    /// True when a latch is set that the current mode does not account for,
    /// e.g. after a fault whose relay-off write failed mid-tick.
    pub fn is_behind(&self, station: &Station) -> bool {
        self.mode == SupervisorMode::Normal && Self::derive_mode(station) != SupervisorMode::Normal
    }

    /// One iteration of the single-fault policy. Only the float switch is
    /// consulted; a secondary fault escalates to `Halted`.
    pub fn run_degraded(
        &mut self,
        arbiter: &mut ModeArbiter,
        station: &mut Station,
    ) -> Result<(), PumpError> {
        let SupervisorMode::Degraded { healthy } = self.mode else {
            return Ok(());
        };
        if !arbiter.is_float_active(station)? {
            station.stop_pump(healthy)?;
            station.show(Screen::Waiting)?;
            return Ok(());
        }
        if station.pump(healthy).is_faulted() {
            self.escalate(station)?;
            return Ok(());
        }
        station.start_pump(healthy)?;
        station.show(Screen::Running {
            mode: OperatingMode::Auto,
            pump: healthy,
        })?;
        if station.measure(healthy)?.is_some() {
            self.escalate(station)?;
        }
        Ok(())
    }

    /// Show the current alarm page for one page period, then flip pages.
    pub fn run_halted(&mut self, station: &mut Station) -> Result<(), PumpError> {
        if self.mode != SupervisorMode::Halted {
            return Ok(());
        }
        station.show(Screen::DualFault(self.page))?;
        station.sleep_ms(station.timing().alarm_page_ms);
        self.page = self.page.next();
        Ok(())
    }

    /// Re-derive the mode after an administrative reset of a latch.
    pub fn on_reset(&mut self, station: &mut Station) -> SupervisorMode {
        let mode = Self::derive_mode(station);
        if self.mode == SupervisorMode::Halted && mode != SupervisorMode::Halted {
            station.invalidate_display();
        }
        self.set_mode(mode, station);
        self.mode
    }
}
