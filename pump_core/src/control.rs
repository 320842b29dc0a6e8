//! `ControlSystem`: the station context plus arbiter and supervisor, and
//! the builder that assembles it.

use std::sync::atomic::{AtomicBool, Ordering};

use crossbeam_channel::Receiver;
use eyre::WrapErr;
use pump_traits::{
    CharacterDisplay, Clock, CurrentSensor, MonotonicClock, PumpId, RelayBank, SwitchBank,
    TemperatureBus,
};
use tracing::{debug, info, warn};

use crate::arbiter::ModeArbiter;
use crate::config::{CurrentSensing, PumpSpec, TemperatureSensing, Timing};
use crate::display::Screen;
use crate::error::{BuildError, PumpError, Result};
use crate::events::ControlEvent;
use crate::pump::PumpUnit;
use crate::sensor::SensorReader;
use crate::station::{Io, Station};
use crate::supervisor::{FaultSupervisor, SupervisorMode};

/// Snapshot returned by every `tick()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    pub mode: SupervisorMode,
    /// Indexed by `PumpId::index()`.
    pub running: [bool; 2],
    pub cycle_count: u64,
}

impl TickReport {
    pub fn is_running(&self, id: PumpId) -> bool {
        self.running[id.index()]
    }
}

#[derive(Debug)]
pub struct ControlSystem {
    station: Station,
    arbiter: ModeArbiter,
    supervisor: FaultSupervisor,
}

impl ControlSystem {
    pub fn builder() -> ControlSystemBuilder {
        ControlSystemBuilder::default()
    }

    pub fn pump(&self, id: PumpId) -> &PumpUnit {
        self.station.pump(id)
    }

    pub fn arbiter(&self) -> &ModeArbiter {
        &self.arbiter
    }

    pub fn mode(&self) -> SupervisorMode {
        self.supervisor.mode()
    }

    /// Direct access to the station, for diagnostics.
    pub fn station_mut(&mut self) -> &mut Station {
        &mut self.station
    }

    /// Receive every `ControlEvent` from now on. A second call replaces the
    /// first subscriber.
    pub fn subscribe(&mut self) -> Receiver<ControlEvent> {
        self.station.events_mut().subscribe()
    }

    /// Power-on sequence: both relays off, settle, then the splash screens.
    pub fn start_up(&mut self) -> Result<()> {
        let st = &mut self.station;
        st.stop_all().wrap_err("de-energize relays at start-up")?;
        let timing = st.timing().clone();
        st.sleep_ms(timing.power_on_settle_ms);
        st.show(Screen::Starting).wrap_err("splash screen")?;
        st.sleep_ms(timing.splash_ms);
        st.show(Screen::Waiting).wrap_err("splash screen")?;
        st.sleep_ms(timing.splash_ms);
        info!("start-up complete");
        Ok(())
    }

    fn report(&self) -> TickReport {
        TickReport {
            mode: self.supervisor.mode(),
            running: PumpId::ALL.map(|id| self.station.pump(id).is_running()),
            cycle_count: self.arbiter.cycle_count(),
        }
    }

    fn tick_normal(&mut self) -> std::result::Result<(), PumpError> {
        if !self.arbiter.run_manual(&mut self.station)? {
            self.arbiter.run_automatic(&mut self.station)?;
        }
        for id in PumpId::ALL {
            if !self.station.pump(id).is_running() {
                continue;
            }
            match self.station.measure(id) {
                Ok(None) => {}
                Ok(Some(_)) => {
                    self.supervisor.escalate(&mut self.station)?;
                    break;
                }
                Err(e) => {
                    // a trip whose relay-off write failed still hands over control
                    if self.supervisor.is_behind(&self.station) {
                        let _ = self.supervisor.escalate(&mut self.station);
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }

    /// One loop iteration according to the supervisor mode.
    pub fn tick(&mut self) -> Result<TickReport> {
        if self.supervisor.is_behind(&self.station) {
            warn!("fault latch set outside supervision; escalating");
            self.supervisor
                .escalate(&mut self.station)
                .wrap_err("fault escalation")?;
        }
        match self.supervisor.mode() {
            SupervisorMode::Normal => self.tick_normal().wrap_err("normal tick")?,
            SupervisorMode::Degraded { .. } => self
                .supervisor
                .run_degraded(&mut self.arbiter, &mut self.station)
                .wrap_err("degraded tick")?,
            SupervisorMode::Halted => self
                .supervisor
                .run_halted(&mut self.station)
                .wrap_err("alarm tick")?,
        }
        let report = self.report();
        if report.mode != SupervisorMode::Halted && report.running == [false, false] {
            let idle = self.station.timing().idle_poll_ms;
            self.station.sleep_ms(idle);
        }
        debug!(mode = %report.mode, cycle = report.cycle_count, "tick");
        Ok(report)
    }

    /// `start_up()`, then `tick()` until `shutdown` is set or `max_ticks`
    /// iterations ran. Both pumps are stopped on the way out, also on error.
    /// Returns the number of completed ticks.
    pub fn run(&mut self, shutdown: &AtomicBool, max_ticks: Option<u64>) -> Result<u64> {
        let outcome = self.run_inner(shutdown, max_ticks);
        if let Err(e) = self.station.stop_all() {
            warn!(error = %e, "failed to stop pumps on exit");
        }
        outcome
    }

    fn run_inner(&mut self, shutdown: &AtomicBool, max_ticks: Option<u64>) -> Result<u64> {
        self.start_up()?;
        let mut ticks = 0u64;
        while !shutdown.load(Ordering::Relaxed) {
            if max_ticks.is_some_and(|max| ticks >= max) {
                break;
            }
            self.tick()?;
            ticks += 1;
        }
        info!(ticks, "control loop stopped");
        Ok(ticks)
    }

    /// Administrative reset of one pump's fault latch.
    pub fn reset_fault(&mut self, id: PumpId) -> SupervisorMode {
        self.station.reset_pump(id);
        self.supervisor.on_reset(&mut self.station)
    }

    /// Stop both pumps.
    pub fn shutdown(&mut self) -> Result<()> {
        self.station.stop_all().wrap_err("stop pumps")
    }
}

/// Builder for `ControlSystem`. Collaborators and both pumps are required;
/// everything else has defaults.
#[derive(Default)]
pub struct ControlSystemBuilder {
    pumps: [Option<PumpSpec>; 2],
    current: Option<Box<dyn CurrentSensor>>,
    temperature: Option<Box<dyn TemperatureBus>>,
    relays: Option<Box<dyn RelayBank>>,
    switches: Option<Box<dyn SwitchBank>>,
    display: Option<Box<dyn CharacterDisplay>>,
    current_sensing: Option<CurrentSensing>,
    temperature_sensing: Option<TemperatureSensing>,
    timing: Option<Timing>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
}

impl ControlSystemBuilder {
    pub fn with_pump(mut self, spec: PumpSpec) -> Self {
        let slot = spec.id.index();
        self.pumps[slot] = Some(spec);
        self
    }

    pub fn with_current_sensor(mut self, sensor: impl CurrentSensor + 'static) -> Self {
        self.current = Some(Box::new(sensor));
        self
    }

    pub fn with_temperature_bus(mut self, bus: impl TemperatureBus + 'static) -> Self {
        self.temperature = Some(Box::new(bus));
        self
    }

    pub fn with_relays(mut self, relays: impl RelayBank + 'static) -> Self {
        self.relays = Some(Box::new(relays));
        self
    }

    pub fn with_switches(mut self, switches: impl SwitchBank + 'static) -> Self {
        self.switches = Some(Box::new(switches));
        self
    }

    pub fn with_display(mut self, display: impl CharacterDisplay + 'static) -> Self {
        self.display = Some(Box::new(display));
        self
    }

    pub fn with_current_sensing(mut self, sensing: CurrentSensing) -> Self {
        self.current_sensing = Some(sensing);
        self
    }

    pub fn with_temperature_sensing(mut self, sensing: TemperatureSensing) -> Self {
        self.temperature_sensing = Some(sensing);
        self
    }

    pub fn with_timing(mut self, timing: Timing) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Take pumps, sensing and timing from a validated file config.
    pub fn with_config(mut self, cfg: &pump_config::Config) -> Result<Self> {
        for p in &cfg.pumps {
            let spec = PumpSpec::try_from(p).wrap_err("pump config")?;
            self = self.with_pump(spec);
        }
        Ok(self
            .with_current_sensing(CurrentSensing::from(&cfg.current_sensor))
            .with_temperature_sensing(TemperatureSensing::from(&cfg.temperature))
            .with_timing(Timing::from(&cfg.timing)))
    }

    pub fn build(self) -> Result<ControlSystem> {
        let [p1, p2] = self.pumps;
        let p1 = p1.ok_or_else(|| eyre::Report::new(BuildError::MissingPump(1)))?;
        let p2 = p2.ok_or_else(|| eyre::Report::new(BuildError::MissingPump(2)))?;
        let io = Io {
            current: self
                .current
                .ok_or_else(|| eyre::Report::new(BuildError::MissingCurrentSensor))?,
            temperature: self
                .temperature
                .ok_or_else(|| eyre::Report::new(BuildError::MissingTemperatureBus))?,
            relays: self
                .relays
                .ok_or_else(|| eyre::Report::new(BuildError::MissingRelays))?,
            switches: self
                .switches
                .ok_or_else(|| eyre::Report::new(BuildError::MissingSwitches))?,
            display: self
                .display
                .ok_or_else(|| eyre::Report::new(BuildError::MissingDisplay))?,
        };

        let current = self.current_sensing.unwrap_or_default();
        if current.samples == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "current samples must be >= 1",
            )));
        }
        if current.sensitivity_v_per_a <= 0.0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "current sensitivity must be > 0",
            )));
        }
        for spec in [&p1, &p2] {
            if spec.current_fault_a.is_nan() || spec.current_fault_a <= 0.0 {
                return Err(eyre::Report::new(BuildError::InvalidConfig(
                    "current fault threshold must be > 0",
                )));
            }
        }
        if p1.temperature_sensor == p2.temperature_sensor {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "pumps must use different temperature probes",
            )));
        }
        let timing = self.timing.unwrap_or_default();
        if timing.alarm_page_ms == 0 {
            return Err(eyre::Report::new(BuildError::InvalidConfig(
                "alarm_page_ms must be >= 1",
            )));
        }

        let clock = self
            .clock
            .unwrap_or_else(|| Box::new(MonotonicClock::new()));
        let sensors = SensorReader::new(current, self.temperature_sensing.unwrap_or_default());
        let station = Station::new(
            [PumpUnit::new(p1), PumpUnit::new(p2)],
            io,
            sensors,
            timing,
            clock,
        );
        Ok(ControlSystem {
            station,
            arbiter: ModeArbiter::new(),
            supervisor: FaultSupervisor::new(),
        })
    }
}
