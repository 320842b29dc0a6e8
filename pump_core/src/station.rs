//! Shared context of the control loop: both pump units, the collaborators,
//! the presenter, timing, clock and event sink.
//!
//! `ModeArbiter` and `FaultSupervisor` hold only their own state and act on
//! the station through the methods here.

use std::time::Duration;

use pump_traits::{
    CharacterDisplay, Clock, CurrentSensor, PumpId, RelayBank, SwitchBank, SwitchId,
    TemperatureBus,
};
use tracing::{info, warn};

use crate::config::Timing;
use crate::display::{DisplayPresenter, OperatingMode, Screen};
use crate::error::{FaultCause, PumpError};
use crate::events::{ControlEvent, EventSink};
use crate::hw_error::map_hw_error;
use crate::pump::{Measurement, PumpUnit};
use crate::sensor::SensorReader;

/// Collaborators behind the trait boundary.
pub struct Io {
    pub current: Box<dyn CurrentSensor>,
    pub temperature: Box<dyn TemperatureBus>,
    pub relays: Box<dyn RelayBank>,
    pub switches: Box<dyn SwitchBank>,
    pub display: Box<dyn CharacterDisplay>,
}

pub struct Station {
    pumps: [PumpUnit; 2],
    io: Io,
    sensors: SensorReader,
    presenter: DisplayPresenter,
    timing: Timing,
    clock: Box<dyn Clock + Send + Sync>,
    events: EventSink,
}

impl core::fmt::Debug for Station {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Station")
            .field("pumps", &self.pumps)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

impl Station {
    pub(crate) fn new(
        pumps: [PumpUnit; 2],
        io: Io,
        sensors: SensorReader,
        timing: Timing,
        clock: Box<dyn Clock + Send + Sync>,
    ) -> Self {
        let presenter = DisplayPresenter::new(io.display.width());
        Self {
            pumps,
            io,
            sensors,
            presenter,
            timing,
            clock,
            events: EventSink::default(),
        }
    }

    pub fn pump(&self, id: PumpId) -> &PumpUnit {
        &self.pumps[id.index()]
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    pub fn events_mut(&mut self) -> &mut EventSink {
        &mut self.events
    }

    pub fn emit(&self, event: ControlEvent) {
        self.events.emit(event);
    }

    pub fn sleep_ms(&self, ms: u64) {
        self.clock.sleep(Duration::from_millis(ms));
    }

    pub fn read_switch(&mut self, id: SwitchId) -> Result<bool, PumpError> {
        self.io
            .switches
            .read_switch(id)
            .map_err(|e| map_hw_error(&format!("{} switch read", id.name()), &*e))
    }

    pub fn show(&mut self, screen: Screen) -> Result<(), PumpError> {
        self.presenter.show(&screen, &mut *self.io.display)?;
        Ok(())
    }

    pub fn invalidate_display(&mut self) {
        self.presenter.invalidate();
    }

    /// Start `id`. A latched fault is not an error here: the refusal is
    /// logged and published and `Ok(false)` is returned.
    pub fn start_pump(&mut self, id: PumpId) -> Result<bool, PumpError> {
        let unit = &mut self.pumps[id.index()];
        let was_running = unit.is_running();
        match unit.start(&mut *self.io.relays) {
            Ok(()) => {
                if !was_running {
                    self.events.emit(ControlEvent::PumpStarted(id));
                }
                Ok(true)
            }
            Err(e @ PumpError::InvalidState(_)) => {
                warn!(pump = id.number(), error = %e, "start refused");
                self.events.emit(ControlEvent::StartRefused(id));
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub fn stop_pump(&mut self, id: PumpId) -> Result<(), PumpError> {
        let unit = &mut self.pumps[id.index()];
        let was_running = unit.is_running();
        unit.stop(&mut *self.io.relays)?;
        if was_running {
            self.events.emit(ControlEvent::PumpStopped(id));
        }
        Ok(())
    }

    /// Stop both pumps. Both relays are attempted; the first error wins.
    pub fn stop_all(&mut self) -> Result<(), PumpError> {
        let first = self.stop_pump(PumpId::One);
        let second = self.stop_pump(PumpId::Two);
        first.and(second)
    }

    /// Interlocked changeover: stop the other pump, wait the interlock delay,
    /// start `id` and show the status screen. No delay is spent when `id` is
    /// already running or is latched faulted.
    pub fn switch_to(&mut self, id: PumpId, mode: OperatingMode) -> Result<bool, PumpError> {
        self.stop_pump(id.other())?;
        let unit = self.pump(id);
        if !unit.is_running() && !unit.is_faulted() {
            self.sleep_ms(self.timing.interlock_ms);
        }
        let started = self.start_pump(id)?;
        let screen = if started {
            Screen::Running { mode, pump: id }
        } else {
            Screen::StartRefused { mode, pump: id }
        };
        self.show(screen)?;
        Ok(started)
    }

    /// Measure current then temperature of a running pump.
    ///
    /// Returns the cause if the pump tripped; the temperature is not read
    /// after a current trip. When the pump stays healthy the readings screen
    /// is shown between two hold periods.
    pub fn measure(&mut self, id: PumpId) -> Result<Option<FaultCause>, PumpError> {
        let pump = id.number();
        let unit = &mut self.pumps[id.index()];

        match unit.measure_current(
            &self.sensors,
            &mut *self.io.current,
            &mut *self.io.relays,
            &*self.clock,
        ) {
            Ok(Measurement::Stored(amps)) => {
                info!(pump, amps, "current reading");
                self.events.emit(ControlEvent::CurrentReading { pump: id, amps });
            }
            Ok(Measurement::Tripped(cause)) => {
                self.events.emit(ControlEvent::Faulted { pump: id, cause });
                return Ok(Some(cause));
            }
            Err(e) if e.is_recoverable() => {
                warn!(pump, error = %e, "current reading skipped");
                self.events.emit(ControlEvent::SensorError {
                    pump: Some(id),
                    error: e,
                });
            }
            Err(e) => return Err(e),
        }

        match unit.measure_temperature(
            &self.sensors,
            &mut *self.io.temperature,
            &mut *self.io.relays,
            &*self.clock,
        ) {
            Ok(Measurement::Stored(celsius)) => {
                info!(pump, celsius, "temperature reading");
                self.events
                    .emit(ControlEvent::TemperatureReading { pump: id, celsius });
            }
            Ok(Measurement::Tripped(cause)) => {
                self.events.emit(ControlEvent::Faulted { pump: id, cause });
                return Ok(Some(cause));
            }
            Err(e) if e.is_recoverable() => {
                warn!(pump, error = %e, "temperature reading skipped");
                self.events.emit(ControlEvent::SensorError {
                    pump: Some(id),
                    error: e,
                });
            }
            Err(e) => return Err(e),
        }

        let screen = Screen::Readings {
            pump: id,
            amps: unit.last_current(),
            celsius: unit.last_temperature(),
        };
        self.sleep_ms(self.timing.reading_hold_ms);
        self.show(screen)?;
        self.sleep_ms(self.timing.reading_hold_ms);
        Ok(None)
    }

    pub(crate) fn reset_pump(&mut self, id: PumpId) {
        let unit = &mut self.pumps[id.index()];
        if unit.is_faulted() {
            unit.reset_fault();
            self.events.emit(ControlEvent::FaultReset(id));
        }
    }

    /// Read every switch once, in `SwitchId::ALL` order.
    pub fn read_all_switches(&mut self) -> Result<[(SwitchId, bool); 3], PumpError> {
        let mut out = SwitchId::ALL.map(|id| (id, false));
        for (id, level) in out.iter_mut() {
            *level = self.read_switch(*id)?;
        }
        Ok(out)
    }

    /// One current window and one probe read per pump, without trip checks.
    /// Used by the CLI self-check.
    pub fn probe_sensors(&mut self) -> [(PumpId, Result<f32, PumpError>, Result<i32, PumpError>); 2] {
        PumpId::ALL.map(|id| {
            let amps = self
                .sensors
                .peak_current(&mut *self.io.current, &*self.clock)
                .map_err(|e| crate::hw_error::sensor_error(id, &*e));
            let sensor = self.pumps[id.index()].spec().temperature_sensor.clone();
            let celsius = self
                .sensors
                .temperature(&mut *self.io.temperature, &sensor, &*self.clock)
                .map_err(|e| crate::hw_error::sensor_error(id, &*e));
            (id, amps, celsius)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PumpSpec;
    use pump_traits::{BoxError, ManualClock, SensorId};
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Log {
        relays: Vec<(PumpId, bool)>,
        lines: Vec<(String, String)>,
    }

    struct Relays(Rc<RefCell<Log>>);
    impl RelayBank for Relays {
        fn set_relay(&mut self, pump: PumpId, on: bool) -> Result<(), BoxError> {
            self.0.borrow_mut().relays.push((pump, on));
            Ok(())
        }
    }
    struct Lcd(Rc<RefCell<Log>>);
    impl CharacterDisplay for Lcd {
        fn show_lines(&mut self, l1: &str, l2: &str) -> Result<(), BoxError> {
            self.0
                .borrow_mut()
                .lines
                .push((l1.trim().to_owned(), l2.trim().to_owned()));
            Ok(())
        }
    }
    struct Idle;
    impl CurrentSensor for Idle {
        fn read_raw_sample(&mut self) -> Result<u16, BoxError> {
            Ok(32768)
        }
    }
    impl TemperatureBus for Idle {
        fn start_conversion(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
        fn read_celsius(&mut self, _sensor: &SensorId) -> Result<f32, BoxError> {
            Ok(25.0)
        }
    }
    impl SwitchBank for Idle {
        fn read_switch(&mut self, _id: SwitchId) -> Result<bool, BoxError> {
            Ok(false)
        }
    }

    fn station() -> (Station, Rc<RefCell<Log>>, ManualClock) {
        let log = Rc::new(RefCell::new(Log::default()));
        let clock = ManualClock::new();
        let spec = |id| PumpSpec::new(id, SensorId([0x28, id.number(), 0, 0, 0, 0, 0, 0]), 13.0);
        let io = Io {
            current: Box::new(Idle),
            temperature: Box::new(Idle),
            relays: Box::new(Relays(log.clone())),
            switches: Box::new(Idle),
            display: Box::new(Lcd(log.clone())),
        };
        let st = Station::new(
            [PumpUnit::new(spec(PumpId::One)), PumpUnit::new(spec(PumpId::Two))],
            io,
            SensorReader::default(),
            Timing::default(),
            Box::new(clock.clone()),
        );
        (st, log, clock)
    }

    #[test]
    fn switch_to_spends_interlock_only_on_changeover() {
        let (mut st, log, clock) = station();
        assert!(st.switch_to(PumpId::One, OperatingMode::Manual).unwrap());
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
        assert!(st.switch_to(PumpId::One, OperatingMode::Manual).unwrap());
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));

        // stop-before-start ordering on the relays
        let log = log.borrow();
        assert_eq!(log.relays[0], (PumpId::Two, false));
        assert_eq!(log.relays[1], (PumpId::One, true));
    }

    #[test]
    fn faulted_selection_shows_refusal_without_delay() {
        let (mut st, log, clock) = station();
        st.pumps[1]
            .fault(
                FaultCause::OverCurrent {
                    amps: 14.0,
                    limit: 13.0,
                },
                &mut *st.io.relays,
            )
            .unwrap();
        let rx = st.events_mut().subscribe();
        assert!(!st.switch_to(PumpId::Two, OperatingMode::Auto).unwrap());
        assert_eq!(clock.elapsed(), Duration::ZERO);
        assert_eq!(
            log.borrow().lines.last().cloned(),
            Some(("Mode: Auto".to_owned(), "Pump 2: FAULT".to_owned()))
        );
        assert!(rx.try_iter().any(|e| e == ControlEvent::StartRefused(PumpId::Two)));
    }

    #[test]
    fn healthy_measure_holds_shows_readings_and_holds() {
        let (mut st, log, clock) = station();
        st.start_pump(PumpId::One).unwrap();
        assert_eq!(st.measure(PumpId::One).unwrap(), None);
        // 1 s window + 1 s settle + 2 x 2 s hold
        assert_eq!(clock.elapsed(), Duration::from_secs(6));
        assert_eq!(
            log.borrow().lines.last().cloned(),
            Some(("I P1: 0.0 A".to_owned(), "Temp P1: 25 C".to_owned()))
        );
    }
}
