//! Scriptable collaborators sharing one state cell, plus a `ManualClock`.
#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use pump_core::{ControlSystem, CurrentSensing, PumpSpec, Timing};
use pump_traits::{
    BoxError, CharacterDisplay, CurrentSensor, ManualClock, PumpId, RelayBank, SensorId,
    SwitchBank, SwitchId, TemperatureBus,
};

pub const WINDOW: u32 = 5;

pub fn probe(id: PumpId) -> SensorId {
    SensorId([0x28, id.number(), 0, 0, 0, 0, 0, 0])
}

pub struct RigState {
    pub manual: bool,
    pub select_pump1: bool,
    pub float: bool,
    pub relays: [bool; 2],
    pub relay_log: Vec<(PumpId, bool)>,
    /// Scripted amps, consumed one per sample before `base_amps` applies.
    pub scripted_amps: VecDeque<f32>,
    pub base_amps: f32,
    pub celsius: [f32; 2],
    pub temperature_fails: bool,
    pub current_fails: bool,
    pub relay_fails: bool,
    /// Fail only the off-write of this pump's relay.
    pub relay_off_fails: Option<PumpId>,
    pub lines: Vec<(String, String)>,
    pub raw_lines: Vec<(String, String)>,
}

impl Default for RigState {
    fn default() -> Self {
        Self {
            manual: false,
            select_pump1: false,
            float: false,
            relays: [false; 2],
            relay_log: Vec::new(),
            scripted_amps: VecDeque::new(),
            base_amps: 6.0,
            celsius: [30.0; 2],
            temperature_fails: false,
            current_fails: false,
            relay_fails: false,
            relay_off_fails: None,
            lines: Vec::new(),
            raw_lines: Vec::new(),
        }
    }
}

#[derive(Clone)]
pub struct Rig {
    pub state: Rc<RefCell<RigState>>,
    pub clock: ManualClock,
}

struct Current(Rc<RefCell<RigState>>, CurrentSensing);
impl CurrentSensor for Current {
    fn read_raw_sample(&mut self) -> Result<u16, BoxError> {
        let mut st = self.0.borrow_mut();
        if st.current_fails {
            return Err("adc: spi transfer timed out".into());
        }
        let next = st.scripted_amps.pop_front();
        let amps = match next {
            Some(a) => a,
            None if st.relays.iter().any(|on| *on) => st.base_amps,
            None => 0.0,
        };
        Ok(self.1.to_raw(amps))
    }
}

struct Temps(Rc<RefCell<RigState>>);
impl TemperatureBus for Temps {
    fn start_conversion(&mut self) -> Result<(), BoxError> {
        if self.0.borrow().temperature_fails {
            return Err("one-wire bus: no presence pulse".into());
        }
        Ok(())
    }
    fn read_celsius(&mut self, sensor: &SensorId) -> Result<f32, BoxError> {
        let st = self.0.borrow();
        match sensor.0[1] {
            1 => Ok(st.celsius[0]),
            2 => Ok(st.celsius[1]),
            _ => Err(format!("unknown probe {sensor}").into()),
        }
    }
}

struct Relays(Rc<RefCell<RigState>>);
impl RelayBank for Relays {
    fn set_relay(&mut self, pump: PumpId, on: bool) -> Result<(), BoxError> {
        let mut st = self.0.borrow_mut();
        if st.relay_fails {
            return Err("relay driver offline".into());
        }
        if !on && st.relay_off_fails == Some(pump) {
            return Err("relay contact welded".into());
        }
        st.relays[pump.index()] = on;
        st.relay_log.push((pump, on));
        Ok(())
    }
}

struct Switches(Rc<RefCell<RigState>>);
impl SwitchBank for Switches {
    fn read_switch(&mut self, id: SwitchId) -> Result<bool, BoxError> {
        let st = self.0.borrow();
        Ok(match id {
            SwitchId::Manual => st.manual,
            SwitchId::PumpSelect => st.select_pump1,
            SwitchId::Float => st.float,
        })
    }
}

struct Lcd(Rc<RefCell<RigState>>);
impl CharacterDisplay for Lcd {
    fn show_lines(&mut self, l1: &str, l2: &str) -> Result<(), BoxError> {
        let mut st = self.0.borrow_mut();
        st.raw_lines.push((l1.to_owned(), l2.to_owned()));
        st.lines.push((l1.trim().to_owned(), l2.trim().to_owned()));
        Ok(())
    }
}

impl Rig {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(RigState::default())),
            clock: ManualClock::new(),
        }
    }

    pub fn sensing() -> CurrentSensing {
        CurrentSensing {
            samples: WINDOW,
            ..CurrentSensing::default()
        }
    }

    /// A system on this rig with zero delays and a short sampling window.
    pub fn system(&self) -> ControlSystem {
        self.system_with(Timing::immediate())
    }

    pub fn system_with(&self, timing: Timing) -> ControlSystem {
        ControlSystem::builder()
            .with_pump(PumpSpec::new(PumpId::One, probe(PumpId::One), 13.0))
            .with_pump(PumpSpec::new(PumpId::Two, probe(PumpId::Two), 13.0))
            .with_current_sensor(Current(self.state.clone(), Self::sensing()))
            .with_temperature_bus(Temps(self.state.clone()))
            .with_relays(Relays(self.state.clone()))
            .with_switches(Switches(self.state.clone()))
            .with_display(Lcd(self.state.clone()))
            .with_current_sensing(Self::sensing())
            .with_timing(timing)
            .with_clock(Box::new(self.clock.clone()))
            .build()
            .expect("rig system builds")
    }

    pub fn set_manual(&self, on: bool, select_pump1: bool) {
        let mut st = self.state.borrow_mut();
        st.manual = on;
        st.select_pump1 = select_pump1;
    }

    pub fn set_float(&self, on: bool) {
        self.state.borrow_mut().float = on;
    }

    pub fn set_celsius(&self, pump: PumpId, c: f32) {
        self.state.borrow_mut().celsius[pump.index()] = c;
    }

    pub fn script_amps(&self, samples: &[f32]) {
        self.state.borrow_mut().scripted_amps.extend(samples.iter().copied());
    }

    pub fn relays(&self) -> [bool; 2] {
        self.state.borrow().relays
    }

    pub fn last_screen(&self) -> Option<(String, String)> {
        self.state.borrow().lines.last().cloned()
    }

    pub fn screen(l1: &str, l2: &str) -> Option<(String, String)> {
        Some((l1.to_owned(), l2.to_owned()))
    }

    /// Trip pump 1 on over-current in a manual tick; leaves the system
    /// degraded on pump 2 with the manual switch off and the float low.
    pub fn trip_pump1(&self, sys: &mut ControlSystem) {
        self.set_manual(true, true);
        self.script_amps(&[20.0; WINDOW as usize]);
        sys.tick().expect("tick");
        assert!(sys.pump(PumpId::One).is_faulted());
        self.set_manual(false, true);
        self.set_float(false);
    }
}
