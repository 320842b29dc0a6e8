#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the pump station controller.
//!
//! `load_file` reads, deserializes and validates in one step.
//! Only `[pins]` and the two `[[pumps]]` tables are mandatory; every other
//! section falls back to the values of the reference installation.
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub relay_pump1: u8,
    pub relay_pump2: u8,
    /// Relay boards driven high-to-energize (true) or low-to-energize (false).
    #[serde(default = "default_true")]
    pub relay_active_high: bool,
    pub manual_switch: u8,
    pub pump_select_switch: u8,
    pub float_switch: u8,
}

fn default_true() -> bool {
    true
}

fn default_temperature_fault_c() -> i32 {
    70
}

fn default_rated_voltage_v() -> u32 {
    380
}

#[derive(Debug, Deserialize, Clone)]
pub struct PumpCfg {
    /// 1 or 2
    pub id: u8,
    /// DS18B20 ROM code, 16 hex digits (e.g. "280bb575d0013c92")
    pub temperature_sensor: String,
    /// Trip when the window peak reaches this many amps
    pub current_fault_a: f32,
    /// Trip when the probe reaches this many degrees Celsius
    #[serde(default = "default_temperature_fault_c")]
    pub temperature_fault_c: i32,
    /// Nameplate data (informational)
    #[serde(default = "default_rated_voltage_v")]
    pub rated_voltage_v: u32,
    #[serde(default)]
    pub rated_current_a: f32,
    #[serde(default)]
    pub rated_power_hp: f32,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CurrentSensorCfg {
    /// Samples per measurement window
    pub samples: u32,
    /// Spacing between samples (ms)
    pub sample_interval_ms: u64,
    /// ADC reference voltage
    pub adc_reference_v: f32,
    /// Transducer output at zero current
    pub midpoint_v: f32,
    /// Transducer gain (V per A); 0.066 for an ACS712-30A
    pub sensitivity_v_per_a: f32,
    /// MCP3008 channel (hardware backend)
    pub adc_channel: u8,
    pub spi_clock_hz: u32,
}

impl Default for CurrentSensorCfg {
    fn default() -> Self {
        Self {
            samples: 1000,
            sample_interval_ms: 1,
            adc_reference_v: 3.3,
            midpoint_v: 1.65,
            sensitivity_v_per_a: 0.066,
            adc_channel: 0,
            spi_clock_hz: 1_000_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TemperatureCfg {
    /// Wait between starting a conversion and reading it (ms)
    pub settle_ms: u64,
    /// sysfs root of the one-wire bus (hardware backend)
    pub w1_root: String,
}

impl Default for TemperatureCfg {
    fn default() -> Self {
        Self {
            settle_ms: 1000,
            w1_root: "/sys/bus/w1/devices".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    /// Pause between stopping one pump and starting the other
    pub interlock_ms: u64,
    /// Hold before and after the readings screen
    pub reading_hold_ms: u64,
    /// Duration of each dual-fault alarm page
    pub alarm_page_ms: u64,
    /// Wait after power-on before touching the relays
    pub power_on_settle_ms: u64,
    /// Duration of each start-up splash screen
    pub splash_ms: u64,
    /// Minimum loop period when nothing blocks (also the float debounce granularity)
    pub idle_poll_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            interlock_ms: 1000,
            reading_hold_ms: 2000,
            alarm_page_ms: 5000,
            power_on_settle_ms: 2000,
            splash_ms: 3000,
            idle_poll_ms: 50,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DisplayCfg {
    pub width: usize,
    /// PCF8574 backpack address (hardware backend)
    pub i2c_address: u16,
}

impl Default for DisplayCfg {
    fn default() -> Self {
        Self {
            width: 16,
            i2c_address: 0x27,
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    /// JSON-lines log file; console only when unset.
    pub file: Option<String>,
    /// Filter directive used when neither `RUST_LOG` nor `--log-level` is given.
    pub level: Option<String>,
    /// `never`, `daily` or `hourly`. Unset means never.
    pub rotation: Option<String>,
}

/// Parameters of the simulated station used when built without `hardware`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct SimulationCfg {
    pub initial_level: f32,
    pub inflow_per_s: f32,
    pub outflow_per_s: f32,
    pub float_on_level: f32,
    pub float_off_level: f32,
    pub running_amps: [f32; 2],
    pub ambient_c: f32,
    pub running_rise_c: f32,
    pub manual: bool,
    pub pump_select: bool,
    pub temperature_bus_fails: bool,
}

impl Default for SimulationCfg {
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
            manual: false,
            pump_select: true,
            temperature_bus_fails: false,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    pub pumps: Vec<PumpCfg>,
    #[serde(default)]
    pub current_sensor: CurrentSensorCfg,
    #[serde(default)]
    pub temperature: TemperatureCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub display: DisplayCfg,
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub simulation: SimulationCfg,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

fn is_rom_code(s: &str) -> bool {
    let digits: Vec<char> = s.chars().filter(|c| *c != '-').collect();
    digits.len() == 16 && digits.iter().all(char::is_ascii_hexdigit)
}

impl Config {
    /// Pump table for id 1 or 2, if present.
    pub fn pump(&self, id: u8) -> Option<&PumpCfg> {
        self.pumps.iter().find(|p| p.id == id)
    }

    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let p = &self.pins;
        let mut used = [
            p.relay_pump1,
            p.relay_pump2,
            p.manual_switch,
            p.pump_select_switch,
            p.float_switch,
        ];
        used.sort_unstable();
        if used.windows(2).any(|w| w[0] == w[1]) {
            eyre::bail!("pins must be distinct (a GPIO is assigned twice)");
        }

        // Pumps
        if self.pumps.len() != 2 {
            eyre::bail!("exactly two [[pumps]] are required, got {}", self.pumps.len());
        }
        if self.pump(1).is_none() || self.pump(2).is_none() {
            eyre::bail!("pumps must have ids 1 and 2");
        }
        for pump in &self.pumps {
            if !is_rom_code(&pump.temperature_sensor) {
                eyre::bail!(
                    "pumps[{}].temperature_sensor must be 16 hex digits, got {:?}",
                    pump.id,
                    pump.temperature_sensor
                );
            }
            if !(pump.current_fault_a.is_finite() && pump.current_fault_a > 0.0) {
                eyre::bail!("pumps[{}].current_fault_a must be > 0", pump.id);
            }
            if pump.temperature_fault_c <= 0 || pump.temperature_fault_c > 125 {
                eyre::bail!("pumps[{}].temperature_fault_c must be in 1..=125", pump.id);
            }
            if pump.rated_current_a < 0.0 || pump.rated_power_hp < 0.0 {
                eyre::bail!("pumps[{}] nameplate values must be >= 0", pump.id);
            }
        }
        if self.pumps[0].temperature_sensor == self.pumps[1].temperature_sensor {
            eyre::bail!("pumps must use different temperature sensors");
        }

        // Current sensor
        let c = &self.current_sensor;
        if c.samples == 0 {
            eyre::bail!("current_sensor.samples must be >= 1");
        }
        if c.samples > 100_000 {
            eyre::bail!("current_sensor.samples is unreasonably large (>100000)");
        }
        if !(c.adc_reference_v.is_finite() && c.adc_reference_v > 0.0) {
            eyre::bail!("current_sensor.adc_reference_v must be > 0");
        }
        if !(c.midpoint_v >= 0.0 && c.midpoint_v <= c.adc_reference_v) {
            eyre::bail!("current_sensor.midpoint_v must be within [0, adc_reference_v]");
        }
        if !(c.sensitivity_v_per_a.is_finite() && c.sensitivity_v_per_a > 0.0) {
            eyre::bail!("current_sensor.sensitivity_v_per_a must be > 0");
        }
        if c.adc_channel > 7 {
            eyre::bail!("current_sensor.adc_channel must be in 0..=7");
        }

        // Timing
        let t = &self.timing;
        if t.alarm_page_ms == 0 {
            eyre::bail!("timing.alarm_page_ms must be >= 1");
        }
        if t.interlock_ms > 60_000 {
            eyre::bail!("timing.interlock_ms is unreasonably large (>60s)");
        }
        if self.temperature.settle_ms > 10_000 {
            eyre::bail!("temperature.settle_ms is unreasonably large (>10s)");
        }

        // Display
        if !(8..=40).contains(&self.display.width) {
            eyre::bail!("display.width must be in 8..=40");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulation
        let s = &self.simulation;
        if !(0.0..=1.0).contains(&s.initial_level) {
            eyre::bail!("simulation.initial_level must be in [0.0, 1.0]");
        }
        if s.float_off_level > s.float_on_level {
            eyre::bail!("simulation.float_off_level must be <= float_on_level");
        }
        if s.inflow_per_s < 0.0 || s.outflow_per_s < 0.0 {
            eyre::bail!("simulation flows must be >= 0");
        }

        Ok(())
    }
}
