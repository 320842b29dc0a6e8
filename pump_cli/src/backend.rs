//! Collaborator assembly: simulated station by default, Raspberry Pi
//! peripherals with `--features hardware`.

use eyre::WrapErr;
use pump_config::Config;
use pump_core::ControlSystem;
use pump_traits::MonotonicClock;

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn sim_params(cfg: &Config) -> eyre::Result<pump_hardware::SimParams> {
    use pump_traits::SensorId;

    let mut probes = pump_hardware::SimParams::default().probes;
    for p in &cfg.pumps {
        let id = SensorId::parse_hex(&p.temperature_sensor)
            .ok_or_else(|| eyre::eyre!("pump {}: bad temperature sensor id", p.id))?;
        if let Some(slot) = probes.get_mut(usize::from(p.id.saturating_sub(1))) {
            *slot = id;
        }
    }
    let s = &cfg.simulation;
    Ok(pump_hardware::SimParams {
        initial_level: s.initial_level,
        inflow_per_s: s.inflow_per_s,
        outflow_per_s: s.outflow_per_s,
        float_on_level: s.float_on_level,
        float_off_level: s.float_off_level,
        running_amps: s.running_amps,
        ambient_c: s.ambient_c,
        running_rise_c: s.running_rise_c,
        probes,
        manual: s.manual,
        pump_select: s.pump_select,
        temperature_bus_fails: s.temperature_bus_fails,
        adc_reference_v: cfg.current_sensor.adc_reference_v,
        current_midpoint_v: cfg.current_sensor.midpoint_v,
        current_sensitivity_v_per_a: cfg.current_sensor.sensitivity_v_per_a,
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
pub fn build_system(cfg: &Config) -> eyre::Result<ControlSystem> {
    use pump_hardware::{ConsoleDisplay, SimulatedStation};

    let station = SimulatedStation::new(sim_params(cfg)?, MonotonicClock::new());
    tracing::info!(
        level = station.level(),
        float_on = cfg.simulation.float_on_level,
        "simulated station ready"
    );
    ControlSystem::builder()
        .with_config(cfg)?
        .with_current_sensor(station.current_sensor())
        .with_temperature_bus(station.temperature_bus())
        .with_relays(station.relays())
        .with_switches(station.switches())
        .with_display(ConsoleDisplay::new(cfg.display.width))
        .with_clock(Box::new(MonotonicClock::new()))
        .build()
        .wrap_err("assemble simulated controller")
}

#[cfg(all(feature = "hardware", target_os = "linux"))]
pub fn build_system(cfg: &Config) -> eyre::Result<ControlSystem> {
    use pump_hardware::rpi::{GpioRelays, GpioSwitches, I2cLcd, Mcp3008CurrentSensor};
    use pump_hardware::w1::W1TemperatureBus;

    let pins = &cfg.pins;
    let relays = GpioRelays::new(pins.relay_pump1, pins.relay_pump2, pins.relay_active_high)
        .wrap_err("open relay pins")?;
    let switches = GpioSwitches::new(
        pins.manual_switch,
        pins.pump_select_switch,
        pins.float_switch,
    )
    .wrap_err("open switch pins")?;
    let current = Mcp3008CurrentSensor::new(
        cfg.current_sensor.adc_channel,
        cfg.current_sensor.spi_clock_hz,
    )
    .wrap_err("open MCP3008 on SPI0")?;
    let lcd = I2cLcd::new(cfg.display.i2c_address, cfg.display.width)
        .wrap_err("open I2C LCD")?;
    tracing::info!(
        relay1 = pins.relay_pump1,
        relay2 = pins.relay_pump2,
        w1_root = %cfg.temperature.w1_root,
        "hardware backend ready"
    );
    ControlSystem::builder()
        .with_config(cfg)?
        .with_current_sensor(current)
        .with_temperature_bus(W1TemperatureBus::new(&cfg.temperature.w1_root))
        .with_relays(relays)
        .with_switches(switches)
        .with_display(lcd)
        .with_clock(Box::new(MonotonicClock::new()))
        .build()
        .wrap_err("assemble hardware controller")
}
