//! `run` and `self-check` subcommands.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use eyre::WrapErr;
use pump_config::Config;
use pump_core::{ControlEvent, SupervisorMode};
use serde_json::{Value, json};

use crate::backend::build_system;

/// Per-run event counts gathered by the observer thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventTally {
    pub starts: u64,
    pub faults: u64,
    pub sensor_errors: u64,
    pub cycles: u64,
}

/// Stable JSON shape of one control event.
pub fn event_json(ev: &ControlEvent) -> Value {
    match ev {
        ControlEvent::PumpStarted(p) => json!({ "event": "pump_started", "pump": p.number() }),
        ControlEvent::PumpStopped(p) => json!({ "event": "pump_stopped", "pump": p.number() }),
        ControlEvent::CurrentReading { pump, amps } => {
            json!({ "event": "current", "pump": pump.number(), "amps": amps })
        }
        ControlEvent::TemperatureReading { pump, celsius } => {
            json!({ "event": "temperature", "pump": pump.number(), "celsius": celsius })
        }
        ControlEvent::Faulted { pump, cause } => {
            json!({ "event": "fault", "pump": pump.number(), "cause": cause.to_string() })
        }
        ControlEvent::StartRefused(p) => json!({ "event": "start_refused", "pump": p.number() }),
        ControlEvent::SensorError { pump, error } => json!({
            "event": "sensor_error",
            "pump": pump.map(|p| p.number()),
            "error": error.to_string(),
        }),
        ControlEvent::CycleStarted { cycle } => json!({ "event": "cycle", "cycle": cycle }),
        ControlEvent::ModeChanged(mode) => json!({ "event": "mode", "mode": mode_name(*mode) }),
        ControlEvent::FaultReset(p) => json!({ "event": "fault_reset", "pump": p.number() }),
    }
}

pub fn mode_name(mode: SupervisorMode) -> &'static str {
    match mode {
        SupervisorMode::Normal => "normal",
        SupervisorMode::Degraded { .. } => "degraded",
        SupervisorMode::Halted => "halted",
    }
}

pub fn run(cfg: &Config, ticks: Option<u64>, json_out: bool) -> eyre::Result<()> {
    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = shutdown.clone();
        ctrlc::set_handler(move || {
            flag.store(true, Ordering::Relaxed);
        })
        .wrap_err("install Ctrl-C handler")?;
    }

    let mut system = build_system(cfg)?;
    let events = system.subscribe();
    let observer = thread::spawn(move || {
        let mut tally = EventTally::default();
        for ev in events {
            match &ev {
                ControlEvent::PumpStarted(_) => tally.starts += 1,
                ControlEvent::Faulted { .. } => tally.faults += 1,
                ControlEvent::SensorError { .. } => tally.sensor_errors += 1,
                ControlEvent::CycleStarted { .. } => tally.cycles += 1,
                _ => {}
            }
            if json_out {
                println!("{}", event_json(&ev));
            }
        }
        tally
    });

    let outcome = system.run(&shutdown, ticks);
    let mode = system.mode();
    // Dropping the system closes the channel and ends the observer.
    drop(system);
    let tally = observer
        .join()
        .map_err(|_| eyre::eyre!("event observer thread panicked"))?;
    let ran = outcome?;

    if json_out {
        println!(
            "{}",
            json!({
                "ticks": ran,
                "mode": mode_name(mode),
                "starts": tally.starts,
                "faults": tally.faults,
                "sensor_errors": tally.sensor_errors,
                "cycles": tally.cycles,
            })
        );
    } else {
        println!(
            "stopped after {ran} ticks, mode {mode}; {} starts, {} faults, {} sensor errors",
            tally.starts, tally.faults, tally.sensor_errors
        );
    }
    Ok(())
}

pub fn self_check(cfg: &Config, json_out: bool) -> eyre::Result<()> {
    let mut system = build_system(cfg)?;
    let station = system.station_mut();
    let switches = station.read_all_switches().wrap_err("read switches")?;
    let probes = station.probe_sensors();

    let mut failures = Vec::new();
    for (pump, amps, celsius) in &probes {
        if let Err(e) = amps {
            failures.push(format!("pump {pump} current: {e}"));
        }
        if let Err(e) = celsius {
            failures.push(format!("pump {pump} temperature: {e}"));
        }
    }

    if json_out {
        let sw: serde_json::Map<String, Value> = switches
            .iter()
            .map(|(id, on)| (id.name().to_string(), Value::Bool(*on)))
            .collect();
        let pumps: Vec<Value> = probes
            .iter()
            .map(|(pump, amps, celsius)| {
                json!({
                    "pump": pump.number(),
                    "amps": amps.as_ref().ok(),
                    "celsius": celsius.as_ref().ok(),
                })
            })
            .collect();
        println!(
            "{}",
            json!({ "ok": failures.is_empty(), "switches": sw, "pumps": pumps })
        );
    } else {
        for (id, on) in &switches {
            println!("switch {:<12} {}", id.name(), if *on { "on" } else { "off" });
        }
        for (pump, amps, celsius) in &probes {
            let a = amps.as_ref().map_or("error".to_string(), |a| format!("{a:.1} A"));
            let c = celsius.as_ref().map_or("error".to_string(), |c| format!("{c} C"));
            println!("pump {pump}: current {a}, temperature {c}");
        }
        if failures.is_empty() {
            println!("OK");
        }
    }

    if let Err(e) = system.shutdown() {
        tracing::warn!(error = %e, "failed to release relays after self-check");
    }
    if !failures.is_empty() {
        eyre::bail!("self-check failed: {}", failures.join("; "));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_core::{FaultCause, PumpError};
    use pump_traits::PumpId;

    #[test]
    fn events_serialize_with_stable_names() {
        let v = event_json(&ControlEvent::Faulted {
            pump: PumpId::Two,
            cause: FaultCause::OverTemperature {
                celsius: 71,
                limit: 70,
            },
        });
        assert_eq!(v["event"], "fault");
        assert_eq!(v["pump"], 2);
        assert!(v["cause"].as_str().unwrap().contains("71 C"));

        let v = event_json(&ControlEvent::SensorError {
            pump: None,
            error: PumpError::SensorCommunication {
                pump: PumpId::One,
                detail: "crc".into(),
            },
        });
        assert_eq!(v["event"], "sensor_error");
        assert!(v["pump"].is_null());
    }

    #[test]
    fn mode_names() {
        assert_eq!(mode_name(SupervisorMode::Halted), "halted");
        assert_eq!(
            mode_name(SupervisorMode::Degraded {
                healthy: PumpId::One
            }),
            "degraded"
        );
    }
}
