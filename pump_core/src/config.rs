//! Runtime configuration types for the control loop.
//!
//! These are the structs `ControlSystem` runs on. They are separate from the
//! TOML-deserialized config in `pump_config`; see `conversions`.

use std::time::Duration;

use pump_traits::{PumpId, SensorId};

/// Fixed configuration of one pump unit.
#[derive(Debug, Clone, PartialEq)]
pub struct PumpSpec {
    pub id: PumpId,
    /// Nameplate voltage (informational).
    pub rated_voltage_v: u32,
    /// Nameplate current (informational).
    pub rated_current_a: f32,
    /// Nameplate power in HP (informational).
    pub rated_power_hp: f32,
    /// One-wire ROM code of the motor probe.
    pub temperature_sensor: SensorId,
    /// Trip when the window peak reaches this many amps.
    pub current_fault_a: f32,
    /// Trip when the probe reaches this many degrees Celsius. Default: 70.
    pub temperature_fault_c: i32,
}

impl PumpSpec {
    pub fn new(id: PumpId, temperature_sensor: SensorId, current_fault_a: f32) -> Self {
        Self {
            id,
            rated_voltage_v: 380,
            rated_current_a: 0.0,
            rated_power_hp: 0.0,
            temperature_sensor,
            current_fault_a,
            temperature_fault_c: 70,
        }
    }
}

/// Current transducer chain: ADC counts -> volts -> amps.
#[derive(Debug, Clone)]
pub struct CurrentSensing {
    /// Samples per measurement window.
    pub samples: u32,
    /// Spacing between samples.
    pub sample_interval_ms: u64,
    pub adc_reference_v: f32,
    /// Count that maps to `adc_reference_v`.
    pub adc_full_scale: f32,
    /// Transducer output at zero current.
    pub midpoint_v: f32,
    pub sensitivity_v_per_a: f32,
}

impl Default for CurrentSensing {
    fn default() -> Self {
        Self {
            samples: 1000,
            sample_interval_ms: 1,
            adc_reference_v: 3.3,
            adc_full_scale: 65535.0,
            midpoint_v: 1.65,
            sensitivity_v_per_a: 0.066,
        }
    }
}

impl CurrentSensing {
    /// Convert one raw sample to amps, rounded to 0.1 A.
    pub fn to_amps(&self, raw: u16) -> f32 {
        let volts = f32::from(raw) * self.adc_reference_v / self.adc_full_scale;
        let amps = (volts - self.midpoint_v) / self.sensitivity_v_per_a;
        (amps * 10.0).round() / 10.0
    }

    /// Inverse of `to_amps` (before rounding); used by fakes and the simulator.
    pub fn to_raw(&self, amps: f32) -> u16 {
        let volts = self.midpoint_v + amps * self.sensitivity_v_per_a;
        (volts / self.adc_reference_v * self.adc_full_scale)
            .round()
            .clamp(0.0, self.adc_full_scale) as u16
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.sample_interval_ms)
    }
}

#[derive(Debug, Clone)]
pub struct TemperatureSensing {
    /// Wait between starting a conversion and reading it.
    pub settle_ms: u64,
}

impl Default for TemperatureSensing {
    fn default() -> Self {
        Self { settle_ms: 1000 }
    }
}

/// Loop delays. None of these are contractual; all come from config.
#[derive(Debug, Clone)]
pub struct Timing {
    pub interlock_ms: u64,
    pub reading_hold_ms: u64,
    pub alarm_page_ms: u64,
    pub power_on_settle_ms: u64,
    pub splash_ms: u64,
    pub idle_poll_ms: u64,
}

impl Default for Timing {
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

impl Timing {
    /// All delays zero; handy for tests that only care about ordering.
    pub fn immediate() -> Self {
        Self {
            interlock_ms: 0,
            reading_hold_ms: 0,
            alarm_page_ms: 1,
            power_on_settle_ms: 0,
            splash_ms: 0,
            idle_poll_ms: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn midpoint_reads_zero_amps() {
        let c = CurrentSensing::default();
        assert_eq!(c.to_amps(32768), 0.0);
    }

    #[test]
    fn raw_round_trips_at_one_decimal() {
        let c = CurrentSensing::default();
        for amps in [0.0_f32, 1.2, 8.5, 13.1, -4.3] {
            let back = c.to_amps(c.to_raw(amps));
            assert!((back - amps).abs() < 1e-4, "{amps} -> {back}");
        }
    }
}
