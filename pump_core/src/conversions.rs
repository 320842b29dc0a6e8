//! Conversions bridging `pump_config` types to `pump_core` types.

use pump_traits::{PumpId, SensorId};

use crate::config::{CurrentSensing, PumpSpec, TemperatureSensing, Timing};
use crate::error::PumpError;

// ── PumpSpec ─────────────────────────────────────────────────────────────────

impl TryFrom<&pump_config::PumpCfg> for PumpSpec {
    type Error = PumpError;

    fn try_from(c: &pump_config::PumpCfg) -> Result<Self, Self::Error> {
        let id = PumpId::from_number(c.id)
            .ok_or_else(|| PumpError::Config(format!("pump id {} is not 1 or 2", c.id)))?;
        let temperature_sensor = SensorId::parse_hex(&c.temperature_sensor).ok_or_else(|| {
            PumpError::Config(format!(
                "pump {}: bad temperature sensor id {:?}",
                c.id, c.temperature_sensor
            ))
        })?;
        Ok(Self {
            id,
            rated_voltage_v: c.rated_voltage_v,
            rated_current_a: c.rated_current_a,
            rated_power_hp: c.rated_power_hp,
            temperature_sensor,
            current_fault_a: c.current_fault_a,
            temperature_fault_c: c.temperature_fault_c,
        })
    }
}

// ── CurrentSensing ───────────────────────────────────────────────────────────

impl From<&pump_config::CurrentSensorCfg> for CurrentSensing {
    fn from(c: &pump_config::CurrentSensorCfg) -> Self {
        Self {
            samples: c.samples,
            sample_interval_ms: c.sample_interval_ms,
            adc_reference_v: c.adc_reference_v,
            midpoint_v: c.midpoint_v,
            sensitivity_v_per_a: c.sensitivity_v_per_a,
            ..Self::default()
        }
    }
}

// ── TemperatureSensing ───────────────────────────────────────────────────────

impl From<&pump_config::TemperatureCfg> for TemperatureSensing {
    fn from(c: &pump_config::TemperatureCfg) -> Self {
        Self {
            settle_ms: c.settle_ms,
        }
    }
}

// ── Timing ───────────────────────────────────────────────────────────────────

impl From<&pump_config::TimingCfg> for Timing {
    fn from(c: &pump_config::TimingCfg) -> Self {
        Self {
            interlock_ms: c.interlock_ms,
            reading_hold_ms: c.reading_hold_ms,
            alarm_page_ms: c.alarm_page_ms,
            power_on_settle_ms: c.power_on_settle_ms,
            splash_ms: c.splash_ms,
            idle_poll_ms: c.idle_poll_ms,
        }
    }
}
