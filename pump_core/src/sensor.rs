//! Transducer sampling: peak current over a window, settled probe temperature.

use std::time::Duration;

use pump_traits::{BoxError, Clock, CurrentSensor, SensorId, TemperatureBus};
use tracing::trace;

use crate::config::{CurrentSensing, TemperatureSensing};

#[derive(Debug, Clone, Default)]
pub struct SensorReader {
    current: CurrentSensing,
    temperature: TemperatureSensing,
}

impl SensorReader {
    pub fn new(current: CurrentSensing, temperature: TemperatureSensing) -> Self {
        Self {
            current,
            temperature,
        }
    }

    pub fn current_sensing(&self) -> &CurrentSensing {
        &self.current
    }

    /// Sample the current transducer over the configured window and return
    /// the peak in amps. The peak is used so that start-up surges and
    /// short spikes are not averaged away.
    ///
    /// A failed sample aborts the window and is returned as-is.
    pub fn peak_current(
        &self,
        sensor: &mut dyn CurrentSensor,
        clock: &dyn Clock,
    ) -> Result<f32, BoxError> {
        let interval = self.current.interval();
        let mut peak = f32::NEG_INFINITY;
        for _ in 0..self.current.samples.max(1) {
            let raw = sensor.read_raw_sample()?;
            let amps = self.current.to_amps(raw);
            if amps > peak {
                peak = amps;
            }
            clock.sleep(interval);
        }
        trace!(peak, samples = self.current.samples, "current window");
        Ok(peak)
    }

    /// Start a conversion, wait for it to settle, and read the probe,
    /// truncated toward zero to whole degrees.
    pub fn temperature(
        &self,
        bus: &mut dyn TemperatureBus,
        sensor: &SensorId,
        clock: &dyn Clock,
    ) -> Result<i32, BoxError> {
        bus.start_conversion()?;
        clock.sleep(Duration::from_millis(self.temperature.settle_ms));
        let celsius = bus.read_celsius(sensor)?;
        if !celsius.is_finite() {
            return Err(format!("probe {sensor} returned {celsius}").into());
        }
        trace!(sensor = %sensor, celsius, "probe read");
        Ok(celsius.trunc() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pump_traits::ManualClock;

    struct Seq {
        raws: Vec<u16>,
        idx: usize,
    }
    impl CurrentSensor for Seq {
        fn read_raw_sample(&mut self) -> Result<u16, BoxError> {
            let v = self.raws[self.idx % self.raws.len()];
            self.idx += 1;
            Ok(v)
        }
    }

    struct Probe(f32);
    impl TemperatureBus for Probe {
        fn start_conversion(&mut self) -> Result<(), BoxError> {
            Ok(())
        }
        fn read_celsius(&mut self, _sensor: &SensorId) -> Result<f32, BoxError> {
            Ok(self.0)
        }
    }

    #[test]
    fn window_takes_configured_time_and_reports_peak() {
        let sensing = CurrentSensing::default();
        let raws = [3.0_f32, 9.4, 5.0].iter().map(|a| sensing.to_raw(*a)).collect();
        let reader = SensorReader::new(sensing, TemperatureSensing::default());
        let clock = ManualClock::new();
        let peak = reader
            .peak_current(&mut Seq { raws, idx: 0 }, &clock)
            .unwrap();
        assert!((peak - 9.4).abs() < 1e-4);
        assert_eq!(clock.elapsed(), Duration::from_millis(1000));
    }

    #[test]
    fn temperature_truncates_and_waits_settle() {
        let reader = SensorReader::default();
        let clock = ManualClock::new();
        let id = SensorId([0x28, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(reader.temperature(&mut Probe(69.9), &id, &clock).unwrap(), 69);
        assert_eq!(reader.temperature(&mut Probe(-3.7), &id, &clock).unwrap(), -3);
        assert_eq!(clock.elapsed(), Duration::from_secs(2));
    }

    #[test]
    fn nan_probe_is_an_error() {
        let reader = SensorReader::default();
        let clock = ManualClock::new();
        let id = SensorId([0x28, 0, 0, 0, 0, 0, 0, 1]);
        assert!(reader.temperature(&mut Probe(f32::NAN), &id, &clock).is_err());
    }
}
