//! DS18B20 probes through the Linux `w1-therm` driver.
//!
//! The kernel exposes each probe as `<root>/<family>-<serial>/w1_slave`:
//!
//! ```text
//! 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
//! 72 01 4b 46 7f ff 0e 10 57 t=23125
//! ```
//!
//! Reading the file triggers the conversion, so `start_conversion` only
//! checks that the bus master is present.
use std::path::{Path, PathBuf};

use pump_traits::{BoxError, SensorId, TemperatureBus};
use tracing::trace;

use crate::error::{HwError, Result};

/// Default sysfs root of the one-wire bus.
pub const W1_DEVICES: &str = "/sys/bus/w1/devices";

#[derive(Debug, Clone)]
pub struct W1TemperatureBus {
    root: PathBuf,
}

impl Default for W1TemperatureBus {
    fn default() -> Self {
        Self::new(W1_DEVICES)
    }
}

impl W1TemperatureBus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn slave_path(&self, sensor: &SensorId) -> PathBuf {
        self.root.join(sensor.w1_name()).join("w1_slave")
    }

    /// Read one probe in degrees Celsius.
    pub fn read(&self, sensor: &SensorId) -> Result<f32> {
        let path = self.slave_path(sensor);
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(HwError::SensorMissing {
                    sensor: sensor.to_string(),
                });
            }
            Err(e) => return Err(HwError::Io(e)),
        };
        let celsius = parse_w1_slave(&text, sensor)?;
        trace!(sensor = %sensor, celsius, "w1 read");
        Ok(celsius)
    }
}

/// Parse the two-line `w1_slave` payload.
pub fn parse_w1_slave(text: &str, sensor: &SensorId) -> Result<f32> {
    let mut lines = text.lines();
    let crc_line = lines.next().unwrap_or_default();
    if !crc_line.trim_end().ends_with("YES") {
        return Err(HwError::CrcMismatch {
            sensor: sensor.to_string(),
        });
    }
    let data_line = lines.next().unwrap_or_default();
    let milli = data_line
        .split_once("t=")
        .map(|(_, t)| t.trim())
        .ok_or_else(|| HwError::Parse {
            sensor: sensor.to_string(),
            detail: "missing t= field".to_string(),
        })?
        .parse::<i32>()
        .map_err(|e| HwError::Parse {
            sensor: sensor.to_string(),
            detail: e.to_string(),
        })?;
    Ok(milli as f32 / 1000.0)
}

impl TemperatureBus for W1TemperatureBus {
    fn start_conversion(&mut self) -> std::result::Result<(), BoxError> {
        if !self.root.is_dir() {
            return Err(Box::new(HwError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("one-wire bus root {} missing", self.root.display()),
            ))));
        }
        Ok(())
    }

    fn read_celsius(&mut self, sensor: &SensorId) -> std::result::Result<f32, BoxError> {
        Ok(self.read(sensor)?)
    }
}
