//! Collaborator boundaries for the pump controller.
//!
//! The core never touches GPIO, ADC, one-wire or LCD drivers directly; it
//! talks to these traits. Errors cross the boundary boxed so that any backend
//! (simulated, Raspberry Pi, test fakes) can report its own error type.

pub mod clock;

pub use clock::{Clock, ManualClock, MonotonicClock};

use std::fmt;

/// Boxed error used at every trait boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Identifies one of the two pumps of the station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PumpId {
    One,
    Two,
}

impl PumpId {
    pub const ALL: [PumpId; 2] = [PumpId::One, PumpId::Two];

    /// Operator-facing number (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            PumpId::One => 1,
            PumpId::Two => 2,
        }
    }

    /// The other pump of the pair.
    pub fn other(self) -> PumpId {
        match self {
            PumpId::One => PumpId::Two,
            PumpId::Two => PumpId::One,
        }
    }

    pub fn from_number(n: u8) -> Option<PumpId> {
        match n {
            1 => Some(PumpId::One),
            2 => Some(PumpId::Two),
            _ => None,
        }
    }

    /// Zero-based slot, handy for indexing `[T; 2]`.
    #[inline]
    pub fn index(self) -> usize {
        match self {
            PumpId::One => 0,
            PumpId::Two => 1,
        }
    }
}

impl fmt::Display for PumpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Discrete inputs sampled once per loop iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SwitchId {
    /// Manual/automatic mode selector (high = manual).
    Manual,
    /// Pump selector for manual mode (high = pump 1).
    PumpSelect,
    /// Float level switch (high = liquid present).
    Float,
}

impl SwitchId {
    pub const ALL: [SwitchId; 3] = [SwitchId::Manual, SwitchId::PumpSelect, SwitchId::Float];

    pub fn name(self) -> &'static str {
        match self {
            SwitchId::Manual => "manual",
            SwitchId::PumpSelect => "pump_select",
            SwitchId::Float => "float",
        }
    }
}

/// One-wire ROM code of a temperature probe, e.g. `280bb575d0013c92`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SensorId(pub [u8; 8]);

impl SensorId {
    /// Parse the 16 hex digit form used on device labels and in sysfs.
    /// Dashes are ignored.
    pub fn parse_hex(s: &str) -> Option<SensorId> {
        let digits: String = s.chars().filter(|c| *c != '-').collect();
        if digits.len() != 16 {
            return None;
        }
        let mut rom = [0u8; 8];
        for (i, byte) in rom.iter_mut().enumerate() {
            *byte = u8::from_str_radix(digits.get(i * 2..i * 2 + 2)?, 16).ok()?;
        }
        Some(SensorId(rom))
    }

    /// Linux w1 directory name: family code, then the 48-bit serial printed
    /// most significant byte first (the reverse of bus order).
    pub fn w1_name(&self) -> String {
        let serial: String = self.0[1..7].iter().rev().map(|b| format!("{b:02x}")).collect();
        format!("{:02x}-{serial}", self.0[0])
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

/// Analog current transducer (e.g. ACS712 behind an ADC).
pub trait CurrentSensor {
    /// One raw conversion, left-aligned to 16 bits.
    fn read_raw_sample(&mut self) -> Result<u16, BoxError>;
}

/// One-wire temperature bus shared by the pump probes.
pub trait TemperatureBus {
    /// Ask every probe on the bus to start a conversion.
    fn start_conversion(&mut self) -> Result<(), BoxError>;
    /// Read the last conversion of one probe, in degrees Celsius.
    fn read_celsius(&mut self, sensor: &SensorId) -> Result<f32, BoxError>;
}

/// Pump contactor outputs.
pub trait RelayBank {
    fn set_relay(&mut self, pump: PumpId, on: bool) -> Result<(), BoxError>;
}

/// Level reads of the operator switches and the float.
pub trait SwitchBank {
    fn read_switch(&mut self, id: SwitchId) -> Result<bool, BoxError>;
}

/// Two-line character display.
pub trait CharacterDisplay {
    /// Column count of the device.
    fn width(&self) -> usize {
        16
    }
    fn show_lines(&mut self, line1: &str, line2: &str) -> Result<(), BoxError>;
}

impl<T: CurrentSensor + ?Sized> CurrentSensor for Box<T> {
    fn read_raw_sample(&mut self) -> Result<u16, BoxError> {
        (**self).read_raw_sample()
    }
}

impl<T: TemperatureBus + ?Sized> TemperatureBus for Box<T> {
    fn start_conversion(&mut self) -> Result<(), BoxError> {
        (**self).start_conversion()
    }
    fn read_celsius(&mut self, sensor: &SensorId) -> Result<f32, BoxError> {
        (**self).read_celsius(sensor)
    }
}

impl<T: RelayBank + ?Sized> RelayBank for Box<T> {
    fn set_relay(&mut self, pump: PumpId, on: bool) -> Result<(), BoxError> {
        (**self).set_relay(pump, on)
    }
}

impl<T: SwitchBank + ?Sized> SwitchBank for Box<T> {
    fn read_switch(&mut self, id: SwitchId) -> Result<bool, BoxError> {
        (**self).read_switch(id)
    }
}

impl<T: CharacterDisplay + ?Sized> CharacterDisplay for Box<T> {
    fn width(&self) -> usize {
        (**self).width()
    }
    fn show_lines(&mut self, line1: &str, line2: &str) -> Result<(), BoxError> {
        (**self).show_lines(line1, line2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensor_id_parses_label_form() {
        let id = SensorId::parse_hex("280bb575d0013c92").expect("valid id");
        assert_eq!(id.0[0], 0x28);
        assert_eq!(id.0[7], 0x92);
        assert_eq!(id.to_string(), "280bb575d0013c92");
        assert_eq!(id.w1_name(), "28-3c01d075b50b");
    }

    #[test]
    fn sensor_id_rejects_bad_length_and_digits() {
        assert!(SensorId::parse_hex("28").is_none());
        assert!(SensorId::parse_hex("zz0bb575d0013c92").is_none());
    }

    #[test]
    fn pump_ids_pair_up() {
        assert_eq!(PumpId::One.other(), PumpId::Two);
        assert_eq!(PumpId::from_number(2), Some(PumpId::Two));
        assert_eq!(PumpId::from_number(3), None);
        assert_eq!(PumpId::Two.index(), 1);
    }
}
