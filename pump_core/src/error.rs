use pump_traits::PumpId;
use thiserror::Error;

/// Why a pump latched its fault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FaultCause {
    OverCurrent { amps: f32, limit: f32 },
    OverTemperature { celsius: i32, limit: i32 },
}

impl std::fmt::Display for FaultCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultCause::OverCurrent { amps, limit } => {
                write!(f, "over-current {amps:.1} A (limit {limit:.1} A)")
            }
            FaultCause::OverTemperature { celsius, limit } => {
                write!(f, "over-temperature {celsius} C (limit {limit} C)")
            }
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PumpError {
    /// Bus or read failure; the reading is skipped, the pump is not faulted.
    #[error("sensor communication error on pump {pump}: {detail}")]
    SensorCommunication { pump: PumpId, detail: String },
    /// A reading crossed its trip limit. Consumed inside `PumpUnit`.
    #[error("threshold exceeded on pump {pump}: {cause}")]
    ThresholdExceeded { pump: PumpId, cause: FaultCause },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("configuration error: {0}")]
    Config(String),
}

impl PumpError {
    /// Errors the control loop logs and rides through.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PumpError::SensorCommunication { .. } | PumpError::InvalidState(_)
        )
    }
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing pump {0} configuration")]
    MissingPump(u8),
    #[error("missing current sensor")]
    MissingCurrentSensor,
    #[error("missing temperature bus")]
    MissingTemperatureBus,
    #[error("missing relay bank")]
    MissingRelays,
    #[error("missing switch bank")]
    MissingSwitches,
    #[error("missing display")]
    MissingDisplay,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
