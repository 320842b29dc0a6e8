//! Maps `Box<dyn Error>` from trait boundaries to typed `PumpError`.
//!
//! The traits in `pump_traits` use `Box<dyn Error + Send + Sync>` so every
//! backend can bring its own error type; this module converts those to our
//! typed enum, with a feature-gated path for `pump_hardware::HwError`.

use pump_traits::PumpId;

use crate::error::PumpError;

/// A failed transducer read. Always recoverable.
pub fn sensor_error(pump: PumpId, e: &(dyn std::error::Error + 'static)) -> PumpError {
    #[cfg(feature = "hardware-errors")]
    {
        use pump_hardware::error::HwError;
        if let Some(hw) = e.downcast_ref::<HwError>() {
            let detail = match hw {
                HwError::SensorMissing { sensor } => {
                    format!("probe {sensor} absent from the one-wire bus")
                }
                HwError::CrcMismatch { sensor } => {
                    format!("probe {sensor} returned a corrupt frame")
                }
                other => other.to_string(),
            };
            return PumpError::SensorCommunication { pump, detail };
        }
    }

    PumpError::SensorCommunication {
        pump,
        detail: e.to_string(),
    }
}

/// A failed actuator, switch or display operation.
pub fn map_hw_error(what: &str, e: &(dyn std::error::Error + 'static)) -> PumpError {
    #[cfg(feature = "hardware-errors")]
    {
        use pump_hardware::error::HwError;
        if let Some(HwError::Io(io)) = e.downcast_ref::<HwError>()
            && io.kind() == std::io::ErrorKind::PermissionDenied
        {
            return PumpError::Config(format!("{what}: permission denied on device ({io})"));
        }
    }

    PumpError::Hardware(format!("{what}: {e}"))
}
