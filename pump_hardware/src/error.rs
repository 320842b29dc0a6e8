use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("spi error: {0}")]
    Spi(String),
    #[error("i2c error: {0}")]
    I2c(String),
    #[error("one-wire sensor {sensor} not found")]
    SensorMissing { sensor: String },
    #[error("one-wire crc mismatch on {sensor}")]
    CrcMismatch { sensor: String },
    #[error("one-wire parse error on {sensor}: {detail}")]
    Parse { sensor: String, detail: String },
    #[error("simulated bus failure: {0}")]
    Simulated(&'static str),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
