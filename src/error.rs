use thiserror::Error;

pub type Result<T> = std::result::Result<T, WsprError>;

#[derive(Debug, Error)]
pub enum WsprError {
    #[error("serial port error: {0}")]
    Serial(#[from] serialport::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no serial ports found")]
    PortNotFound,

    #[error("unterminated line from device (framing lost)")]
    Framing,

    #[error("malformed time string: {0:?}")]
    ClockParse(String),

    #[error("generator frequency out of range: {0} cHz")]
    FrequencyOutOfRange(u64),
}
