//! # Error Types
//!
//! Custom error types for CRSF Bridge using `thiserror`.

use thiserror::Error;

/// Main error type for CRSF Bridge
#[derive(Debug, Error)]
pub enum BridgeError {
    /// CRSF protocol errors
    #[error("CRSF protocol error: {0}")]
    CrsfProtocol(String),

    /// Channel vector handed to the encoder is malformed
    #[error("Invalid channels: {0}")]
    InvalidChannels(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port errors (open, read, write)
    #[error("Serial error: {0}")]
    Serial(String),

    /// None of the candidate serial ports could be opened
    #[error("No serial port found (tried: {0})")]
    SerialPortNotFound(String),

    /// Controller input errors
    #[error("Controller error: {0}")]
    Controller(String),

    /// No joystick-like input device was found
    #[error("No joystick found")]
    ControllerNotFound,

    /// Telemetry log serialization errors
    #[error("Telemetry log error: {0}")]
    Telemetry(#[from] serde_json::Error),
}

/// Result type alias for CRSF Bridge
pub type Result<T> = std::result::Result<T, BridgeError>;
