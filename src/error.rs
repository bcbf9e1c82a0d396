//! # Error Types
//!
//! Custom error types for the weather station using `thiserror`.

use thiserror::Error;

/// Main error type for the weather station
#[derive(Debug, Error)]
pub enum StationError {
    /// The HMT did not answer a poll within the serial timeout
    #[error("Sensor timeout: no response within {0} ms")]
    SensorTimeout(u64),

    /// A response line arrived but carried no usable temperature
    #[error("Sensor parse error: {0}")]
    SensorParse(String),

    /// Serial or network transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// The serial device could not be opened
    #[error("Serial port not found: {0}")]
    SerialPortNotFound(String),

    /// WoW kept answering with a non-success status
    #[error("Upload rejected with status {0}")]
    UploadRejected(u16),

    /// Persisted aggregate missing, corrupt or stale
    #[error("Aggregate store unavailable: {0}")]
    StoreUnavailable(String),

    /// Could not re-associate with the wireless network
    #[error("Network reconnect failed: {0}")]
    ReconnectFailed(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// Configuration serialization errors
    #[error("Configuration write error: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    /// JSON errors (persisted aggregate, report payload)
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for the weather station
pub type Result<T> = std::result::Result<T, StationError>;
