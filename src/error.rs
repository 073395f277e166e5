//! Error types for rover-io

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// rover-io error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Reading serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// MQTT request could not be queued
    #[error("MQTT client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    /// MQTT session error
    #[error("MQTT connection error: {0}")]
    MqttConnection(#[from] rumqttc::ConnectionError),

    /// No enumerated serial port matched the descriptor
    #[error("No serial port found matching \"{0}\"")]
    PortNotFound(String),

    /// Operation on a device whose port was never opened
    #[error("Serial port is not open")]
    PortNotOpen,

    /// Invalid frame or response
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Frame checksum mismatch
    #[error("Checksum error: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumError {
        /// Checksum computed over the received bytes
        expected: u16,
        /// Checksum carried by the frame
        actual: u16,
    },

    /// The remote service refused the connection
    #[error("Connection rejected: {0}")]
    ConnectionRejected(String),

    /// An established connection dropped unexpectedly
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// Unknown correction service name in the configuration
    #[error("Unknown correction service: {0}")]
    UnknownService(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}
