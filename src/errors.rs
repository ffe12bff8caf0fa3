//! Error types for the motion relay
//!
//! Covers every failure mode in the relay pipeline:
//! - Network I/O failures
//! - Inbound datagram validation
//! - Retry exhaustion
//! - Configuration and sensor faults

use std::io;

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reasons an inbound status datagram is rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// Datagram length differs from the fixed status length
    #[error("Malformed datagram: expected {expected} bytes, received {received}")]
    MalformedDatagram { expected: usize, received: usize },

    /// Byte 1 is not the status message type
    #[error("Unexpected message type: {0}")]
    UnexpectedMessageType(u8),

    /// Byte 2 is neither the failure nor the success code
    #[error("Unknown result code: {0}")]
    UnknownResultCode(u8),
}

/// Relay error enumeration
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error (socket, sysfs)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Inbound datagram failed validation
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Reliable send gave up after exhausting every retry chunk
    #[error("Send failed after {attempts} attempts")]
    SendFailure { attempts: u32 },

    /// Payload does not fit behind a one-byte length prefix
    #[error("Payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Operation abandoned because shutdown was requested
    #[error("Shutdown requested")]
    Shutdown,

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Sensor collaborator failure
    #[error("Sensor error: {0}")]
    Sensor(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(err.to_string())
    }
}

impl Error {
    /// True for the permanent failure raised by retry exhaustion
    pub fn is_send_failure(&self) -> bool {
        matches!(self, Self::SendFailure { .. })
    }
}
