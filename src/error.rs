//! Error types and handling.

use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Operation attempted while the serial link is closed
    #[error("Printer not connected")]
    NotConnected,

    /// Write/read failure on the link
    #[error("Transport error: {0}")]
    Transport(String),

    /// No reply observed before the deadline
    #[error("Device timeout: {0}")]
    Timeout(String),

    /// Serial port driver error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// File or port I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame or probe reply from the device
    #[error("Framing error: {0}")]
    Framing(String),

    /// Device answered a data query with NAK
    #[error("Command '{0}' rejected by printer (NAK)")]
    Rejected(String),

    /// Record payload has too few fields
    #[error("Invalid {record} record: expected at least {expected} fields, got {actual}")]
    RecordFormat {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    /// Record payload starts with another command's tag
    #[error("Invalid {record} record: expected tag {expected:?}, got {actual:?}")]
    RecordTag {
        record: &'static str,
        expected: &'static str,
        actual: String,
    },

    /// Caller input rejected before transmission
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Lock poisoning or background task failure
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Coarse error classification exposed to operators and JSON consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transport,
    Framing,
    Rejected,
    RecordFormat,
    Validation,
    Config,
    Internal,
}

impl AppError {
    /// Create a transport error with message
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a framing error with message
    pub fn framing(msg: impl Into<String>) -> Self {
        Self::Framing(msg.into())
    }

    /// Create a validation error with message
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error with message
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotConnected | Self::Transport(_) | Self::Timeout(_) | Self::Serial(_) | Self::Io(_) => {
                ErrorKind::Transport
            }
            Self::Framing(_) => ErrorKind::Framing,
            Self::Rejected(_) => ErrorKind::Rejected,
            Self::RecordFormat { .. } | Self::RecordTag { .. } => ErrorKind::RecordFormat,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Config(_) => ErrorKind::Config,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// True when the link itself failed and device state is unknown.
    pub fn is_transport(&self) -> bool {
        self.kind() == ErrorKind::Transport
    }
}
