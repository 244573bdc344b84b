//! Error types for the EEG-to-OSC streamer

use thiserror::Error;

use crate::device::status::{DeviceStage, StatusCode};

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    #[error("Device error: {0}")]
    Device(#[from] DeviceError),

    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    #[error("Recording error: {0}")]
    Recording(#[from] RecordingError),

    #[error("OSC encoding error: {0}")]
    Osc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Text printed to the console when a session ends with this error.
    pub fn diagnostic(&self) -> String {
        match self {
            Error::Device(e) => format!(
                "An error occurred. Error Code: {} - {}",
                e.code.raw(),
                e.message
            ),
            Error::Network(NetworkError::ConnectionFailed { port, reason }) => {
                format!("Error connecting to port {}: {}", port, reason)
            }
            Error::Recording(e) => format!("Recorded playback failed: {}", e),
            _ => "An unknown error occurred.".to_string(),
        }
    }

    /// Whether the operator should be offered the recorded-data fallback.
    pub fn offers_fallback(&self) -> bool {
        matches!(self, Error::Device(e) if e.offers_fallback())
    }
}

/// A failed call into the acquisition SDK
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{stage} failed with {code}: {message}")]
pub struct DeviceError {
    /// Which SDK call failed
    pub stage: DeviceStage,
    /// Classified status code
    pub code: StatusCode,
    /// Last-error text reported by the SDK
    pub message: String,
}

impl DeviceError {
    pub fn new(stage: DeviceStage, code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            stage,
            code,
            message: message.into(),
        }
    }

    /// Only failures before acquisition starts offer the recorded fallback;
    /// mid-stream failures terminate the live attempt.
    pub fn offers_fallback(&self) -> bool {
        self.stage.is_initialization()
    }
}

/// Network errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Connection to port {port} failed: {reason}")]
    ConnectionFailed { port: u16, reason: String },

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Packet too large: {0} bytes")]
    PacketTooLarge(usize),
}

/// Recorded playback errors
#[derive(Error, Debug)]
pub enum RecordingError {
    #[error("Cannot open recording {path}: {reason}")]
    Open { path: String, reason: String },

    #[error("Recording {0} contains no rows")]
    Empty(String),

    #[error("Read failed: {0}")]
    Read(String),
}

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;
