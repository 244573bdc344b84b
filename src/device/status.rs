//! SDK status classification
//!
//! Every raw status returned by the acquisition SDK passes through [`check`]
//! exactly once. Code above this boundary only sees [`DeviceError`] values.

use std::fmt;

use crate::error::DeviceError;

/// Status codes defined by the Unicorn C API
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    Success,
    InvalidParameter,
    BluetoothInitFailed,
    BluetoothSocketFailed,
    OpenDeviceFailed,
    InvalidConfiguration,
    BufferOverflow,
    BufferUnderflow,
    OperationNotAllowed,
    ConnectionProblem,
    UnsupportedDevice,
    InvalidHandle,
    GeneralError,
    /// A code not listed in the SDK header
    Other(i32),
}

impl StatusCode {
    pub fn from_raw(code: i32) -> Self {
        match code {
            0 => StatusCode::Success,
            1 => StatusCode::InvalidParameter,
            2 => StatusCode::BluetoothInitFailed,
            3 => StatusCode::BluetoothSocketFailed,
            4 => StatusCode::OpenDeviceFailed,
            5 => StatusCode::InvalidConfiguration,
            6 => StatusCode::BufferOverflow,
            7 => StatusCode::BufferUnderflow,
            8 => StatusCode::OperationNotAllowed,
            9 => StatusCode::ConnectionProblem,
            10 => StatusCode::UnsupportedDevice,
            // 0xFFFFFFFE / 0xFFFFFFFF in the header
            -2 => StatusCode::InvalidHandle,
            -1 => StatusCode::GeneralError,
            other => StatusCode::Other(other),
        }
    }

    pub fn raw(&self) -> i32 {
        match self {
            StatusCode::Success => 0,
            StatusCode::InvalidParameter => 1,
            StatusCode::BluetoothInitFailed => 2,
            StatusCode::BluetoothSocketFailed => 3,
            StatusCode::OpenDeviceFailed => 4,
            StatusCode::InvalidConfiguration => 5,
            StatusCode::BufferOverflow => 6,
            StatusCode::BufferUnderflow => 7,
            StatusCode::OperationNotAllowed => 8,
            StatusCode::ConnectionProblem => 9,
            StatusCode::UnsupportedDevice => 10,
            StatusCode::InvalidHandle => -2,
            StatusCode::GeneralError => -1,
            StatusCode::Other(code) => *code,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, StatusCode::Success)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "status {} ({:?})", self.raw(), self)
    }
}

/// The SDK call a status belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStage {
    Enumerate,
    Select,
    Open,
    QueryChannels,
    QueryConfiguration,
    Start,
    GetData,
    Stop,
    Close,
}

impl DeviceStage {
    /// Stages that run before acquisition starts
    pub fn is_initialization(&self) -> bool {
        matches!(
            self,
            DeviceStage::Enumerate
                | DeviceStage::Select
                | DeviceStage::Open
                | DeviceStage::QueryChannels
                | DeviceStage::QueryConfiguration
        )
    }
}

impl fmt::Display for DeviceStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeviceStage::Enumerate => "device enumeration",
            DeviceStage::Select => "device selection",
            DeviceStage::Open => "open device",
            DeviceStage::QueryChannels => "query acquired channels",
            DeviceStage::QueryConfiguration => "query configuration",
            DeviceStage::Start => "start acquisition",
            DeviceStage::GetData => "get data",
            DeviceStage::Stop => "stop acquisition",
            DeviceStage::Close => "close device",
        };
        f.write_str(name)
    }
}

/// Classify a raw SDK status.
///
/// `last_error` is only invoked on failure, so backends can defer the
/// (comparatively expensive) last-error-text lookup.
pub fn check<F>(code: i32, stage: DeviceStage, last_error: F) -> Result<(), DeviceError>
where
    F: FnOnce() -> String,
{
    let status = StatusCode::from_raw(code);
    if status.is_success() {
        return Ok(());
    }

    let err = DeviceError::new(stage, status, last_error());
    tracing::debug!("SDK call '{}' returned {}", stage, status);
    Err(err)
}
