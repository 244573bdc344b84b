//! Acquisition device abstraction
//!
//! The vendor SDK sits behind two traits: [`DeviceBackend`] enumerates and
//! opens devices, [`AcquisitionDevice`] drives one open device. Backends:
//!
//! - [`unicorn`] : FFI binding to the Unicorn C API (feature `unicorn`)
//! - [`simulated`] : synthetic EEG generator (feature `simulator`)
//! - [`MissingDriver`] : stand-in when no driver was compiled in

pub mod status;

#[cfg(feature = "simulator")]
pub mod simulated;
#[cfg(feature = "unicorn")]
pub mod unicorn;

use std::fmt;

use crate::error::DeviceError;
use status::{DeviceStage, StatusCode};

/// Serial number identifying one paired device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSerial(pub String);

impl fmt::Display for DeviceSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One channel of the amplifier configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AmplifierChannel {
    pub name: String,
    pub unit: String,
    pub range: [f32; 2],
    pub enabled: bool,
}

/// Amplifier configuration reported by the device
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AmplifierConfiguration {
    pub channels: Vec<AmplifierChannel>,
}

impl AmplifierConfiguration {
    /// Names of the channels that are part of each acquired scan
    pub fn enabled_channel_names(&self) -> Vec<&str> {
        self.channels
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Shape of the acquisition buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionGeometry {
    /// Channels per scan
    pub channels: usize,
    /// Scans per `get_data` call
    pub frame_length: u32,
    /// Device sampling rate in Hz
    pub sampling_rate: u32,
}

impl AcquisitionGeometry {
    /// Number of floats one `get_data` call deposits
    pub fn buffer_len(&self) -> usize {
        self.channels * self.frame_length as usize
    }

    /// Frames between progress ticks, limiting console updates to `max_hz`.
    pub fn ticks_every(&self, max_hz: f32) -> u64 {
        let calls_per_second = self.sampling_rate as f32 / self.frame_length.max(1) as f32;
        ((calls_per_second / max_hz).round() as u64).max(1)
    }
}

/// Enumerates and opens devices
pub trait DeviceBackend {
    type Device: AcquisitionDevice;

    /// Serials of the reachable devices. `only_paired` restricts the search
    /// to devices already paired with the host.
    fn available_devices(&mut self, only_paired: bool) -> Result<Vec<DeviceSerial>, DeviceError>;

    fn open(&mut self, serial: &DeviceSerial) -> Result<Self::Device, DeviceError>;
}

/// One open device
pub trait AcquisitionDevice {
    /// Channels in each scan written by [`get_data`](Self::get_data)
    fn acquired_channels(&self) -> Result<usize, DeviceError>;

    fn configuration(&self) -> Result<AmplifierConfiguration, DeviceError>;

    fn sampling_rate(&self) -> u32;

    /// Native handle of the open device, when the driver has one
    fn handle(&self) -> Option<u64> {
        None
    }

    fn start_acquisition(&mut self, test_signal: bool) -> Result<(), DeviceError>;

    /// Block until `scans` scans have been written to `buffer`.
    fn get_data(&mut self, scans: u32, buffer: &mut [f32]) -> Result<(), DeviceError>;

    fn stop_acquisition(&mut self) -> Result<(), DeviceError>;

    /// Release the device handle. Calling it twice is a no-op.
    fn close(&mut self) -> Result<(), DeviceError>;
}

/// Backend used when the binary was built without any device driver.
///
/// Enumeration always fails, which lets the operator fall back to recorded
/// playback.
#[derive(Debug, Default)]
pub struct MissingDriver;

/// Device type of [`MissingDriver`]; cannot be constructed.
#[derive(Debug)]
pub enum NoDevice {}

impl DeviceBackend for MissingDriver {
    type Device = NoDevice;

    fn available_devices(&mut self, _only_paired: bool) -> Result<Vec<DeviceSerial>, DeviceError> {
        Err(DeviceError::new(
            DeviceStage::Enumerate,
            StatusCode::GeneralError,
            "no Unicorn driver compiled in (enable the `unicorn` feature)",
        ))
    }

    fn open(&mut self, _serial: &DeviceSerial) -> Result<NoDevice, DeviceError> {
        Err(DeviceError::new(
            DeviceStage::Open,
            StatusCode::OpenDeviceFailed,
            "no Unicorn driver compiled in",
        ))
    }
}

impl AcquisitionDevice for NoDevice {
    fn acquired_channels(&self) -> Result<usize, DeviceError> {
        match *self {}
    }

    fn configuration(&self) -> Result<AmplifierConfiguration, DeviceError> {
        match *self {}
    }

    fn sampling_rate(&self) -> u32 {
        match *self {}
    }

    fn start_acquisition(&mut self, _test_signal: bool) -> Result<(), DeviceError> {
        match *self {}
    }

    fn get_data(&mut self, _scans: u32, _buffer: &mut [f32]) -> Result<(), DeviceError> {
        match *self {}
    }

    fn stop_acquisition(&mut self) -> Result<(), DeviceError> {
        match *self {}
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        match *self {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_interval() {
        let geometry = AcquisitionGeometry {
            channels: 17,
            frame_length: 1,
            sampling_rate: 250,
        };
        assert_eq!(geometry.ticks_every(25.0), 10);
        assert_eq!(geometry.buffer_len(), 17);

        // 250 / 4 / 25 = 2.5 rounds to 3
        let geometry = AcquisitionGeometry { frame_length: 4, ..geometry };
        assert_eq!(geometry.ticks_every(25.0), 3);
        assert_eq!(geometry.buffer_len(), 68);

        // Never less than one
        let geometry = AcquisitionGeometry { frame_length: 100, ..geometry };
        assert_eq!(geometry.ticks_every(25.0), 1);
    }

    #[test]
    fn test_missing_driver_offers_fallback() {
        let err = MissingDriver.available_devices(true).unwrap_err();
        assert_eq!(err.stage, DeviceStage::Enumerate);
        assert!(err.offers_fallback());
    }
}
