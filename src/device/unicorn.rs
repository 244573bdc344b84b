//! Binding to the g.tec Unicorn C API
//!
//! Only the calls needed for streaming are declared. Every status returned by
//! the library goes through [`status::check`].

use std::ffi::{c_char, c_int, CStr, CString};

use crate::constants::{
    UNICORN_SAMPLING_RATE, UNICORN_SERIAL_LENGTH_MAX, UNICORN_TOTAL_CHANNELS_COUNT,
};
use crate::device::status::{self, DeviceStage, StatusCode};
use crate::device::{
    AcquisitionDevice, AmplifierChannel, AmplifierConfiguration, DeviceBackend, DeviceSerial,
};
use crate::error::DeviceError;

const UNICORN_STRING_LENGTH_MAX: usize = 32;

type UnicornHandle = u64;
type UnicornBool = c_int;
type UnicornSerial = [c_char; UNICORN_SERIAL_LENGTH_MAX];

#[repr(C)]
#[derive(Clone, Copy)]
struct RawAmplifierChannel {
    name: [c_char; UNICORN_STRING_LENGTH_MAX],
    unit: [c_char; UNICORN_STRING_LENGTH_MAX],
    range: [f32; 2],
    enabled: UnicornBool,
}

#[repr(C)]
struct RawAmplifierConfiguration {
    channels: [RawAmplifierChannel; UNICORN_TOTAL_CHANNELS_COUNT],
}

#[cfg_attr(windows, link(name = "Unicorn"))]
#[cfg_attr(not(windows), link(name = "unicorn"))]
extern "C" {
    fn UNICORN_GetAvailableDevices(
        available_devices: *mut UnicornSerial,
        available_devices_count: *mut u32,
        only_paired: UnicornBool,
    ) -> c_int;
    fn UNICORN_OpenDevice(serial: *const c_char, handle: *mut UnicornHandle) -> c_int;
    fn UNICORN_CloseDevice(handle: *mut UnicornHandle) -> c_int;
    fn UNICORN_StartAcquisition(handle: UnicornHandle, test_signal_enabled: UnicornBool) -> c_int;
    fn UNICORN_StopAcquisition(handle: UnicornHandle) -> c_int;
    fn UNICORN_GetNumberOfAcquiredChannels(
        handle: UnicornHandle,
        number_of_acquired_channels: *mut u32,
    ) -> c_int;
    fn UNICORN_GetConfiguration(
        handle: UnicornHandle,
        configuration: *mut RawAmplifierConfiguration,
    ) -> c_int;
    fn UNICORN_GetData(
        handle: UnicornHandle,
        number_of_scans: u32,
        destination_buffer: *mut f32,
        destination_buffer_length: u32,
    ) -> c_int;
    fn UNICORN_GetLastErrorText() -> *const c_char;
}

fn last_error_text() -> String {
    // SAFETY: the library returns a pointer to a static NUL-terminated string.
    unsafe {
        let text = UNICORN_GetLastErrorText();
        if text.is_null() {
            return String::new();
        }
        CStr::from_ptr(text).to_string_lossy().into_owned()
    }
}

fn check(code: c_int, stage: DeviceStage) -> Result<(), DeviceError> {
    status::check(code, stage, last_error_text)
}

fn fixed_str(raw: &[c_char]) -> String {
    let bytes: Vec<u8> = raw
        .iter()
        .take_while(|&&c| c != 0)
        .map(|&c| c as u8)
        .collect();
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Backend talking to the vendor library
#[derive(Debug, Default)]
pub struct UnicornBackend;

impl DeviceBackend for UnicornBackend {
    type Device = UnicornDevice;

    fn available_devices(&mut self, only_paired: bool) -> Result<Vec<DeviceSerial>, DeviceError> {
        let mut count: u32 = 0;
        // SAFETY: a null buffer asks the library for the count only.
        let code = unsafe {
            UNICORN_GetAvailableDevices(std::ptr::null_mut(), &mut count, only_paired as c_int)
        };
        check(code, DeviceStage::Enumerate)?;

        if count == 0 {
            return Ok(Vec::new());
        }

        let mut serials: Vec<UnicornSerial> = vec![[0; UNICORN_SERIAL_LENGTH_MAX]; count as usize];
        // SAFETY: `serials` holds `count` entries, as the library expects.
        let code = unsafe {
            UNICORN_GetAvailableDevices(serials.as_mut_ptr(), &mut count, only_paired as c_int)
        };
        check(code, DeviceStage::Enumerate)?;

        Ok(serials
            .iter()
            .take(count as usize)
            .map(|raw| DeviceSerial(fixed_str(raw)))
            .collect())
    }

    fn open(&mut self, serial: &DeviceSerial) -> Result<UnicornDevice, DeviceError> {
        let c_serial = CString::new(serial.0.as_str()).map_err(|_| {
            DeviceError::new(
                DeviceStage::Open,
                StatusCode::InvalidParameter,
                format!("serial '{}' contains a NUL byte", serial),
            )
        })?;

        let mut handle: UnicornHandle = 0;
        // SAFETY: both pointers are valid for the duration of the call.
        let code = unsafe { UNICORN_OpenDevice(c_serial.as_ptr(), &mut handle) };
        check(code, DeviceStage::Open)?;

        Ok(UnicornDevice {
            handle,
            acquiring: false,
        })
    }
}

/// An open Unicorn amplifier
pub struct UnicornDevice {
    handle: UnicornHandle,
    acquiring: bool,
}

impl AcquisitionDevice for UnicornDevice {
    fn acquired_channels(&self) -> Result<usize, DeviceError> {
        let mut channels: u32 = 0;
        // SAFETY: `channels` outlives the call.
        let code = unsafe { UNICORN_GetNumberOfAcquiredChannels(self.handle, &mut channels) };
        check(code, DeviceStage::QueryChannels)?;
        Ok(channels as usize)
    }

    fn configuration(&self) -> Result<AmplifierConfiguration, DeviceError> {
        let mut raw = std::mem::MaybeUninit::<RawAmplifierConfiguration>::zeroed();
        // SAFETY: the library fills the whole struct on success.
        let code = unsafe { UNICORN_GetConfiguration(self.handle, raw.as_mut_ptr()) };
        check(code, DeviceStage::QueryConfiguration)?;
        // SAFETY: zero-initialised and written by the call above.
        let raw = unsafe { raw.assume_init() };

        Ok(AmplifierConfiguration {
            channels: raw
                .channels
                .iter()
                .map(|c| AmplifierChannel {
                    name: fixed_str(&c.name),
                    unit: fixed_str(&c.unit),
                    range: c.range,
                    enabled: c.enabled != 0,
                })
                .collect(),
        })
    }

    fn sampling_rate(&self) -> u32 {
        UNICORN_SAMPLING_RATE
    }

    fn handle(&self) -> Option<u64> {
        Some(self.handle)
    }

    fn start_acquisition(&mut self, test_signal: bool) -> Result<(), DeviceError> {
        // SAFETY: plain value arguments.
        let code = unsafe { UNICORN_StartAcquisition(self.handle, test_signal as c_int) };
        check(code, DeviceStage::Start)?;
        self.acquiring = true;
        Ok(())
    }

    fn get_data(&mut self, scans: u32, buffer: &mut [f32]) -> Result<(), DeviceError> {
        // The vendor samples pass the destination size in bytes.
        let length = (buffer.len() * std::mem::size_of::<f32>()) as u32;
        // SAFETY: `buffer` is valid for `length` bytes.
        let code = unsafe { UNICORN_GetData(self.handle, scans, buffer.as_mut_ptr(), length) };
        check(code, DeviceStage::GetData)
    }

    fn stop_acquisition(&mut self) -> Result<(), DeviceError> {
        // SAFETY: plain value argument.
        let code = unsafe { UNICORN_StopAcquisition(self.handle) };
        self.acquiring = false;
        check(code, DeviceStage::Stop)
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        if self.handle == 0 {
            return Ok(());
        }
        // SAFETY: the library resets the handle to 0 on success.
        let code = unsafe { UNICORN_CloseDevice(&mut self.handle) };
        check(code, DeviceStage::Close)
    }
}

impl Drop for UnicornDevice {
    fn drop(&mut self) {
        if self.acquiring {
            if let Err(e) = self.stop_acquisition() {
                tracing::warn!("Stopping acquisition on drop failed: {}", e);
            }
        }
        if let Err(e) = self.close() {
            tracing::warn!("Closing device on drop failed: {}", e);
        }
    }
}
