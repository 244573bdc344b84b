//! Live acquisition from an open device
//!
//! `LiveSource` owns the device handle and the acquisition buffer for one
//! session. [`LiveSource::shutdown`] stops acquisition and closes the device,
//! reporting failures; if the source is dropped without it (an error path),
//! the same cleanup runs best-effort.

use crate::device::status::{DeviceStage, StatusCode};
use crate::device::{AcquisitionDevice, AcquisitionGeometry, AmplifierConfiguration};
use crate::error::{DeviceError, Result};
use crate::source::FrameSource;

pub struct LiveSource<D: AcquisitionDevice> {
    device: Option<D>,
    geometry: AcquisitionGeometry,
    buffer: Vec<f32>,
    acquiring: bool,
    frames_acquired: u64,
}

impl<D: AcquisitionDevice> LiveSource<D> {
    /// Query the device geometry and allocate the acquisition buffer.
    ///
    /// The device is owned from here on: if the query fails it is closed.
    pub fn new(device: D, frame_length: u32) -> std::result::Result<Self, DeviceError> {
        let geometry = AcquisitionGeometry {
            channels: 0,
            frame_length: frame_length.max(1),
            sampling_rate: device.sampling_rate(),
        };
        let mut source = Self {
            device: Some(device),
            geometry,
            buffer: Vec::new(),
            acquiring: false,
            frames_acquired: 0,
        };

        if let Some(device) = source.device.as_ref() {
            source.geometry.channels = device.acquired_channels()?;
        }
        source.buffer = vec![0.0; source.geometry.buffer_len()];
        Ok(source)
    }

    pub fn configuration(&self) -> std::result::Result<AmplifierConfiguration, DeviceError> {
        match self.device.as_ref() {
            Some(device) => device.configuration(),
            None => Ok(AmplifierConfiguration::default()),
        }
    }

    pub fn geometry(&self) -> AcquisitionGeometry {
        self.geometry
    }

    pub fn device(&self) -> Option<&D> {
        self.device.as_ref()
    }

    pub fn frames_acquired(&self) -> u64 {
        self.frames_acquired
    }

    pub fn is_acquiring(&self) -> bool {
        self.acquiring
    }

    pub fn start(&mut self, test_signal: bool) -> std::result::Result<(), DeviceError> {
        if let Some(device) = self.device.as_mut() {
            device.start_acquisition(test_signal)?;
            self.acquiring = true;
        }
        Ok(())
    }

    /// Stop acquisition (if running) and close the device.
    ///
    /// The device is closed even when stopping fails; the first error wins.
    pub fn shutdown(mut self) -> std::result::Result<(), DeviceError> {
        self.release()
    }

    fn release(&mut self) -> std::result::Result<(), DeviceError> {
        let Some(mut device) = self.device.take() else {
            return Ok(());
        };

        let stopped = if self.acquiring {
            self.acquiring = false;
            let result = device.stop_acquisition();
            if result.is_ok() {
                tracing::debug!("Acquisition stopped");
            }
            result
        } else {
            Ok(())
        };

        let closed = device.close();
        if closed.is_ok() {
            tracing::debug!("Device closed");
        }
        stopped.and(closed)
    }
}

impl<D: AcquisitionDevice> FrameSource for LiveSource<D> {
    fn next_frame(&mut self) -> Result<&[f32]> {
        let device = self.device.as_mut().ok_or_else(|| {
            DeviceError::new(
                DeviceStage::GetData,
                StatusCode::InvalidHandle,
                "device already closed",
            )
        })?;

        device.get_data(self.geometry.frame_length, &mut self.buffer)?;
        self.frames_acquired += 1;
        Ok(&self.buffer)
    }
}

impl<D: AcquisitionDevice> Drop for LiveSource<D> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!("Device cleanup failed: {}", e);
        }
    }
}
