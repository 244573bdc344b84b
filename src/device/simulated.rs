//! Synthetic Unicorn-shaped device
//!
//! Produces scans with the same 17-channel layout as the real amplifier:
//! 8 EEG channels (µV), accelerometer X/Y/Z (g), gyroscope X/Y/Z (°/s),
//! battery level (%), sample counter and validation indicator. `get_data`
//! blocks for the duration of the requested scans, like the hardware does.

use std::f32::consts::TAU;
use std::time::{Duration, Instant};

use crate::constants::{EEG_CHANNELS, UNICORN_SAMPLING_RATE, UNICORN_TOTAL_CHANNELS_COUNT};
use crate::device::status::{DeviceStage, StatusCode};
use crate::device::{
    AcquisitionDevice, AmplifierChannel, AmplifierConfiguration, DeviceBackend, DeviceSerial,
};
use crate::error::DeviceError;

const CHANNEL_NAMES: [&str; UNICORN_TOTAL_CHANNELS_COUNT] = [
    "EEG 1", "EEG 2", "EEG 3", "EEG 4", "EEG 5", "EEG 6", "EEG 7", "EEG 8", "Accelerometer X",
    "Accelerometer Y", "Accelerometer Z", "Gyroscope X", "Gyroscope Y", "Gyroscope Z",
    "Battery Level", "Counter", "Validation Indicator",
];

/// Backend exposing `count` simulated amplifiers
#[derive(Debug, Clone)]
pub struct SimulatedBackend {
    count: usize,
    paced: bool,
}

impl SimulatedBackend {
    pub fn new(count: usize) -> Self {
        Self { count, paced: true }
    }

    /// Deliver scans as fast as they are requested instead of in real time
    pub fn unpaced(mut self) -> Self {
        self.paced = false;
        self
    }
}

impl Default for SimulatedBackend {
    fn default() -> Self {
        Self::new(1)
    }
}

impl DeviceBackend for SimulatedBackend {
    type Device = SimulatedDevice;

    fn available_devices(&mut self, _only_paired: bool) -> Result<Vec<DeviceSerial>, DeviceError> {
        Ok((0..self.count)
            .map(|i| DeviceSerial(format!("SIM-2021.{:02}.{:02}", 1 + i / 100, i % 100)))
            .collect())
    }

    fn open(&mut self, serial: &DeviceSerial) -> Result<SimulatedDevice, DeviceError> {
        if !serial.0.starts_with("SIM-") {
            return Err(DeviceError::new(
                DeviceStage::Open,
                StatusCode::OpenDeviceFailed,
                format!("unknown simulated device '{}'", serial),
            ));
        }
        Ok(SimulatedDevice::new(self.paced))
    }
}

/// One simulated amplifier
pub struct SimulatedDevice {
    open: bool,
    acquiring: bool,
    test_signal: bool,
    paced: bool,
    counter: u64,
    next_deadline: Option<Instant>,
    noise: XorShift,
}

impl SimulatedDevice {
    fn new(paced: bool) -> Self {
        Self {
            open: true,
            acquiring: false,
            test_signal: false,
            paced,
            counter: 0,
            next_deadline: None,
            noise: XorShift(0x9E37_79B9_7F4A_7C15),
        }
    }

    fn fill_scan(&mut self, scan: &mut [f32]) {
        let t = self.counter as f32 / UNICORN_SAMPLING_RATE as f32;

        for (ch, value) in scan.iter_mut().take(EEG_CHANNELS).enumerate() {
            *value = if self.test_signal {
                // Square wave, 2 Hz, ±50 µV
                if (t * 2.0).fract() < 0.5 { 50.0 } else { -50.0 }
            } else {
                // Alpha rhythm with a per-channel phase plus broadband noise
                let phase = ch as f32 * 0.35;
                12.0 * (TAU * 10.0 * t + phase).sin()
                    + 4.0 * (TAU * 21.0 * t).sin()
                    + self.noise.next_unit() * 3.0
            };
        }

        let aux = [0.01, -0.02, 0.98, 0.1, -0.1, 0.05, 100.0];
        for (value, aux) in scan.iter_mut().skip(EEG_CHANNELS).zip(aux) {
            *value = aux;
        }
        if let Some(counter) = scan.get_mut(15) {
            *counter = (self.counter + 1) as f32;
        }
        if let Some(validation) = scan.get_mut(16) {
            *validation = 1.0;
        }

        self.counter += 1;
    }

    fn pace(&mut self, scans: u32) {
        if !self.paced {
            return;
        }
        let now = Instant::now();
        let step = Duration::from_secs_f64(scans as f64 / UNICORN_SAMPLING_RATE as f64);
        let deadline = self.next_deadline.unwrap_or(now) + step;
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
        self.next_deadline = Some(deadline);
    }

    fn ensure_open(&self, stage: DeviceStage) -> Result<(), DeviceError> {
        if self.open {
            Ok(())
        } else {
            Err(DeviceError::new(stage, StatusCode::InvalidHandle, "device is closed"))
        }
    }
}

impl AcquisitionDevice for SimulatedDevice {
    fn acquired_channels(&self) -> Result<usize, DeviceError> {
        self.ensure_open(DeviceStage::QueryChannels)?;
        Ok(UNICORN_TOTAL_CHANNELS_COUNT)
    }

    fn configuration(&self) -> Result<AmplifierConfiguration, DeviceError> {
        self.ensure_open(DeviceStage::QueryConfiguration)?;
        let channels = CHANNEL_NAMES
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let (unit, range) = match i {
                    0..=7 => ("µV", [-1_250_000.0, 1_250_000.0]),
                    8..=10 => ("g", [-8.0, 8.0]),
                    11..=13 => ("°/s", [-1000.0, 1000.0]),
                    14 => ("%", [0.0, 100.0]),
                    _ => ("", [0.0, f32::MAX]),
                };
                AmplifierChannel {
                    name: name.to_string(),
                    unit: unit.to_string(),
                    range,
                    enabled: true,
                }
            })
            .collect();
        Ok(AmplifierConfiguration { channels })
    }

    fn sampling_rate(&self) -> u32 {
        UNICORN_SAMPLING_RATE
    }

    fn start_acquisition(&mut self, test_signal: bool) -> Result<(), DeviceError> {
        self.ensure_open(DeviceStage::Start)?;
        if self.acquiring {
            return Err(DeviceError::new(
                DeviceStage::Start,
                StatusCode::OperationNotAllowed,
                "acquisition already running",
            ));
        }
        self.acquiring = true;
        self.test_signal = test_signal;
        self.next_deadline = None;
        Ok(())
    }

    fn get_data(&mut self, scans: u32, buffer: &mut [f32]) -> Result<(), DeviceError> {
        self.ensure_open(DeviceStage::GetData)?;
        if !self.acquiring {
            return Err(DeviceError::new(
                DeviceStage::GetData,
                StatusCode::OperationNotAllowed,
                "acquisition not started",
            ));
        }
        let needed = scans as usize * UNICORN_TOTAL_CHANNELS_COUNT;
        if buffer.len() < needed {
            return Err(DeviceError::new(
                DeviceStage::GetData,
                StatusCode::InvalidParameter,
                format!("buffer holds {} floats, {} needed", buffer.len(), needed),
            ));
        }

        self.pace(scans);
        for scan in buffer[..needed].chunks_mut(UNICORN_TOTAL_CHANNELS_COUNT) {
            self.fill_scan(scan);
        }
        Ok(())
    }

    fn stop_acquisition(&mut self) -> Result<(), DeviceError> {
        self.ensure_open(DeviceStage::Stop)?;
        self.acquiring = false;
        Ok(())
    }

    fn close(&mut self) -> Result<(), DeviceError> {
        self.acquiring = false;
        self.open = false;
        Ok(())
    }
}

/// Small deterministic noise source
#[derive(Debug, Clone)]
struct XorShift(u64);

impl XorShift {
    /// Uniform value in [-1, 1)
    fn next_unit(&mut self) -> f32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        ((x >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
    }
}
