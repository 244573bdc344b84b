//! # Unicorn OSC Streamer
//!
//! Streams EEG from a g.tec Unicorn amplifier to a local OSC listener over
//! UDP, with a recorded CSV capture as fallback when no device can be used.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         Streamer (stream)                           │
//! │                                                                     │
//! │  ┌──────────────────┐        ┌──────────────────┐                   │
//! │  │  DeviceBackend   │        │   rec.csv        │                   │
//! │  │ (device::unicorn │        │                  │                   │
//! │  │  / simulated)    │        │                  │                   │
//! │  └────────┬─────────┘        └────────┬─────────┘                   │
//! │           ▼                           ▼                             │
//! │  ┌──────────────────┐        ┌──────────────────┐                   │
//! │  │   LiveSource     │        │  RecordedSource  │  source::*        │
//! │  │ get_data → frame │        │ row → frame,loop │                   │
//! │  └────────┬─────────┘        └────────┬─────────┘                   │
//! │           └─────────────┬─────────────┘                             │
//! │                         ▼                                           │
//! │              ┌─────────────────────┐                                │
//! │              │   OscPacketizer     │  osc: /unicornEEG ,ffffffff    │
//! │              └──────────┬──────────┘                                │
//! │                         ▼                                           │
//! │              ┌─────────────────────┐                                │
//! │              │     UdpSender       │  network::udp                  │
//! │              └──────────┬──────────┘                                │
//! └─────────────────────────┼───────────────────────────────────────────┘
//!                           │ UDP  localhost:7000
//!                           ▼
//!                     OSC listener
//! ```

pub mod config;
pub mod console;
pub mod device;
pub mod error;
pub mod network;
pub mod osc;
pub mod source;
pub mod stream;

pub use error::{Error, Result};

/// Application-wide constants
pub mod constants {
    /// Default OSC destination host
    pub const DEFAULT_HOST: &str = "localhost";

    /// Default OSC destination port
    pub const DEFAULT_OSC_PORT: u16 = 7000;

    /// OSC address of every outgoing message
    pub const OSC_ADDRESS: &str = "/unicornEEG";

    /// EEG channels forwarded per frame
    pub const EEG_CHANNELS: usize = 8;

    /// Unicorn sampling rate in Hz
    pub const UNICORN_SAMPLING_RATE: u32 = 250;

    /// Channels in one Unicorn scan (EEG, accelerometer, gyroscope,
    /// battery, counter, validation)
    pub const UNICORN_TOTAL_CHANNELS_COUNT: usize = 17;

    /// Serial buffer size used by the Unicorn API
    pub const UNICORN_SERIAL_LENGTH_MAX: usize = 14;

    /// Scans per acquisition call
    pub const DEFAULT_FRAME_LENGTH: u32 = 1;

    /// Upper bound on live progress ticks per second
    pub const CONSOLE_UPDATE_HZ: f32 = 25.0;

    /// Frames between progress ticks during recorded playback
    pub const RECORDED_TICK_INTERVAL: u64 = 256;

    /// Default recorded capture
    pub const DEFAULT_RECORDING: &str = "rec.csv";

    /// Maximum packet size for UDP
    pub const MAX_PACKET_SIZE: usize = 1472; // MTU - IP/UDP headers
}
