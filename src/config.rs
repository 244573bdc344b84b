//! Application configuration
//!
//! Defaults reproduce the fixed behaviour of the streamer (`localhost:7000`,
//! `/unicornEEG`, `rec.csv`). A TOML file may override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::constants::*;
use crate::error::{Error, Result};

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub device: DeviceConfig,
    pub recording: RecordingConfig,
    pub console: ConsoleConfig,
}

/// OSC destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub host: String,
    pub port: u16,
    /// OSC address of every message
    pub osc_address: String,
    /// Consecutive send failures after which the destination counts as
    /// unreachable; 0 never gives up
    pub max_consecutive_failures: u32,
    /// SO_SNDBUF override in bytes
    pub send_buffer_size: Option<usize>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_OSC_PORT,
            osc_address: OSC_ADDRESS.to_string(),
            max_consecutive_failures: 0,
            send_buffer_size: None,
        }
    }
}

/// Live acquisition settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Scans acquired per `get_data` call
    pub frame_length: u32,
    /// Acquire the amplifier's internal test signal instead of EEG
    pub test_signal: bool,
    /// Only list devices already paired with this host
    pub only_paired: bool,
    /// Serial to open without prompting, when several devices are found
    pub serial: Option<String>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            frame_length: DEFAULT_FRAME_LENGTH,
            test_signal: false,
            only_paired: true,
            serial: None,
        }
    }
}

/// Recorded playback settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordingConfig {
    pub path: PathBuf,
    /// Rate the capture was recorded at; sets the playback pacing
    pub sampling_rate: u32,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(DEFAULT_RECORDING),
            sampling_rate: UNICORN_SAMPLING_RATE,
        }
    }
}

/// Console progress indicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Upper bound on live progress ticks per second
    pub max_update_hz: f32,
    /// Frames between progress ticks during recorded playback
    pub recorded_tick_every: u64,
    /// Wait for ENTER before exiting
    pub wait_for_enter: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            max_update_hz: CONSOLE_UPDATE_HZ,
            recorded_tick_every: RECORDED_TICK_INTERVAL,
            wait_for_enter: true,
        }
    }
}

impl AppConfig {
    /// Parse a TOML document; missing fields take their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml(&text)
    }

    /// Load `path` if given, else the per-user config file if it exists,
    /// else the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load(path);
        }
        match default_config_path() {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from {}", path.display());
                Self::load(&path)
            }
            _ => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.network.port == 0 {
            return Err(Error::Config("network.port must be non-zero".into()));
        }
        if !self.network.osc_address.starts_with('/') {
            return Err(Error::Config(format!(
                "network.osc_address '{}' must start with '/'",
                self.network.osc_address
            )));
        }
        if self.device.frame_length == 0 {
            return Err(Error::Config("device.frame_length must be at least 1".into()));
        }
        if self.console.max_update_hz <= 0.0 {
            return Err(Error::Config("console.max_update_hz must be positive".into()));
        }
        if self.console.recorded_tick_every == 0 {
            return Err(Error::Config("console.recorded_tick_every must be at least 1".into()));
        }
        Ok(())
    }
}

/// `config.toml` in the platform configuration directory
pub fn default_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("org", "unicorn-osc", "unicorn-osc")
        .map(|dirs| dirs.config_dir().join("config.toml"))
}
