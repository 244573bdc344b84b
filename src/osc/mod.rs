//! OSC packetization
//!
//! One frame becomes one OSC message with exactly [`EEG_CHANNELS`] float
//! arguments, serialized into one packet. Messages are built fresh for every
//! frame; nothing is carried over between calls.

use bytes::Bytes;
use rosc::{OscMessage, OscPacket, OscType};

use crate::constants::{EEG_CHANNELS, MAX_PACKET_SIZE};
use crate::error::{Error, NetworkError, Result};

/// Builds OSC packets for a fixed address
#[derive(Debug, Clone)]
pub struct OscPacketizer {
    address: String,
    packets_built: u64,
}

impl OscPacketizer {
    /// The address must be a valid OSC address pattern (starting with `/`).
    pub fn new(address: impl Into<String>) -> Result<Self> {
        let address = address.into();
        if !address.starts_with('/') || address.contains(char::is_whitespace) {
            return Err(Error::Config(format!("invalid OSC address '{}'", address)));
        }
        Ok(Self {
            address,
            packets_built: 0,
        })
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn packets_built(&self) -> u64 {
        self.packets_built
    }

    /// Message carrying the first [`EEG_CHANNELS`] values of `frame`.
    ///
    /// Values past the eighth are ignored; a shorter frame is padded with `0.0`.
    pub fn message(&self, frame: &[f32]) -> OscMessage {
        let args = (0..EEG_CHANNELS)
            .map(|i| OscType::Float(frame.get(i).copied().unwrap_or(0.0)))
            .collect();
        OscMessage {
            addr: self.address.clone(),
            args,
        }
    }

    /// Serialize `frame` into one OSC packet.
    pub fn packetize(&mut self, frame: &[f32]) -> Result<Bytes> {
        let packet = OscPacket::Message(self.message(frame));
        let encoded = rosc::encoder::encode(&packet).map_err(|e| Error::Osc(format!("{:?}", e)))?;
        if encoded.len() > MAX_PACKET_SIZE {
            return Err(NetworkError::PacketTooLarge(encoded.len()).into());
        }
        self.packets_built += 1;
        Ok(Bytes::from(encoded))
    }
}
