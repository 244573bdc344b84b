//! Network subsystem for UDP transport of OSC packets

pub mod udp;

pub use udp::{create_socket, UdpSender};

use crate::error::NetworkError;

/// Destination for serialized OSC packets
pub trait OscTransport {
    /// Send one packet as one datagram. A failure loses this packet only.
    fn send_packet(&mut self, packet: &[u8]) -> Result<(), NetworkError>;

    /// Whether streaming to this destination should continue
    fn is_reachable(&self) -> bool;

    fn stats(&self) -> SenderStats;
}

/// Sender statistics
#[derive(Debug, Clone, Copy, Default)]
pub struct SenderStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub send_failures: u64,
}
