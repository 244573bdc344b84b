//! Connected UDP sender

use socket2::{Domain, Protocol, SockAddr, Socket, Type};
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, ToSocketAddrs, UdpSocket};

use crate::config::NetworkConfig;
use crate::constants::MAX_PACKET_SIZE;
use crate::error::NetworkError;
use crate::network::{OscTransport, SenderStats};

/// Create a UDP socket bound to an ephemeral port of `peer`'s address family
/// and connected to `peer`.
pub fn create_socket(
    peer: SocketAddr,
    send_buffer_size: Option<usize>,
) -> std::io::Result<UdpSocket> {
    let socket = Socket::new(Domain::for_address(peer), Type::DGRAM, Some(Protocol::UDP))?;

    if let Some(size) = send_buffer_size {
        socket.set_send_buffer_size(size)?;
    }

    let local = match peer {
        SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
        SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
    };
    socket.bind(&SockAddr::from(local))?;
    socket.connect(&SockAddr::from(peer))?;

    Ok(socket.into())
}

/// Sends OSC packets to one fixed destination
pub struct UdpSender {
    socket: UdpSocket,
    max_consecutive_failures: u32,
    consecutive_failures: u32,
    stats: SenderStats,
}

impl UdpSender {
    /// Resolve `host:port` and connect. Any failure names the port.
    pub fn connect(config: &NetworkConfig) -> Result<Self, NetworkError> {
        let failed = |reason: String| NetworkError::ConnectionFailed {
            port: config.port,
            reason,
        };

        let peer = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .map_err(|e| failed(e.to_string()))?
            .next()
            .ok_or_else(|| failed(format!("'{}' did not resolve", config.host)))?;

        let socket =
            create_socket(peer, config.send_buffer_size).map_err(|e| failed(e.to_string()))?;

        tracing::debug!(
            "UDP socket {:?} connected to {}",
            socket.local_addr().ok(),
            peer
        );

        Ok(Self {
            socket,
            max_consecutive_failures: config.max_consecutive_failures,
            consecutive_failures: 0,
            stats: SenderStats::default(),
        })
    }

}

impl OscTransport for UdpSender {
    fn send_packet(&mut self, packet: &[u8]) -> Result<(), NetworkError> {
        if packet.len() > MAX_PACKET_SIZE {
            self.consecutive_failures += 1;
            self.stats.send_failures += 1;
            return Err(NetworkError::PacketTooLarge(packet.len()));
        }

        match self.socket.send(packet) {
            Ok(sent) if sent == packet.len() => {
                self.consecutive_failures = 0;
                self.stats.packets_sent += 1;
                self.stats.bytes_sent += sent as u64;
                Ok(())
            }
            Ok(sent) => {
                self.consecutive_failures += 1;
                self.stats.send_failures += 1;
                Err(NetworkError::SendFailed(format!(
                    "short send: {} of {} bytes",
                    sent,
                    packet.len()
                )))
            }
            Err(e) => {
                self.consecutive_failures += 1;
                self.stats.send_failures += 1;
                Err(NetworkError::SendFailed(e.to_string()))
            }
        }
    }

    fn is_reachable(&self) -> bool {
        self.max_consecutive_failures == 0
            || self.consecutive_failures < self.max_consecutive_failures
    }

    fn stats(&self) -> SenderStats {
        self.stats
    }
}
