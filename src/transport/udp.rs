//! UDP transport implementation.
//!
//! Uses a non-blocking `std::net::UdpSocket` connected to the command
//! station, so polling never stalls the caller.

use std::io;
use std::net::{IpAddr, SocketAddr, UdpSocket};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::transport::Transport;

/// Default command station address.
pub const DEFAULT_ADDRESS: &str = "192.168.0.111";

/// Default Z21 UDP port.
pub const DEFAULT_PORT: u16 = 21105;

/// Largest datagram the command station sends.
const RECV_BUFFER_SIZE: usize = 1472;

/// Configuration for UDP transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdpConfig {
    /// Command station IPv4 or IPv6 address in text form.
    pub address: String,
    /// Command station port.
    pub port: u16,
}

impl UdpConfig {
    /// Creates a new configuration for the given address on the default port.
    #[must_use]
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            port: DEFAULT_PORT,
        }
    }

    /// Sets the port.
    #[must_use]
    pub const fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Parses the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] if `address` is not an IP address.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.address.parse().map_err(|_| Error::InvalidAddress {
            reason: format!("'{}' is not an IP address", self.address),
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self::new(DEFAULT_ADDRESS)
    }
}

/// UDP transport for Z21 communication.
pub struct UdpTransport {
    config: UdpConfig,
    socket: Option<UdpSocket>,
    buf: Box<[u8; RECV_BUFFER_SIZE]>,
}

impl UdpTransport {
    /// Creates a new, unbound transport.
    #[must_use]
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            socket: None,
            buf: Box::new([0u8; RECV_BUFFER_SIZE]),
        }
    }

    /// Creates and connects a transport for the given address with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the socket cannot be bound.
    pub fn connect_to(address: impl Into<String>) -> Result<Self> {
        let mut transport = Self::new(UdpConfig::new(address));
        transport.connect()?;
        Ok(transport)
    }

    /// Binds a local socket and connects it to the configured endpoint.
    ///
    /// Calling this again rebinds.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the socket cannot be bound.
    pub fn connect(&mut self) -> Result<()> {
        let remote = self.config.socket_addr()?;
        let local: SocketAddr = if remote.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };

        let socket = UdpSocket::bind(local)?;
        socket.connect(remote)?;
        socket.set_nonblocking(true)?;

        tracing::info!("UDP socket {} connected to {}", socket.local_addr()?, remote);
        self.socket = Some(socket);
        Ok(())
    }

    /// Drops the socket.
    pub fn disconnect(&mut self) {
        if self.socket.take().is_some() {
            tracing::info!("UDP socket closed");
        }
    }

    /// Returns true if a socket is bound.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        self.socket.is_some()
    }

    /// Current command station address.
    #[must_use]
    pub fn ip_address(&self) -> &str {
        &self.config.address
    }

    /// Current configuration.
    #[must_use]
    pub const fn config(&self) -> &UdpConfig {
        &self.config
    }

    /// Changes the command station address.
    ///
    /// A connected transport reconnects to the new address. An invalid
    /// address is rejected and leaves the old one in place.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAddress`] or a socket error.
    pub fn set_ip_address(&mut self, address: impl Into<String>) -> Result<()> {
        let candidate = UdpConfig {
            address: address.into(),
            port: self.config.port,
        };
        candidate.socket_addr()?;
        self.config = candidate;

        if self.is_connected() {
            tracing::info!("reconnecting to {}", self.config.address);
            self.connect()?;
        }
        Ok(())
    }
}

impl Transport for UdpTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;
        tracing::trace!("sending datagram: {} bytes", data.len());
        socket.send(data)?;
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        let socket = self.socket.as_ref().ok_or(Error::NotConnected)?;
        match socket.recv(&mut self.buf[..]) {
            Ok(n) => {
                tracing::trace!("received datagram: {} bytes", n);
                Ok(Some(Bytes::copy_from_slice(&self.buf[..n])))
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            // ICMP port unreachable from an earlier send, nothing to read
            Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_udp_config_defaults() {
        let config = UdpConfig::default();
        assert_eq!(config.address, DEFAULT_ADDRESS);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(
            config.socket_addr().unwrap(),
            "192.168.0.111:21105".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_udp_config_builder() {
        let config = UdpConfig::new("10.0.0.5").port(4000);
        assert_eq!(config.address, "10.0.0.5");
        assert_eq!(config.port, 4000);
    }

    #[test]
    fn test_invalid_address() {
        let config = UdpConfig::new("not-an-ip");
        assert!(matches!(
            config.socket_addr(),
            Err(Error::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_set_ip_address_rejects_garbage() {
        let mut transport = UdpTransport::new(UdpConfig::default());
        assert!(transport.set_ip_address("999.1.1.1").is_err());
        assert_eq!(transport.ip_address(), DEFAULT_ADDRESS);

        transport.set_ip_address("192.168.1.20").unwrap();
        assert_eq!(transport.ip_address(), "192.168.1.20");
        assert!(!transport.is_connected());
    }

    #[test]
    fn test_not_connected() {
        let mut transport = UdpTransport::new(UdpConfig::default());
        assert!(matches!(transport.send(&[0x04, 0x00, 0x30, 0x00]), Err(Error::NotConnected)));
        assert!(matches!(transport.try_recv(), Err(Error::NotConnected)));
    }

    #[test]
    fn test_loopback_round_trip() {
        let station = UdpSocket::bind("127.0.0.1:0").unwrap();
        let port = station.local_addr().unwrap().port();

        let mut transport = UdpTransport::new(UdpConfig::new("127.0.0.1").port(port));
        transport.connect().unwrap();
        assert!(transport.try_recv().unwrap().is_none());

        transport.send(&[0x04, 0x00, 0x85, 0x00]).unwrap();
        let mut buf = [0u8; 64];
        let (n, client) = station.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[0x04, 0x00, 0x85, 0x00]);

        station.send_to(&[0x05, 0x00, 0x40, 0x00, 0x81], client).unwrap();
        let mut received = None;
        for _ in 0..100 {
            received = transport.try_recv().unwrap();
            if received.is_some() {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(5));
        }
        assert_eq!(received.unwrap().as_ref(), &[0x05, 0x00, 0x40, 0x00, 0x81]);
    }
}
