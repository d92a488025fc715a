//! Transport layer for Z21 communication.
//!
//! The protocol core never touches sockets. A [`Transport`] moves whole
//! datagrams: one `send` per command, one non-blocking `try_recv` per poll.
//! [`UdpTransport`] talks to a real command station; [`MemoryTransport`]
//! scripts traffic for tests.

pub mod memory;
pub mod udp;

use bytes::Bytes;

use crate::error::Result;

/// Trait for transport implementations.
pub trait Transport: Send {
    /// Sends one datagram.
    fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Returns the next received datagram, or `None` if nothing is waiting.
    ///
    /// Never blocks.
    fn try_recv(&mut self) -> Result<Option<Bytes>>;
}

pub use memory::MemoryTransport;
pub use udp::{DEFAULT_ADDRESS, DEFAULT_PORT, UdpConfig, UdpTransport};
