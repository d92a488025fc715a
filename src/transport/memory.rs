//! In-memory transport.
//!
//! Inbound datagrams are queued with [`MemoryTransport::push_inbound`] and
//! handed out one per `try_recv`. Everything sent is recorded. Clones share
//! the same queues, so a test can keep a handle after moving the transport
//! into a client.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use crate::error::Result;
use crate::transport::Transport;

#[derive(Debug, Default)]
struct Queues {
    inbound: VecDeque<Bytes>,
    sent: Vec<Bytes>,
}

/// Scripted transport for tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    queues: Arc<Mutex<Queues>>,
}

impl MemoryTransport {
    /// Creates an empty transport.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Queues> {
        self.queues
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Queues a datagram for the next `try_recv`.
    pub fn push_inbound(&self, datagram: impl Into<Bytes>) {
        self.lock().inbound.push_back(datagram.into());
    }

    /// Number of queued inbound datagrams.
    #[must_use]
    pub fn pending_inbound(&self) -> usize {
        self.lock().inbound.len()
    }

    /// All datagrams sent so far.
    #[must_use]
    pub fn sent(&self) -> Vec<Bytes> {
        self.lock().sent.clone()
    }

    /// Returns and forgets all datagrams sent so far.
    pub fn take_sent(&self) -> Vec<Bytes> {
        std::mem::take(&mut self.lock().sent)
    }
}

impl Transport for MemoryTransport {
    fn send(&mut self, data: &[u8]) -> Result<()> {
        self.lock().sent.push(Bytes::copy_from_slice(data));
        Ok(())
    }

    fn try_recv(&mut self) -> Result<Option<Bytes>> {
        Ok(self.lock().inbound.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_fifo() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(vec![1u8]);
        transport.push_inbound(vec![2u8]);
        assert_eq!(transport.pending_inbound(), 2);

        assert_eq!(transport.try_recv().unwrap().unwrap().as_ref(), &[1]);
        assert_eq!(transport.try_recv().unwrap().unwrap().as_ref(), &[2]);
        assert!(transport.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_clones_share_queues() {
        let handle = MemoryTransport::new();
        let mut transport = handle.clone();
        transport.send(&[0x04, 0x00, 0x30, 0x00]).unwrap();

        assert_eq!(handle.sent().len(), 1);
        assert_eq!(handle.take_sent()[0].as_ref(), &[0x04, 0x00, 0x30, 0x00]);
        assert!(handle.sent().is_empty());
    }
}
