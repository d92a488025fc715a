//! Frame encoding and decoding for the Z21 LAN protocol.
//!
//! Every datagram carries one or more frames:
//! ```text
//! ┌──────────────┬──────────────┬─────────────────┬───────────┐
//! │  len (LE)    │ header (LE)  │    payload      │  xor      │
//! │  2 bytes     │   2 bytes    │   n bytes       │ optional  │
//! └──────────────┴──────────────┴─────────────────┴───────────┘
//! ```
//! `len` counts the whole frame including itself. The XOR byte covers the
//! payload only and is present on X-Bus frames (header `0x40`).

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result as CrateResult};

/// Size of the length and header fields.
pub const FRAME_OVERHEAD: usize = 4;

/// Largest frame the 16-bit length field can describe.
pub const MAX_FRAME_SIZE: usize = u16::MAX as usize;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// LAN header (message class).
    pub header: u16,
    /// Everything after the header, including a trailing checksum if present.
    pub data: Bytes,
}

/// Computes the XOR checksum over a payload.
#[must_use]
pub fn checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0, |acc, b| acc ^ b)
}

/// Encodes a frame.
///
/// # Panics
///
/// Panics if the frame would exceed `MAX_FRAME_SIZE`.
#[must_use]
pub fn encode(header: u16, payload: &[u8], with_checksum: bool) -> Bytes {
    let len = FRAME_OVERHEAD + payload.len() + usize::from(with_checksum);
    assert!(len <= MAX_FRAME_SIZE, "payload exceeds maximum frame size");

    let mut buf = BytesMut::with_capacity(len);
    buf.put_u16_le(len as u16);
    buf.put_u16_le(header);
    buf.put_slice(payload);
    if with_checksum {
        buf.put_u8(checksum(payload));
    }
    buf.freeze()
}

/// Decodes a single frame from the start of `raw`.
///
/// Bytes beyond the declared length are ignored.
pub fn decode(raw: &[u8]) -> Result<Frame, FrameError> {
    let (frame, _) = decode_prefix(raw)?;
    Ok(frame)
}

/// Decodes the frame at the start of `raw`, returning it and its length.
fn decode_prefix(raw: &[u8]) -> Result<(Frame, usize), FrameError> {
    if raw.len() < FRAME_OVERHEAD {
        return Err(FrameError::TooShort(raw.len()));
    }

    let declared = usize::from(u16::from_le_bytes([raw[0], raw[1]]));
    if declared < FRAME_OVERHEAD || declared > raw.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            available: raw.len(),
        });
    }

    let header = u16::from_le_bytes([raw[2], raw[3]]);
    let data = Bytes::copy_from_slice(&raw[FRAME_OVERHEAD..declared]);
    Ok((Frame { header, data }, declared))
}

/// Iterates over the frames packed into one datagram.
///
/// After the first error the iterator is exhausted.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Bytes,
    failed: bool,
}

impl FrameDecoder {
    /// Creates a decoder over a received datagram.
    #[must_use]
    pub fn new(datagram: Bytes) -> Self {
        Self {
            buffer: datagram,
            failed: false,
        }
    }

    /// Returns the number of bytes not yet decoded.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes every frame, failing if any part of the datagram is malformed.
    pub fn decode_all(self) -> Result<Vec<Frame>, FrameError> {
        self.collect()
    }
}

/// Splits one datagram into its frames.
///
/// # Errors
///
/// Returns [`Error::Frame`](crate::Error::Frame) if any part of the
/// datagram is malformed; no frames are returned in that case.
pub fn decode_datagram(datagram: Bytes) -> CrateResult<Vec<Frame>> {
    Ok(FrameDecoder::new(datagram).decode_all()?)
}

impl Iterator for FrameDecoder {
    type Item = Result<Frame, FrameError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.buffer.is_empty() {
            return None;
        }
        match decode_prefix(&self.buffer) {
            Ok((frame, used)) => {
                self.buffer.advance(used);
                Some(Ok(frame))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
