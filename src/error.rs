//! Error types for the z21 library.

use thiserror::Error;

/// The main error type for z21 operations.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error from the transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame encoding/decoding error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// Malformed message from the command station.
    #[error("protocol error: {message}")]
    Protocol { message: String },

    /// A caller-supplied value is outside the range the protocol accepts.
    #[error("{what} out of range: {value} not in {min}..={max}")]
    OutOfRange {
        what: &'static str,
        value: i64,
        min: i64,
        max: i64,
    },

    /// The command station address could not be parsed.
    #[error("invalid address: {reason}")]
    InvalidAddress { reason: String },

    /// The observer set is full.
    #[error("observer limit reached ({max})")]
    TooManyObservers { max: usize },

    /// Transport is not connected.
    #[error("not connected")]
    NotConnected,
}

impl Error {
    pub(crate) fn out_of_range(what: &'static str, value: i64, min: i64, max: i64) -> Self {
        Self::OutOfRange {
            what,
            value,
            min,
            max,
        }
    }
}

/// Frame-specific errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FrameError {
    /// Not enough bytes for the length and header fields.
    #[error("frame too short: need at least 4 bytes, got {0}")]
    TooShort(usize),

    /// Declared length is impossible or exceeds the bytes received.
    #[error("length mismatch: frame declares {declared} bytes, {available} available")]
    LengthMismatch { declared: usize, available: usize },
}

/// Result type alias for z21 operations.
pub type Result<T> = std::result::Result<T, Error>;
