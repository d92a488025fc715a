//! Decoder programming types.

use std::time::Duration;

/// Highest CV number (CVs are numbered from 1).
pub const MAX_CV: u16 = 1024;

/// Time after which an unanswered service-mode request is reported as timed out.
pub const PROG_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of a CV read or write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgResult {
    /// The decoder acknowledged; `value` is the CV content.
    Success { cv: u16, value: u8 },
    /// The programming track reported a short circuit.
    ShortCircuit,
    /// The decoder did not acknowledge.
    DataNotFound,
    /// No answer arrived within [`PROG_TIMEOUT`].
    Timeout,
}

impl ProgResult {
    /// Returns true for [`ProgResult::Success`].
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Returns the CV value if the operation succeeded.
    #[must_use]
    pub const fn value(&self) -> Option<u8> {
        match self {
            Self::Success { value, .. } => Some(*value),
            _ => None,
        }
    }
}
