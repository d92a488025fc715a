//! Accessory (turnout) types.

/// Highest accessory address accepted on the wire.
pub const MAX_ACCESSORY_ADDR: u16 = 4095;

/// Requested or reported turnout position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TurnoutPosition {
    /// Output 1 (`P = 0`).
    Straight,
    /// Output 2 (`P = 1`).
    Diverging,
}

impl TurnoutPosition {
    /// Output select bit for `LAN_X_SET_TURNOUT`.
    #[must_use]
    pub const fn output_bit(self) -> u8 {
        match self {
            Self::Straight => 0,
            Self::Diverging => 1,
        }
    }

    /// Parses the `ZZ` bits of a turnout info reply.
    ///
    /// Returns `None` for "not switched yet" (`00`) and "invalid" (`11`).
    #[must_use]
    pub const fn from_zz(bits: u8) -> Option<Self> {
        match bits & 0x03 {
            0x01 => Some(Self::Straight),
            0x02 => Some(Self::Diverging),
            _ => None,
        }
    }
}

/// Accessory state as reported by the command station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccessoryInfo {
    /// Accessory address.
    pub address: u16,
    /// Position, `None` if not switched since power-up or invalid.
    pub position: Option<TurnoutPosition>,
}
