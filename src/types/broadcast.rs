//! Broadcast flags.
//!
//! The flags select which asynchronous messages the command station pushes
//! to this client. They travel as a little-endian `u32` in both
//! `LAN_SET_BROADCASTFLAGS` and the `LAN_GET_BROADCASTFLAGS` reply.

use std::fmt;

/// Broadcast flag set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct BroadcastFlags(u32);

impl BroadcastFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Driving, switching, track power and subscribed loco info.
    pub const BASIC: Self = Self(0x0000_0001);
    /// R-Bus feedback.
    pub const RBUS_FEEDBACK: Self = Self(0x0000_0002);
    /// RailCom data of subscribed locos.
    pub const RAILCOM: Self = Self(0x0000_0004);
    /// System state pushes.
    pub const SYSTEM_STATE: Self = Self(0x0000_0100);
    /// Loco info of every loco.
    pub const ALL_LOCO_INFO: Self = Self(0x0001_0000);
    /// RailCom data of every loco.
    pub const ALL_RAILCOM: Self = Self(0x0004_0000);
    /// CAN occupancy detectors.
    pub const CAN_FEEDBACK: Self = Self(0x0008_0000);
    /// LocoNet messages without locos and switches.
    pub const LOCONET: Self = Self(0x0100_0000);
    /// LocoNet loco messages.
    pub const LOCONET_LOCO: Self = Self(0x0200_0000);
    /// LocoNet switch messages.
    pub const LOCONET_SWITCH: Self = Self(0x0400_0000);
    /// LocoNet occupancy detectors.
    pub const LOCONET_FEEDBACK: Self = Self(0x0800_0000);

    /// Name table shared by encoding, parsing and display.
    pub const NAMED: [(&'static str, Self); 11] = [
        ("BASIC", Self::BASIC),
        ("RBUS_FEEDBACK", Self::RBUS_FEEDBACK),
        ("RAILCOM", Self::RAILCOM),
        ("SYSTEM_STATE", Self::SYSTEM_STATE),
        ("ALL_LOCO_INFO", Self::ALL_LOCO_INFO),
        ("ALL_RAILCOM", Self::ALL_RAILCOM),
        ("CAN_FEEDBACK", Self::CAN_FEEDBACK),
        ("LOCONET", Self::LOCONET),
        ("LOCONET_LOCO", Self::LOCONET_LOCO),
        ("LOCONET_SWITCH", Self::LOCONET_SWITCH),
        ("LOCONET_FEEDBACK", Self::LOCONET_FEEDBACK),
    ];

    /// Mask of all named flags.
    const KNOWN: u32 = {
        let mut mask = 0;
        let mut i = 0;
        while i < Self::NAMED.len() {
            mask |= Self::NAMED[i].1.0;
            i += 1;
        }
        mask
    };

    /// Creates flags from raw bits, dropping bits without a name.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::KNOWN)
    }

    /// Creates flags from the four wire bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 4]) -> Self {
        Self::from_bits(u32::from_le_bytes(bytes))
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns the four wire bytes.
    #[must_use]
    pub const fn to_bytes(self) -> [u8; 4] {
        self.0.to_le_bytes()
    }

    /// Check if all flags in `other` are set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Sets or clears the flags in `other`.
    pub fn set(&mut self, other: Self, on: bool) {
        if on {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    /// Iterates over the names of the flags that are set.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(_, flag)| self.contains(*flag))
            .map(|(name, _)| name)
    }
}

impl std::ops::BitOr for BroadcastFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl fmt::Display for BroadcastFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<_> = self.names().collect();
        if names.is_empty() {
            f.write_str("NONE")
        } else {
            f.write_str(&names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_is_complete_and_disjoint() {
        let mut seen = 0u32;
        for (_, flag) in BroadcastFlags::NAMED {
            assert_eq!(flag.bits().count_ones(), 1);
            assert_eq!(seen & flag.bits(), 0);
            seen |= flag.bits();
        }
        assert_eq!(seen, BroadcastFlags::KNOWN);
    }

    #[test]
    fn test_bytes_use_shared_table() {
        let flags = BroadcastFlags::BASIC | BroadcastFlags::SYSTEM_STATE | BroadcastFlags::LOCONET;
        assert_eq!(flags.to_bytes(), [0x01, 0x01, 0x00, 0x01]);
        assert_eq!(BroadcastFlags::from_bytes(flags.to_bytes()), flags);
    }

    #[test]
    fn test_unknown_bits_dropped() {
        let flags = BroadcastFlags::from_bytes([0x09, 0x00, 0x00, 0x00]);
        assert_eq!(flags, BroadcastFlags::BASIC);
    }

    #[test]
    fn test_display() {
        let mut flags = BroadcastFlags::NONE;
        assert_eq!(flags.to_string(), "NONE");
        flags.set(BroadcastFlags::BASIC, true);
        flags.set(BroadcastFlags::ALL_LOCO_INFO, true);
        assert_eq!(flags.to_string(), "BASIC|ALL_LOCO_INFO");
        flags.set(BroadcastFlags::BASIC, false);
        assert!(!flags.contains(BroadcastFlags::BASIC));
    }
}
