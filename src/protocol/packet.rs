//! LAN header and X-Bus opcode definitions for the Z21 protocol.
//!
//! The LAN header is the 16-bit field following the frame length. Frames
//! with header [`LanHeader::XBus`] carry an X-Bus message whose first byte
//! is the X-Header.

/// LAN headers used by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum LanHeader {
    /// Serial number request/response.
    SerialNumber = 0x10,
    /// Hardware type and firmware request/response.
    HwInfo = 0x1A,
    /// Client logoff.
    Logoff = 0x30,
    /// Tunnelled X-Bus message.
    XBus = 0x40,
    /// Set broadcast flags.
    SetBroadcastFlags = 0x50,
    /// Broadcast flags request/response.
    GetBroadcastFlags = 0x51,
    /// System state push.
    SystemStateChanged = 0x84,
    /// System state request.
    SystemStateGetData = 0x85,
}

impl LanHeader {
    /// Attempts to parse a LAN header.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x10 => Some(Self::SerialNumber),
            0x1A => Some(Self::HwInfo),
            0x30 => Some(Self::Logoff),
            0x40 => Some(Self::XBus),
            0x50 => Some(Self::SetBroadcastFlags),
            0x51 => Some(Self::GetBroadcastFlags),
            0x84 => Some(Self::SystemStateChanged),
            0x85 => Some(Self::SystemStateGetData),
            _ => None,
        }
    }
}

impl From<LanHeader> for u16 {
    fn from(header: LanHeader) -> Self {
        header as Self
    }
}

/// X-Headers (first byte of an X-Bus message).
pub mod xheader {
    /// Outbound: track power, version, status (`21 xx`).
    pub const SYSTEM: u8 = 0x21;
    /// Outbound: CV read (`23 11`).
    pub const CV_READ: u8 = 0x23;
    /// Outbound: CV write (`24 12`).
    pub const CV_WRITE: u8 = 0x24;
    /// Turnout info request and reply.
    pub const TURNOUT_INFO: u8 = 0x43;
    /// Outbound: switch turnout.
    pub const SET_TURNOUT: u8 = 0x53;
    /// Inbound: broadcasts and programming NACKs (`61 xx`).
    pub const BROADCAST: u8 = 0x61;
    /// Inbound: status changed (`62 22`).
    pub const STATUS_CHANGED: u8 = 0x62;
    /// Inbound: X-Bus version (`63 21`).
    pub const VERSION: u8 = 0x63;
    /// Inbound: CV result (`64 14`).
    pub const CV_RESULT: u8 = 0x64;
    /// Emergency stop (`80` outbound, `81 00` inbound).
    pub const SET_STOP: u8 = 0x80;
    /// Inbound: emergency stop broadcast.
    pub const BC_STOPPED: u8 = 0x81;
    /// Outbound: loco info request (`E3 F0`).
    pub const GET_LOCO_INFO: u8 = 0xE3;
    /// Outbound: loco drive and function (`E4 1x` / `E4 F8`).
    pub const LOCO_DRIVE: u8 = 0xE4;
    /// Outbound: programming on main (`E6 30`).
    pub const CV_POM: u8 = 0xE6;
    /// Inbound: loco info.
    pub const LOCO_INFO: u8 = 0xEF;
    /// Outbound: firmware version request (`F1 0A`).
    pub const GET_FIRMWARE_VERSION: u8 = 0xF1;
    /// Inbound: firmware version (`F3 0A`).
    pub const FIRMWARE_VERSION: u8 = 0xF3;
}

/// Second bytes (DB0) qualifying an X-Header.
pub mod db0 {
    /// `21 21`: get version.
    pub const GET_VERSION: u8 = 0x21;
    /// `21 24`: get status.
    pub const GET_STATUS: u8 = 0x24;
    /// `21 80`: track power off.
    pub const TRACK_POWER_OFF: u8 = 0x80;
    /// `21 81`: track power on.
    pub const TRACK_POWER_ON: u8 = 0x81;
    /// `23 11`: CV read.
    pub const CV_READ: u8 = 0x11;
    /// `24 12`: CV write.
    pub const CV_WRITE: u8 = 0x12;
    /// `64 14`: CV result.
    pub const CV_RESULT: u8 = 0x14;
    /// `61 00`: track power off broadcast.
    pub const BC_TRACK_POWER_OFF: u8 = 0x00;
    /// `61 01`: track power on broadcast.
    pub const BC_TRACK_POWER_ON: u8 = 0x01;
    /// `61 02`: programming mode broadcast.
    pub const BC_PROGRAMMING_MODE: u8 = 0x02;
    /// `61 08`: short circuit broadcast.
    pub const BC_SHORT_CIRCUIT: u8 = 0x08;
    /// `61 12`: programming failed with short circuit.
    pub const CV_NACK_SC: u8 = 0x12;
    /// `61 13`: programming failed, no acknowledge.
    pub const CV_NACK: u8 = 0x13;
    /// `61 82`: command not understood.
    pub const UNKNOWN_COMMAND: u8 = 0x82;
    /// `62 22`: status changed.
    pub const STATUS_CHANGED: u8 = 0x22;
    /// `E3 F0`: loco info request.
    pub const GET_LOCO_INFO: u8 = 0xF0;
    /// `E4 13`: drive with 128 speed steps.
    pub const LOCO_DRIVE_128: u8 = 0x13;
    /// `E4 F8`: set loco function.
    pub const LOCO_FUNCTION: u8 = 0xF8;
    /// `E6 30`: POM.
    pub const CV_POM: u8 = 0x30;
    /// `F1 0A` / `F3 0A`: firmware version.
    pub const FIRMWARE_VERSION: u8 = 0x0A;
}

/// Bits of the central state byte (status changed, system state).
pub mod central_state {
    /// Emergency stop is active.
    pub const EMERGENCY_STOP: u8 = 0x01;
    /// Track voltage is switched off.
    pub const TRACK_VOLTAGE_OFF: u8 = 0x02;
    /// Short circuit detected.
    pub const SHORT_CIRCUIT: u8 = 0x04;
    /// Programming mode is active.
    pub const PROGRAMMING_MODE: u8 = 0x20;
}

/// Bits of the extended central state byte (system state only).
pub mod central_state_ex {
    /// Temperature too high.
    pub const HIGH_TEMPERATURE: u8 = 0x01;
    /// Input voltage too low.
    pub const POWER_LOST: u8 = 0x02;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lan_header_from_u16() {
        assert_eq!(LanHeader::from_u16(0x40), Some(LanHeader::XBus));
        assert_eq!(LanHeader::from_u16(0x84), Some(LanHeader::SystemStateChanged));
        assert_eq!(LanHeader::from_u16(0xA0), None);
    }

    #[test]
    fn test_lan_header_into_u16() {
        assert_eq!(u16::from(LanHeader::HwInfo), 0x1A);
        assert_eq!(u16::from(LanHeader::GetBroadcastFlags), 0x51);
    }
}
