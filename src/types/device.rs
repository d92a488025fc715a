//! Command station identity and diagnostic values.

use std::fmt;

use tokio::time::Instant;

use crate::types::state::SystemStateData;

/// Placeholder shown for values that have not been queried yet.
pub const NOT_YET_READ: &str = "(not yet read)";

/// Hardware variant reported by `LAN_GET_HWINFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareType {
    /// Black Z21 (2012).
    Z21Old,
    /// Black Z21 (2013 and later).
    Z21New,
    /// SmartRail.
    SmartRail,
    /// White z21 small.
    Z21Small,
    /// z21 start.
    Z21Start,
    /// Single booster.
    SingleBooster,
    /// Dual booster.
    DualBooster,
    /// Z21 XL.
    Z21Xl,
    /// XL booster.
    XlBooster,
    /// Switch decoder.
    SwitchDecoder,
    /// Signal decoder.
    SignalDecoder,
    /// Anything else.
    Other(u32),
}

impl HardwareType {
    /// Parses the hardware type code.
    #[must_use]
    pub const fn from_code(code: u32) -> Self {
        match code {
            0x0000_0200 => Self::Z21Old,
            0x0000_0201 => Self::Z21New,
            0x0000_0202 => Self::SmartRail,
            0x0000_0203 => Self::Z21Small,
            0x0000_0204 => Self::Z21Start,
            0x0000_0205 => Self::SingleBooster,
            0x0000_0206 => Self::DualBooster,
            0x0000_0211 => Self::Z21Xl,
            0x0000_0212 => Self::XlBooster,
            0x0000_0301 => Self::SwitchDecoder,
            0x0000_0302 => Self::SignalDecoder,
            other => Self::Other(other),
        }
    }
}

impl fmt::Display for HardwareType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Z21Old => f.write_str("Z21 (2012)"),
            Self::Z21New => f.write_str("Z21 (2013)"),
            Self::SmartRail => f.write_str("SmartRail"),
            Self::Z21Small => f.write_str("z21 small"),
            Self::Z21Start => f.write_str("z21 start"),
            Self::SingleBooster => f.write_str("single booster"),
            Self::DualBooster => f.write_str("dual booster"),
            Self::Z21Xl => f.write_str("Z21 XL"),
            Self::XlBooster => f.write_str("XL booster"),
            Self::SwitchDecoder => f.write_str("switch decoder"),
            Self::SignalDecoder => f.write_str("signal decoder"),
            Self::Other(code) => write!(f, "unknown (0x{code:08x})"),
        }
    }
}

/// Reply to `LAN_GET_HWINFO`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareInfo {
    /// Hardware variant.
    pub hardware: HardwareType,
    /// Firmware version as "major.minor".
    pub firmware: FirmwareVersion,
}

/// BCD-encoded firmware version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// Major version.
    pub major: u8,
    /// Minor version.
    pub minor: u8,
}

impl FirmwareVersion {
    /// Decodes two BCD bytes (`0x01 0x42` is 1.42).
    #[must_use]
    pub const fn from_bcd(major: u8, minor: u8) -> Self {
        Self {
            major: bcd(major),
            minor: bcd(minor),
        }
    }
}

const fn bcd(byte: u8) -> u8 {
    (byte >> 4) * 10 + (byte & 0x0F)
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.major, self.minor)
    }
}

/// Diagnostic values collected from query replies and pushes.
///
/// Values start out as [`NOT_YET_READ`] and are overwritten whenever a new
/// reply arrives. They never expire.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    /// Firmware version.
    pub firmware_version: String,
    /// Hardware variant.
    pub hardware_version: String,
    /// Serial number.
    pub serial_number: String,
    /// X-Bus protocol version.
    pub xbus_version: String,
    /// Command station id.
    pub command_station_id: String,
    /// Main track current.
    pub main_current: String,
    /// Programming track current.
    pub prog_current: String,
    /// Internal temperature.
    pub temperature: String,
    /// Input voltage too low (last system state).
    pub low_voltage: bool,
    /// Temperature too high (last system state).
    pub high_temperature: bool,
    /// Last system state push, if any.
    pub system_state: Option<SystemStateData>,
    /// When the last datagram was received.
    pub last_received: Option<Instant>,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Self {
            firmware_version: NOT_YET_READ.into(),
            hardware_version: NOT_YET_READ.into(),
            serial_number: NOT_YET_READ.into(),
            xbus_version: NOT_YET_READ.into(),
            command_station_id: NOT_YET_READ.into(),
            main_current: NOT_YET_READ.into(),
            prog_current: NOT_YET_READ.into(),
            temperature: NOT_YET_READ.into(),
            low_voltage: false,
            high_temperature: false,
            system_state: None,
            last_received: None,
        }
    }
}

impl Diagnostics {
    /// Stores the values of a system state push.
    pub fn apply_system_state(&mut self, data: &SystemStateData) {
        self.main_current = format!("{} mA", data.main_current);
        self.prog_current = format!("{} mA", data.prog_current);
        self.temperature = format!("{} °C", data.temperature);
        self.low_voltage = data.low_voltage();
        self.high_temperature = data.high_temperature();
        self.system_state = Some(*data);
    }

    /// Stores a hardware info reply.
    pub fn apply_hw_info(&mut self, info: &HardwareInfo) {
        self.hardware_version = info.hardware.to_string();
        self.firmware_version = info.firmware.to_string();
    }
}
