//! Command encoders for Z21 operations.
//!
//! [`CommandEncoder`] validates caller input, applies the loco address
//! offset and builds the complete frame for every outbound request. It does
//! no I/O; the client hands the resulting [`Command`] to the transport.
//!
//! Out-of-range input is rejected with [`Error::OutOfRange`] before anything
//! is built. Values are never clamped.

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::frame::encode;
use crate::protocol::mapping::{
    DCC_EMERGENCY_STOP, encode_cv_address, encode_function_switch, encode_loco_address,
    user_to_dcc_speed,
};
use crate::protocol::packet::{LanHeader, db0, xheader};
use crate::types::{
    BroadcastFlags, Direction, MAX_ACCESSORY_ADDR, MAX_CV, MAX_FUNCTIONS, MAX_LOCO_ADDR, MAX_SPEED,
    TurnoutPosition,
};

/// An encoded request ready to send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    /// Protocol name of the message, used for tracing.
    pub name: &'static str,
    /// Complete frame bytes.
    pub bytes: Bytes,
}

impl Command {
    fn lan(name: &'static str, header: LanHeader, payload: &[u8]) -> Self {
        Self {
            name,
            bytes: encode(header.into(), payload, false),
        }
    }

    fn xbus(name: &'static str, payload: &[u8]) -> Self {
        Self {
            name,
            bytes: encode(LanHeader::XBus.into(), payload, true),
        }
    }
}

/// Builds outbound frames.
#[derive(Debug, Clone, Default)]
pub struct CommandEncoder {
    addr_offset: i32,
    last_controlled_address: Option<u16>,
}

impl CommandEncoder {
    /// Creates an encoder with no address offset.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the offset added to every loco address before it goes on the wire.
    pub fn set_addr_offset(&mut self, offset: i32) {
        self.addr_offset = offset;
    }

    /// Current address offset.
    #[must_use]
    pub const fn addr_offset(&self) -> i32 {
        self.addr_offset
    }

    /// Wire address of the loco most recently commanded.
    ///
    /// Last write wins; there is no coordination with other controllers.
    #[must_use]
    pub const fn last_controlled_address(&self) -> Option<u16> {
        self.last_controlled_address
    }

    /// Validates a user loco address and maps it to the wire address.
    pub fn wire_loco_address(&self, addr: i32) -> Result<u16> {
        let max = i64::from(MAX_LOCO_ADDR);
        if !(0..=max).contains(&i64::from(addr)) {
            return Err(Error::out_of_range("loco address", addr.into(), 0, max));
        }
        let wire = i64::from(addr) + i64::from(self.addr_offset);
        if !(0..=max).contains(&wire) {
            return Err(Error::out_of_range("wire loco address", wire, 0, max));
        }
        Ok(wire as u16)
    }

    fn loco(&mut self, addr: i32) -> Result<(u8, u8)> {
        let wire = self.wire_loco_address(addr)?;
        self.last_controlled_address = Some(wire);
        Ok(encode_loco_address(wire))
    }

    // ==================== System Commands ====================

    /// `LAN_X_SET_TRACK_POWER_ON` / `_OFF`.
    #[must_use]
    pub fn set_track_power(&self, on: bool) -> Command {
        if on {
            Command::xbus(
                "LAN_X_SET_TRACK_POWER_ON",
                &[xheader::SYSTEM, db0::TRACK_POWER_ON],
            )
        } else {
            Command::xbus(
                "LAN_X_SET_TRACK_POWER_OFF",
                &[xheader::SYSTEM, db0::TRACK_POWER_OFF],
            )
        }
    }

    /// `LAN_X_SET_STOP`: emergency stop for all locos, track power stays on.
    #[must_use]
    pub fn set_stop(&self) -> Command {
        Command::xbus("LAN_X_SET_STOP", &[xheader::SET_STOP])
    }

    /// `LAN_SET_BROADCASTFLAGS`.
    #[must_use]
    pub fn set_broadcast_flags(&self, flags: BroadcastFlags) -> Command {
        Command::lan(
            "LAN_SET_BROADCASTFLAGS",
            LanHeader::SetBroadcastFlags,
            &flags.to_bytes(),
        )
    }

    /// `LAN_GET_BROADCASTFLAGS`.
    #[must_use]
    pub fn get_broadcast_flags(&self) -> Command {
        Command::lan("LAN_GET_BROADCASTFLAGS", LanHeader::GetBroadcastFlags, &[])
    }

    /// `LAN_SYSTEMSTATE_GETDATA`.
    #[must_use]
    pub fn get_system_state(&self) -> Command {
        Command::lan("LAN_SYSTEMSTATE_GETDATA", LanHeader::SystemStateGetData, &[])
    }

    /// `LAN_GET_SERIAL_NUMBER`.
    #[must_use]
    pub fn get_serial_number(&self) -> Command {
        Command::lan("LAN_GET_SERIAL_NUMBER", LanHeader::SerialNumber, &[])
    }

    /// `LAN_GET_HWINFO`.
    #[must_use]
    pub fn get_hw_info(&self) -> Command {
        Command::lan("LAN_GET_HWINFO", LanHeader::HwInfo, &[])
    }

    /// `LAN_LOGOFF`.
    #[must_use]
    pub fn logoff(&self) -> Command {
        Command::lan("LAN_LOGOFF", LanHeader::Logoff, &[])
    }

    /// `LAN_X_GET_FIRMWARE_VERSION`.
    #[must_use]
    pub fn get_firmware_version(&self) -> Command {
        Command::xbus(
            "LAN_X_GET_FIRMWARE_VERSION",
            &[xheader::GET_FIRMWARE_VERSION, db0::FIRMWARE_VERSION],
        )
    }

    /// `LAN_X_GET_VERSION`.
    #[must_use]
    pub fn get_version(&self) -> Command {
        Command::xbus("LAN_X_GET_VERSION", &[xheader::SYSTEM, db0::GET_VERSION])
    }

    /// `LAN_X_GET_STATUS`.
    #[must_use]
    pub fn get_status(&self) -> Command {
        Command::xbus("LAN_X_GET_STATUS", &[xheader::SYSTEM, db0::GET_STATUS])
    }

    // ==================== Loco Commands ====================

    /// `LAN_X_SET_LOCO_DRIVE` in 128 speed step mode.
    ///
    /// `speed` is the user speed 0–126.
    pub fn set_loco_drive(
        &mut self,
        addr: i32,
        direction: Direction,
        speed: u8,
    ) -> Result<Command> {
        if speed > MAX_SPEED {
            return Err(Error::out_of_range(
                "speed",
                speed.into(),
                0,
                MAX_SPEED.into(),
            ));
        }
        self.drive("LAN_X_SET_LOCO_DRIVE", addr, direction, user_to_dcc_speed(speed))
    }

    /// Emergency stop for a single loco (DCC speed 1).
    pub fn loco_stop(&mut self, addr: i32, direction: Direction) -> Result<Command> {
        self.drive("LAN_X_SET_LOCO_DRIVE", addr, direction, DCC_EMERGENCY_STOP)
    }

    fn drive(
        &mut self,
        name: &'static str,
        addr: i32,
        direction: Direction,
        dcc_speed: u8,
    ) -> Result<Command> {
        let (msb, lsb) = self.loco(addr)?;
        Ok(Command::xbus(
            name,
            &[
                xheader::LOCO_DRIVE,
                db0::LOCO_DRIVE_128,
                msb,
                lsb,
                direction.bit() | dcc_speed,
            ],
        ))
    }

    /// `LAN_X_SET_LOCO_FUNCTION`: switch one function on or off.
    pub fn set_loco_function(&mut self, addr: i32, function: u8, on: bool) -> Result<Command> {
        if usize::from(function) >= MAX_FUNCTIONS {
            return Err(Error::out_of_range(
                "function",
                function.into(),
                0,
                MAX_FUNCTIONS as i64 - 1,
            ));
        }
        let (msb, lsb) = self.loco(addr)?;
        Ok(Command::xbus(
            "LAN_X_SET_LOCO_FUNCTION",
            &[
                xheader::LOCO_DRIVE,
                db0::LOCO_FUNCTION,
                msb,
                lsb,
                encode_function_switch(function, on),
            ],
        ))
    }

    /// `LAN_X_GET_LOCO_INFO`.
    pub fn get_loco_info(&mut self, addr: i32) -> Result<Command> {
        let (msb, lsb) = self.loco(addr)?;
        Ok(Command::xbus(
            "LAN_X_GET_LOCO_INFO",
            &[xheader::GET_LOCO_INFO, db0::GET_LOCO_INFO, msb, lsb],
        ))
    }

    // ==================== Accessory Commands ====================

    /// `LAN_X_SET_TURNOUT`: activate one output of an accessory decoder.
    ///
    /// Deactivation timing is left to the decoder.
    pub fn set_turnout(&self, addr: u16, position: TurnoutPosition) -> Result<Command> {
        check_accessory(addr)?;
        let [msb, lsb] = addr.to_be_bytes();
        // 10Q0A00P: A = activate
        let mode = 0x80 | 0x08 | position.output_bit();
        Ok(Command::xbus(
            "LAN_X_SET_TURNOUT",
            &[xheader::SET_TURNOUT, msb, lsb, mode],
        ))
    }

    /// `LAN_X_GET_TURNOUT_INFO`.
    pub fn get_turnout_info(&self, addr: u16) -> Result<Command> {
        check_accessory(addr)?;
        let [msb, lsb] = addr.to_be_bytes();
        Ok(Command::xbus(
            "LAN_X_GET_TURNOUT_INFO",
            &[xheader::TURNOUT_INFO, msb, lsb],
        ))
    }

    // ==================== Programming Commands ====================

    /// `LAN_X_CV_READ` on the programming track.
    pub fn cv_read(&self, cv: u16) -> Result<Command> {
        check_cv(cv)?;
        let (msb, lsb) = encode_cv_address(cv);
        Ok(Command::xbus(
            "LAN_X_CV_READ",
            &[xheader::CV_READ, db0::CV_READ, msb, lsb],
        ))
    }

    /// `LAN_X_CV_WRITE` on the programming track.
    pub fn cv_write(&self, cv: u16, value: u8) -> Result<Command> {
        check_cv(cv)?;
        let (msb, lsb) = encode_cv_address(cv);
        Ok(Command::xbus(
            "LAN_X_CV_WRITE",
            &[xheader::CV_WRITE, db0::CV_WRITE, msb, lsb, value],
        ))
    }

    /// `LAN_X_CV_POM_WRITE_BYTE`: write a CV on the main track.
    pub fn pom_write_byte(&mut self, addr: i32, cv: u16, value: u8) -> Result<Command> {
        check_cv(cv)?;
        let (loco_msb, loco_lsb) = self.loco(addr)?;
        let (cv_msb, cv_lsb) = encode_cv_address(cv);

        let mut buf = BytesMut::with_capacity(7);
        buf.put_u8(xheader::CV_POM);
        buf.put_u8(db0::CV_POM);
        buf.put_u8(loco_msb);
        buf.put_u8(loco_lsb);
        // 111011MM: write byte, MM = CV address bits 8-9
        buf.put_u8(0xEC | (cv_msb & 0x03));
        buf.put_u8(cv_lsb);
        buf.put_u8(value);

        Ok(Command::xbus("LAN_X_CV_POM_WRITE_BYTE", &buf))
    }
}

fn check_accessory(addr: u16) -> Result<()> {
    if addr > MAX_ACCESSORY_ADDR {
        return Err(Error::out_of_range(
            "accessory address",
            addr.into(),
            0,
            MAX_ACCESSORY_ADDR.into(),
        ));
    }
    Ok(())
}

fn check_cv(cv: u16) -> Result<()> {
    if !(1..=MAX_CV).contains(&cv) {
        return Err(Error::out_of_range("CV", cv.into(), 1, MAX_CV.into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_power_frames() {
        let enc = CommandEncoder::new();
        assert_eq!(
            &enc.set_track_power(true).bytes[..],
            &[0x07, 0x00, 0x40, 0x00, 0x21, 0x81, 0xA0]
        );
        assert_eq!(
            &enc.set_track_power(false).bytes[..],
            &[0x07, 0x00, 0x40, 0x00, 0x21, 0x80, 0xA1]
        );
    }

    #[test]
    fn test_query_frames() {
        let enc = CommandEncoder::new();
        assert_eq!(&enc.get_serial_number().bytes[..], &[0x04, 0x00, 0x10, 0x00]);
        assert_eq!(&enc.get_hw_info().bytes[..], &[0x04, 0x00, 0x1A, 0x00]);
        assert_eq!(&enc.get_system_state().bytes[..], &[0x04, 0x00, 0x85, 0x00]);
        assert_eq!(&enc.get_broadcast_flags().bytes[..], &[0x04, 0x00, 0x51, 0x00]);
        assert_eq!(
            &enc.get_status().bytes[..],
            &[0x07, 0x00, 0x40, 0x00, 0x21, 0x24, 0x05]
        );
        assert_eq!(
            &enc.get_version().bytes[..],
            &[0x07, 0x00, 0x40, 0x00, 0x21, 0x21, 0x00]
        );
        assert_eq!(
            &enc.get_firmware_version().bytes[..],
            &[0x07, 0x00, 0x40, 0x00, 0xF1, 0x0A, 0xFB]
        );
        assert_eq!(&enc.set_stop().bytes[..], &[0x06, 0x00, 0x40, 0x00, 0x80, 0x80]);
    }

    #[test]
    fn test_set_broadcast_flags() {
        let enc = CommandEncoder::new();
        let cmd = enc.set_broadcast_flags(BroadcastFlags::BASIC | BroadcastFlags::SYSTEM_STATE);
        assert_eq!(
            &cmd.bytes[..],
            &[0x08, 0x00, 0x50, 0x00, 0x01, 0x01, 0x00, 0x00]
        );
    }

    #[test]
    fn test_loco_drive() {
        let mut enc = CommandEncoder::new();
        let cmd = enc.set_loco_drive(3, Direction::Forward, 10).unwrap();
        // speed 10 → DCC 11, forward bit set
        assert_eq!(
            &cmd.bytes[..],
            &[0x0A, 0x00, 0x40, 0x00, 0xE4, 0x13, 0x00, 0x03, 0x8B, 0xE4 ^ 0x13 ^ 0x03 ^ 0x8B]
        );
        assert_eq!(enc.last_controlled_address(), Some(3));
    }

    #[test]
    fn test_loco_drive_long_address() {
        let mut enc = CommandEncoder::new();
        let cmd = enc.set_loco_drive(1000, Direction::Backward, 0).unwrap();
        assert_eq!(&cmd.bytes[6..9], &[0xC3, 0xE8, 0x00]);
    }

    #[test]
    fn test_loco_drive_is_deterministic() {
        let mut enc = CommandEncoder::new();
        let a = enc.set_loco_drive(42, Direction::Forward, 64).unwrap();
        let b = enc.set_loco_drive(42, Direction::Forward, 64).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_speed_boundaries() {
        let mut enc = CommandEncoder::new();
        let max = enc.set_loco_drive(3, Direction::Forward, 126).unwrap();
        assert_eq!(max.bytes[8], 0x80 | 127);
        let stop = enc.set_loco_drive(3, Direction::Backward, 0).unwrap();
        assert_eq!(stop.bytes[8], 0x00);
        assert!(matches!(
            enc.set_loco_drive(3, Direction::Forward, 127),
            Err(Error::OutOfRange { what: "speed", .. })
        ));
    }

    #[test]
    fn test_loco_stop_uses_emergency_step() {
        let mut enc = CommandEncoder::new();
        let cmd = enc.loco_stop(3, Direction::Forward).unwrap();
        assert_eq!(cmd.bytes[8], 0x81);
    }

    #[test]
    fn test_address_boundaries() {
        let mut enc = CommandEncoder::new();
        assert!(enc.set_loco_drive(0, Direction::Forward, 0).is_ok());
        assert!(enc.set_loco_drive(9999, Direction::Forward, 0).is_ok());
        assert!(enc.set_loco_drive(10_000, Direction::Forward, 0).is_err());
        assert!(enc.set_loco_drive(-1, Direction::Forward, 0).is_err());
    }

    #[test]
    fn test_address_offset() {
        let mut enc = CommandEncoder::new();
        enc.set_addr_offset(10);
        let cmd = enc.set_loco_drive(5, Direction::Forward, 0).unwrap();
        assert_eq!(&cmd.bytes[6..8], &[0x00, 15]);
        assert_eq!(enc.last_controlled_address(), Some(15));

        // 9995 + 10 leaves the legal range
        let err = enc.set_loco_drive(9995, Direction::Forward, 0).unwrap_err();
        assert!(matches!(
            err,
            Error::OutOfRange {
                what: "wire loco address",
                value: 10_005,
                ..
            }
        ));
    }

    #[test]
    fn test_negative_offset() {
        let mut enc = CommandEncoder::new();
        enc.set_addr_offset(-3);
        assert_eq!(enc.wire_loco_address(5).unwrap(), 2);
        assert!(enc.wire_loco_address(2).is_err());
    }

    #[test]
    fn test_rejected_command_keeps_last_address() {
        let mut enc = CommandEncoder::new();
        enc.set_loco_drive(7, Direction::Forward, 1).unwrap();
        assert!(enc.set_loco_drive(8, Direction::Forward, 200).is_err());
        assert_eq!(enc.last_controlled_address(), Some(7));
    }

    #[test]
    fn test_loco_function() {
        let mut enc = CommandEncoder::new();
        let cmd = enc.set_loco_function(3, 4, true).unwrap();
        assert_eq!(&cmd.bytes[4..9], &[0xE4, 0xF8, 0x00, 0x03, 0x44]);
        let cmd = enc.set_loco_function(3, 30, false).unwrap();
        assert_eq!(cmd.bytes[8], 0x1E);
        assert!(enc.set_loco_function(3, 31, true).is_err());
    }

    #[test]
    fn test_get_loco_info() {
        let mut enc = CommandEncoder::new();
        let cmd = enc.get_loco_info(3).unwrap();
        assert_eq!(
            &cmd.bytes[..],
            &[0x09, 0x00, 0x40, 0x00, 0xE3, 0xF0, 0x00, 0x03, 0xE3 ^ 0xF0 ^ 0x03]
        );
    }

    #[test]
    fn test_turnout() {
        let enc = CommandEncoder::new();
        let cmd = enc.set_turnout(5, TurnoutPosition::Diverging).unwrap();
        assert_eq!(
            &cmd.bytes[..],
            &[0x09, 0x00, 0x40, 0x00, 0x53, 0x00, 0x05, 0x89, 0x53 ^ 0x05 ^ 0x89]
        );
        let cmd = enc.set_turnout(5, TurnoutPosition::Straight).unwrap();
        assert_eq!(cmd.bytes[7], 0x88);
        assert!(enc.set_turnout(4096, TurnoutPosition::Straight).is_err());
        assert!(enc.get_turnout_info(4095).is_ok());
    }

    #[test]
    fn test_cv_commands() {
        let enc = CommandEncoder::new();
        let read = enc.cv_read(29).unwrap();
        assert_eq!(&read.bytes[4..9], &[0x23, 0x11, 0x00, 0x1C, 0x23 ^ 0x11 ^ 0x1C]);

        let write = enc.cv_write(1, 3).unwrap();
        assert_eq!(&write.bytes[4..10], &[0x24, 0x12, 0x00, 0x00, 0x03, 0x24 ^ 0x12 ^ 0x03]);

        assert!(enc.cv_read(0).is_err());
        assert!(enc.cv_read(1024).is_ok());
        assert!(enc.cv_write(1025, 0).is_err());
    }

    #[test]
    fn test_pom_write_byte() {
        let mut enc = CommandEncoder::new();
        let cmd = enc.pom_write_byte(3, 300, 7).unwrap();
        // CV 300 → wire 299 = 0x012B
        assert_eq!(cmd.bytes[0], 0x0C);
        assert_eq!(&cmd.bytes[4..11], &[0xE6, 0x30, 0x00, 0x03, 0xED, 0x2B, 0x07]);
        assert_eq!(cmd.bytes[11], crate::protocol::checksum(&cmd.bytes[4..11]));
    }
}
