//! Binary data parsing for Z21 replies and pushes.
//!
//! Parsers take the frame data after the LAN header. For X-Bus messages
//! they take the bytes after the X-Header with the trailing checksum
//! already removed (see [`xbus_body`]).

use bytes::Buf;

use crate::error::{Error, Result};
use crate::protocol::mapping::{
    decode_cv_address, decode_functions, decode_loco_address, decode_speed,
};
use crate::types::{
    AccessoryInfo, BroadcastFlags, Direction, FirmwareVersion, HardwareInfo, HardwareType,
    LocoInfo, MAX_CV, SpeedSteps, SystemStateData, TurnoutPosition,
};

fn too_short(what: &str, len: usize) -> Error {
    Error::Protocol {
        message: format!("{what} too short: {len} bytes"),
    }
}

/// Splits X-Bus frame data into `(x_header, body)`.
///
/// The last byte is the checksum and is dropped without being verified.
#[must_use]
pub fn xbus_body(data: &[u8]) -> Option<(u8, &[u8])> {
    match data {
        [x_header, body @ .., _xor] => Some((*x_header, body)),
        [x_header] => Some((*x_header, &[])),
        [] => None,
    }
}

/// Parses the `LAN_GET_SERIAL_NUMBER` reply.
///
/// Format: `[serial:4LE]`
pub fn parse_serial_number(data: &[u8]) -> Result<u32> {
    if data.len() < 4 {
        return Err(too_short("SerialNumber", data.len()));
    }
    Ok(u32::from_le_bytes([data[0], data[1], data[2], data[3]]))
}

/// Parses the `LAN_GET_HWINFO` reply.
///
/// Format: `[hw_type:4LE] [fw_version:4LE BCD]`
pub fn parse_hw_info(data: &[u8]) -> Result<HardwareInfo> {
    if data.len() < 8 {
        return Err(too_short("HwInfo", data.len()));
    }
    let mut cursor = std::io::Cursor::new(data);
    let hardware = HardwareType::from_code(cursor.get_u32_le());
    let fw = cursor.get_u32_le();
    Ok(HardwareInfo {
        hardware,
        firmware: FirmwareVersion::from_bcd((fw >> 8) as u8, fw as u8),
    })
}

/// Parses the `LAN_GET_BROADCASTFLAGS` reply.
///
/// Format: `[flags:4LE]`
pub fn parse_broadcast_flags(data: &[u8]) -> Result<BroadcastFlags> {
    if data.len() < 4 {
        return Err(too_short("BroadcastFlags", data.len()));
    }
    Ok(BroadcastFlags::from_bytes([data[0], data[1], data[2], data[3]]))
}

/// Parses `LAN_SYSTEMSTATE_DATACHANGED`.
///
/// Format:
/// ```text
/// [main_current:2LE] [prog_current:2LE] [filtered_main:2LE] [temp:2LE]
/// [supply_mv:2LE] [vcc_mv:2LE] [central_state:1] [central_state_ex:1]
/// [reserved:1] [capabilities:1]
/// ```
/// The capabilities byte is missing on older firmware.
pub fn parse_system_state(data: &[u8]) -> Result<SystemStateData> {
    if data.len() < 14 {
        return Err(too_short("SystemState", data.len()));
    }
    let mut cursor = std::io::Cursor::new(data);
    let main_current = cursor.get_i16_le();
    let prog_current = cursor.get_i16_le();
    let filtered_main_current = cursor.get_i16_le();
    let temperature = cursor.get_i16_le();
    let supply_voltage = cursor.get_u16_le();
    let vcc_voltage = cursor.get_u16_le();
    let central_state = cursor.get_u8();
    let central_state_ex = cursor.get_u8();
    let capabilities = data.get(15).copied().unwrap_or(0);

    Ok(SystemStateData {
        main_current,
        prog_current,
        filtered_main_current,
        temperature,
        supply_voltage,
        vcc_voltage,
        central_state,
        central_state_ex,
        capabilities,
    })
}

/// Parses the body of `LAN_X_LOCO_INFO`.
///
/// Format: `[adr_msb] [adr_lsb] [0000BKKK] [RVVVVVVV] [0DSLFGHJ] [F5-F12] ...`
///
/// `offset` is subtracted from the wire address.
pub fn parse_loco_info(body: &[u8], offset: i32) -> Result<LocoInfo> {
    if body.len() < 5 {
        return Err(too_short("LocoInfo", body.len()));
    }
    let wire = decode_loco_address(body[0], body[1]);
    let address = i32::from(wire)
        .checked_sub(offset)
        .ok_or_else(|| Error::Protocol {
            message: format!("LocoInfo address {wire} minus offset {offset} overflows"),
        })?;
    let db2 = body[2];
    let db3 = body[3];
    let speed_steps = SpeedSteps::from_bits(db2);

    Ok(LocoInfo {
        address,
        direction: Direction::from_speed_byte(db3),
        speed: decode_speed(db3, speed_steps),
        taken_over: db2 & 0x08 != 0,
        speed_steps,
        functions: decode_functions(&body[4..]),
    })
}

/// Parses the body of `LAN_X_TURNOUT_INFO`.
///
/// Format: `[adr_msb] [adr_lsb] [000000ZZ]`
pub fn parse_turnout_info(body: &[u8]) -> Result<AccessoryInfo> {
    if body.len() < 3 {
        return Err(too_short("TurnoutInfo", body.len()));
    }
    Ok(AccessoryInfo {
        address: u16::from_be_bytes([body[0], body[1]]),
        position: TurnoutPosition::from_zz(body[2]),
    })
}

/// Parses the body of `LAN_X_CV_RESULT` into `(cv, value)`.
///
/// Format: `[0x14] [cv_msb] [cv_lsb] [value]`
pub fn parse_cv_result(body: &[u8]) -> Result<(u16, u8)> {
    if body.len() < 4 {
        return Err(too_short("CvResult", body.len()));
    }
    match decode_cv_address(body[1], body[2]) {
        Some(cv) if cv <= MAX_CV => Ok((cv, body[3])),
        _ => Err(Error::Protocol {
            message: format!("CvResult address {:02x}{:02x} out of range", body[1], body[2]),
        }),
    }
}

/// Parses the body of the firmware version reply.
///
/// Format: `[0x0A] [major:BCD] [minor:BCD]`
pub fn parse_firmware_version(body: &[u8]) -> Result<FirmwareVersion> {
    if body.len() < 3 {
        return Err(too_short("FirmwareVersion", body.len()));
    }
    Ok(FirmwareVersion::from_bcd(body[1], body[2]))
}

/// Parses the body of `LAN_X_GET_VERSION` into `(xbus_version, station_id)`.
///
/// Format: `[0x21] [xbus_version:BCD] [station_id]`
pub fn parse_version(body: &[u8]) -> Result<(String, u8)> {
    if body.len() < 3 {
        return Err(too_short("Version", body.len()));
    }
    let version = body[1];
    Ok((format!("{}.{}", version >> 4, version & 0x0F), body[2]))
}
