//! Conversions between user-facing values and their wire encodings.

use crate::types::{Functions, MAX_FUNCTIONS, SpeedSteps};

/// DCC speed value that commands an emergency stop of a single loco.
pub const DCC_EMERGENCY_STOP: u8 = 1;

/// Maps a user speed (0–126, 0 = stop) to a 128-step DCC speed (0–127).
///
/// Value 1 is skipped because DCC reserves it for emergency stop.
#[must_use]
pub const fn user_to_dcc_speed(user: u8) -> u8 {
    if user == 0 { 0 } else { user + 1 }
}

/// Maps a 128-step DCC speed back to a user speed.
///
/// The emergency stop pulse reads as stop.
#[must_use]
pub const fn dcc_to_user_speed(dcc: u8) -> u8 {
    if dcc <= DCC_EMERGENCY_STOP { 0 } else { dcc - 1 }
}

/// Decodes the speed byte of a loco info message into a user speed.
///
/// The direction bit is ignored.
#[must_use]
pub const fn decode_speed(byte: u8, steps: SpeedSteps) -> u8 {
    match steps {
        SpeedSteps::Steps14 => {
            // 0 stop, 1 emergency stop, 2..=15 → 1..=14
            let v = byte & 0x0F;
            if v <= 1 { 0 } else { v - 1 }
        }
        SpeedSteps::Steps28 => {
            // 000V4V3V2V1 with V5 in bit 4 as intermediate LSB: 0/1 stop, 2/3 emergency stop
            let v = ((byte & 0x0F) << 1) | ((byte >> 4) & 0x01);
            if v <= 3 { 0 } else { v - 3 }
        }
        SpeedSteps::Steps128 => dcc_to_user_speed(byte & 0x7F),
    }
}

/// Encodes a wire loco address as `(MSB, LSB)`.
///
/// Addresses from 128 upwards set the two high bits of the MSB.
#[must_use]
pub const fn encode_loco_address(address: u16) -> (u8, u8) {
    let msb = if address >= 128 {
        0xC0 | (address >> 8) as u8
    } else {
        0
    };
    (msb, (address & 0xFF) as u8)
}

/// Decodes a wire loco address from `(MSB, LSB)`.
#[must_use]
pub const fn decode_loco_address(msb: u8, lsb: u8) -> u16 {
    (((msb & 0x3F) as u16) << 8) | lsb as u16
}

/// Decodes function states from the function bytes of a loco info message.
///
/// `bytes` starts at DB4 (`0DSLFGHJ`). Missing trailing bytes read as off.
/// Layout: DB4 holds F0 in bit 4 and F1–F4 in bits 0–3, DB5 holds F5–F12,
/// DB6 F13–F20, DB7 F21–F28 and DB8 F29–F30 in bits 0–1.
#[must_use]
pub fn decode_functions(bytes: &[u8]) -> Functions {
    let mut functions = Functions::new();

    if let Some(&db4) = bytes.first() {
        functions.set(0, db4 & 0x10 != 0);
        for f in 1..=4 {
            functions.set(f, db4 & (1 << (f - 1)) != 0);
        }
    }

    for (group, &byte) in bytes.iter().skip(1).enumerate() {
        let base = 5 + group * 8;
        for bit in 0..8 {
            let f = base + bit;
            if f >= MAX_FUNCTIONS {
                return functions;
            }
            functions.set(f, byte & (1 << bit) != 0);
        }
    }

    functions
}

/// Encodes a single function switch (`TTNNNNNN`).
#[must_use]
pub const fn encode_function_switch(function: u8, on: bool) -> u8 {
    let tt = if on { 0x40 } else { 0x00 };
    tt | (function & 0x3F)
}

/// Splits a 0-based CV address into `(MSB, LSB)`.
#[must_use]
pub const fn encode_cv_address(cv: u16) -> (u8, u8) {
    let wire = cv - 1;
    ((wire >> 8) as u8, (wire & 0xFF) as u8)
}

/// Reads a CV number (1-based) from a wire address.
///
/// Returns `None` if the number would not fit in a `u16`.
#[must_use]
pub const fn decode_cv_address(msb: u8, lsb: u8) -> Option<u16> {
    u16::from_be_bytes([msb, lsb]).checked_add(1)
}
