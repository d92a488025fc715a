//! Protocol definitions for Z21 communication.
//!
//! This module contains the low-level protocol types including:
//! - Frame encoding/decoding
//! - LAN headers and X-Bus opcodes
//! - Value mappers (speed, addresses, function bits)
//! - Binary data parsing

pub mod frame;
pub mod mapping;
pub mod packet;
pub mod parser;

pub use frame::{
    FRAME_OVERHEAD, Frame, FrameDecoder, MAX_FRAME_SIZE, checksum, decode as decode_frame,
    decode_datagram, encode as encode_frame,
};
pub use mapping::{dcc_to_user_speed, user_to_dcc_speed};
pub use packet::LanHeader;
pub use parser::{
    parse_broadcast_flags, parse_cv_result, parse_firmware_version, parse_hw_info,
    parse_loco_info, parse_serial_number, parse_system_state, parse_turnout_info, parse_version,
    xbus_body,
};
