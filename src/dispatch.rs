//! Classification of inbound frames.
//!
//! [`decode_response`] turns a frame into a [`Response`]; [`apply`] feeds a
//! response into the [`StateHub`]. Frames with an unknown header or opcode
//! decode to `None` and are dropped without error. Nothing here ever sends.

use crate::error::{Error, Result};
use crate::event::Event;
use crate::hub::StateHub;
use crate::protocol::frame::Frame;
use crate::protocol::packet::{LanHeader, db0, xheader};
use crate::protocol::parser::{
    parse_broadcast_flags, parse_cv_result, parse_firmware_version, parse_hw_info,
    parse_loco_info, parse_serial_number, parse_system_state, parse_turnout_info, parse_version,
    xbus_body,
};
use crate::types::{
    AccessoryInfo, BroadcastFlags, FirmwareVersion, HardwareInfo, LocoInfo, ProgResult,
    SystemState, SystemStateData, TriState,
};

/// A decoded message from the command station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// `LAN_SYSTEMSTATE_DATACHANGED`.
    SystemState(SystemStateData),
    /// `LAN_X_STATUS_CHANGED`.
    Status(SystemState),
    /// `LAN_X_BC_TRACK_POWER_OFF`.
    TrackPowerOff,
    /// `LAN_X_BC_TRACK_POWER_ON`.
    TrackPowerOn,
    /// `LAN_X_BC_PROGRAMMING_MODE`.
    ProgrammingMode,
    /// `LAN_X_BC_TRACK_SHORT_CIRCUIT`.
    ShortCircuit,
    /// `LAN_X_BC_STOPPED`.
    EmergencyStop,
    /// `LAN_X_LOCO_INFO`.
    LocoInfo(Box<LocoInfo>),
    /// `LAN_X_TURNOUT_INFO`.
    TurnoutInfo(AccessoryInfo),
    /// `LAN_X_CV_RESULT`, `LAN_X_CV_NACK`, `LAN_X_CV_NACK_SC`.
    Prog(ProgResult),
    /// `LAN_GET_SERIAL_NUMBER` reply.
    SerialNumber(u32),
    /// `LAN_GET_HWINFO` reply.
    HwInfo(HardwareInfo),
    /// `LAN_X_GET_FIRMWARE_VERSION` reply.
    FirmwareVersion(FirmwareVersion),
    /// `LAN_X_GET_VERSION` reply.
    Version { xbus_version: String, station_id: u8 },
    /// `LAN_GET_BROADCASTFLAGS` reply.
    BroadcastFlags(BroadcastFlags),
    /// `LAN_X_UNKNOWN_COMMAND`.
    UnknownCommand,
}

impl Response {
    /// Protocol name of the message.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SystemState(_) => "LAN_SYSTEMSTATE_DATACHANGED",
            Self::Status(_) => "LAN_X_STATUS_CHANGED",
            Self::TrackPowerOff => "LAN_X_BC_TRACK_POWER_OFF",
            Self::TrackPowerOn => "LAN_X_BC_TRACK_POWER_ON",
            Self::ProgrammingMode => "LAN_X_BC_PROGRAMMING_MODE",
            Self::ShortCircuit => "LAN_X_BC_TRACK_SHORT_CIRCUIT",
            Self::EmergencyStop => "LAN_X_BC_STOPPED",
            Self::LocoInfo(_) => "LAN_X_LOCO_INFO",
            Self::TurnoutInfo(_) => "LAN_X_TURNOUT_INFO",
            Self::Prog(ProgResult::Success { .. } | ProgResult::Timeout) => "LAN_X_CV_RESULT",
            Self::Prog(ProgResult::ShortCircuit) => "LAN_X_CV_NACK_SC",
            Self::Prog(ProgResult::DataNotFound) => "LAN_X_CV_NACK",
            Self::SerialNumber(_) => "LAN_GET_SERIAL_NUMBER",
            Self::HwInfo(_) => "LAN_GET_HWINFO",
            Self::FirmwareVersion(_) => "LAN_X_GET_FIRMWARE_VERSION",
            Self::Version { .. } => "LAN_X_GET_VERSION",
            Self::BroadcastFlags(_) => "LAN_GET_BROADCASTFLAGS",
            Self::UnknownCommand => "LAN_X_UNKNOWN_COMMAND",
        }
    }
}

/// Decodes a frame.
///
/// Returns `None` for unknown messages and for known messages that fail to
/// parse; the latter are logged.
#[must_use]
pub fn decode_response(frame: &Frame, addr_offset: i32) -> Option<Response> {
    let Some(header) = LanHeader::from_u16(frame.header) else {
        tracing::trace!("ignoring LAN header 0x{:04x}", frame.header);
        return None;
    };
    let data = &frame.data[..];

    let result = match header {
        LanHeader::SerialNumber => parse_serial_number(data).map(Response::SerialNumber),
        LanHeader::HwInfo => parse_hw_info(data).map(Response::HwInfo),
        LanHeader::GetBroadcastFlags => parse_broadcast_flags(data).map(Response::BroadcastFlags),
        LanHeader::SystemStateChanged => parse_system_state(data).map(Response::SystemState),
        LanHeader::XBus => return decode_xbus(data, addr_offset),
        LanHeader::Logoff | LanHeader::SetBroadcastFlags | LanHeader::SystemStateGetData => {
            return None;
        }
    };
    log_parse_failure(header, result)
}

fn decode_xbus(data: &[u8], addr_offset: i32) -> Option<Response> {
    let (x_header, body) = xbus_body(data)?;
    let first = body.first().copied();

    let result: Result<Response> = match (x_header, first) {
        (xheader::BROADCAST, Some(db0::BC_TRACK_POWER_OFF)) => Ok(Response::TrackPowerOff),
        (xheader::BROADCAST, Some(db0::BC_TRACK_POWER_ON)) => Ok(Response::TrackPowerOn),
        (xheader::BROADCAST, Some(db0::BC_PROGRAMMING_MODE)) => Ok(Response::ProgrammingMode),
        (xheader::BROADCAST, Some(db0::BC_SHORT_CIRCUIT)) => Ok(Response::ShortCircuit),
        (xheader::BROADCAST, Some(db0::CV_NACK_SC)) => Ok(Response::Prog(ProgResult::ShortCircuit)),
        (xheader::BROADCAST, Some(db0::CV_NACK)) => Ok(Response::Prog(ProgResult::DataNotFound)),
        (xheader::BROADCAST, Some(db0::UNKNOWN_COMMAND)) => Ok(Response::UnknownCommand),
        (xheader::STATUS_CHANGED, Some(db0::STATUS_CHANGED)) => match body.get(1) {
            Some(&status) => Ok(Response::Status(SystemState::from_central_state(status))),
            None => Err(short_xbus("StatusChanged")),
        },
        (xheader::VERSION, Some(db0::GET_VERSION)) => parse_version(body)
            .map(|(xbus_version, station_id)| Response::Version {
                xbus_version,
                station_id,
            }),
        (xheader::CV_RESULT, Some(db0::CV_RESULT)) => parse_cv_result(body)
            .map(|(cv, value)| Response::Prog(ProgResult::Success { cv, value })),
        (xheader::BC_STOPPED, Some(0x00)) => Ok(Response::EmergencyStop),
        (xheader::LOCO_INFO, _) => {
            parse_loco_info(body, addr_offset).map(|info| Response::LocoInfo(Box::new(info)))
        }
        (xheader::TURNOUT_INFO, _) => parse_turnout_info(body).map(Response::TurnoutInfo),
        (xheader::FIRMWARE_VERSION, Some(db0::FIRMWARE_VERSION)) => {
            parse_firmware_version(body).map(Response::FirmwareVersion)
        }
        _ => {
            tracing::trace!("ignoring X-Bus message 0x{:02x} {:?}", x_header, first);
            return None;
        }
    };
    log_parse_failure(LanHeader::XBus, result)
}

fn short_xbus(what: &str) -> Error {
    Error::Protocol {
        message: format!("{what} too short"),
    }
}

fn log_parse_failure(header: LanHeader, result: Result<Response>) -> Option<Response> {
    match result {
        Ok(response) => Some(response),
        Err(e) => {
            tracing::warn!("failed to parse {:?} message: {}", header, e);
            None
        }
    }
}

/// Applies a decoded response to the hub.
pub fn apply(response: Response, hub: &mut StateHub) {
    match response {
        Response::SystemState(data) => {
            hub.diagnostics_mut().apply_system_state(&data);
            hub.apply_state(data.state());
            hub.diagnostics_updated();
        }
        Response::Status(state) => hub.apply_state(state),
        Response::TrackPowerOff => hub.set_track_power(TriState::Inactive),
        Response::TrackPowerOn => {
            hub.set_track_power(TriState::Active);
            hub.set_emergency_stop(TriState::Inactive);
            hub.set_short_circuit(TriState::Inactive);
        }
        Response::ProgrammingMode => hub.set_programming(TriState::Active),
        Response::ShortCircuit => hub.set_short_circuit(TriState::Active),
        Response::EmergencyStop => hub.set_emergency_stop(TriState::Active),
        Response::LocoInfo(info) => hub.notify(&Event::LocoInfo(info)),
        Response::TurnoutInfo(info) => hub.notify(&Event::AccessoryState(info)),
        Response::Prog(result) => hub.notify(&Event::ProgResult(result)),
        Response::SerialNumber(serial) => {
            hub.diagnostics_mut().serial_number = serial.to_string();
            hub.diagnostics_updated();
        }
        Response::HwInfo(info) => {
            hub.diagnostics_mut().apply_hw_info(&info);
            hub.diagnostics_updated();
        }
        Response::FirmwareVersion(version) => {
            hub.diagnostics_mut().firmware_version = version.to_string();
            hub.diagnostics_updated();
        }
        Response::Version {
            xbus_version,
            station_id,
        } => {
            let diagnostics = hub.diagnostics_mut();
            diagnostics.xbus_version = xbus_version;
            diagnostics.command_station_id = format!("0x{station_id:02x}");
            hub.diagnostics_updated();
        }
        Response::BroadcastFlags(flags) => hub.set_broadcast_flags(flags),
        Response::UnknownCommand => {
            tracing::debug!("command station did not understand the last command");
        }
    }
}
