//! Command station state types.

use std::fmt;

use crate::protocol::packet::{central_state, central_state_ex};

/// A status flag that may not have been reported yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TriState {
    /// No authoritative message received yet.
    #[default]
    Unknown,
    /// Flag is set (power on, stop active, ...).
    Active,
    /// Flag is cleared.
    Inactive,
}

impl TriState {
    /// Converts a known boolean into a tri-state.
    #[must_use]
    pub const fn from_bool(active: bool) -> Self {
        if active { Self::Active } else { Self::Inactive }
    }

    /// Returns `Some(true)` for active, `Some(false)` for inactive.
    #[must_use]
    pub const fn as_bool(self) -> Option<bool> {
        match self {
            Self::Unknown => None,
            Self::Active => Some(true),
            Self::Inactive => Some(false),
        }
    }

    /// Returns true unless the state is unknown.
    #[must_use]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Renders the state with custom labels for the known values.
    #[must_use]
    pub fn label<'a>(self, on: &'a str, off: &'a str) -> &'a str {
        match self {
            Self::Unknown => "?",
            Self::Active => on,
            Self::Inactive => off,
        }
    }
}

impl fmt::Display for TriState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label("on", "off"))
    }
}

/// The four status flags tracked for the command station.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemState {
    /// Track power.
    pub track_power: TriState,
    /// Emergency stop.
    pub emergency_stop: TriState,
    /// Short circuit.
    pub short_circuit: TriState,
    /// Programming mode.
    pub programming: TriState,
}

impl SystemState {
    /// Derives all four flags from a central state byte.
    #[must_use]
    pub const fn from_central_state(byte: u8) -> Self {
        Self {
            track_power: TriState::from_bool(byte & central_state::TRACK_VOLTAGE_OFF == 0),
            emergency_stop: TriState::from_bool(byte & central_state::EMERGENCY_STOP != 0),
            short_circuit: TriState::from_bool(byte & central_state::SHORT_CIRCUIT != 0),
            programming: TriState::from_bool(byte & central_state::PROGRAMMING_MODE != 0),
        }
    }
}

/// Contents of a system state push.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SystemStateData {
    /// Current on the main track in mA.
    pub main_current: i16,
    /// Current on the programming track in mA.
    pub prog_current: i16,
    /// Smoothed main track current in mA.
    pub filtered_main_current: i16,
    /// Internal temperature in °C.
    pub temperature: i16,
    /// Supply voltage in mV.
    pub supply_voltage: u16,
    /// Internal track voltage in mV.
    pub vcc_voltage: u16,
    /// Central state bitfield.
    pub central_state: u8,
    /// Extended central state bitfield.
    pub central_state_ex: u8,
    /// Capabilities bitfield (firmware 1.42+, zero otherwise).
    pub capabilities: u8,
}

impl SystemStateData {
    /// The four status flags encoded in this push.
    #[must_use]
    pub const fn state(&self) -> SystemState {
        SystemState::from_central_state(self.central_state)
    }

    /// Input voltage is too low.
    #[must_use]
    pub const fn low_voltage(&self) -> bool {
        self.central_state_ex & central_state_ex::POWER_LOST != 0
    }

    /// Temperature is too high.
    #[must_use]
    pub const fn high_temperature(&self) -> bool {
        self.central_state_ex & central_state_ex::HIGH_TEMPERATURE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tri_state_labels() {
        assert_eq!(TriState::Active.label("Ein", "Aus"), "Ein");
        assert_eq!(TriState::Inactive.label("Ein", "Aus"), "Aus");
        assert_eq!(TriState::Unknown.label("Ein", "Aus"), "?");
        assert_eq!(TriState::Active.to_string(), "on");
    }

    #[test]
    fn test_from_central_state() {
        let state = SystemState::from_central_state(0x00);
        assert_eq!(state.track_power, TriState::Active);
        assert_eq!(state.emergency_stop, TriState::Inactive);

        let state = SystemState::from_central_state(0x27);
        assert_eq!(state.track_power, TriState::Inactive);
        assert_eq!(state.emergency_stop, TriState::Active);
        assert_eq!(state.short_circuit, TriState::Active);
        assert_eq!(state.programming, TriState::Active);
    }

    #[test]
    fn test_derived_flags() {
        let data = SystemStateData {
            central_state_ex: 0x03,
            ..SystemStateData::default()
        };
        assert!(data.low_voltage());
        assert!(data.high_temperature());
        assert!(!SystemStateData::default().low_voltage());
    }
}
