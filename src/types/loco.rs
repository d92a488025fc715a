//! Locomotive types.

/// Highest locomotive address accepted on the wire.
pub const MAX_LOCO_ADDR: u16 = 9999;

/// Number of addressable functions (F0–F30).
pub const MAX_FUNCTIONS: usize = 31;

/// Highest user-facing speed (128 speed step mode).
pub const MAX_SPEED: u8 = 126;

/// Driving direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Forward.
    #[default]
    Forward,
    /// Backward.
    Backward,
}

impl Direction {
    /// Direction bit within the speed byte.
    pub const BIT: u8 = 0x80;

    /// Reads the direction from a speed byte.
    #[must_use]
    pub const fn from_speed_byte(byte: u8) -> Self {
        if byte & Self::BIT != 0 {
            Self::Forward
        } else {
            Self::Backward
        }
    }

    /// Returns the bit to OR into a speed byte.
    #[must_use]
    pub const fn bit(self) -> u8 {
        match self {
            Self::Forward => Self::BIT,
            Self::Backward => 0,
        }
    }
}

/// Speed step mode of a decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SpeedSteps {
    /// 14 speed steps.
    Steps14,
    /// 28 speed steps.
    Steps28,
    /// 128 speed steps.
    #[default]
    Steps128,
}

impl SpeedSteps {
    /// Parses the `KKK` bits of a loco info message.
    #[must_use]
    pub const fn from_bits(bits: u8) -> Self {
        match bits & 0x07 {
            0 => Self::Steps14,
            2 => Self::Steps28,
            _ => Self::Steps128,
        }
    }

    /// Number of speed steps.
    #[must_use]
    pub const fn count(self) -> u8 {
        match self {
            Self::Steps14 => 14,
            Self::Steps28 => 28,
            Self::Steps128 => 128,
        }
    }
}

/// Function states F0–F30.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Functions([bool; MAX_FUNCTIONS]);

impl Functions {
    /// Creates a set with every function off.
    #[must_use]
    pub const fn new() -> Self {
        Self([false; MAX_FUNCTIONS])
    }

    /// Returns the state of function `index`, false if out of range.
    #[must_use]
    pub fn get(&self, index: usize) -> bool {
        self.0.get(index).copied().unwrap_or(false)
    }

    /// Sets function `index`. Out-of-range indices are ignored.
    pub fn set(&mut self, index: usize, on: bool) {
        if let Some(slot) = self.0.get_mut(index) {
            *slot = on;
        }
    }

    /// Returns all functions as a slice indexed by function number.
    #[must_use]
    pub const fn as_slice(&self) -> &[bool; MAX_FUNCTIONS] {
        &self.0
    }

    /// Iterates over the indices of functions that are on.
    pub fn active(&self) -> impl Iterator<Item = usize> + '_ {
        self.0
            .iter()
            .enumerate()
            .filter_map(|(i, on)| on.then_some(i))
    }
}

/// State of one locomotive as reported by the command station.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocoInfo {
    /// User-facing address (wire address minus offset).
    pub address: i32,
    /// Driving direction.
    pub direction: Direction,
    /// Speed in the decoder's own step scale, 0 = stop.
    pub speed: u8,
    /// Another controller has taken over this loco.
    pub taken_over: bool,
    /// Speed step mode.
    pub speed_steps: SpeedSteps,
    /// Function states.
    pub functions: Functions,
}
