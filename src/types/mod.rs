//! Data types for Z21 entities.
//!
//! This module contains the core data structures used throughout the library:
//! - System state and tri-state flags
//! - Locomotives, functions and speed steps
//! - Accessories
//! - Programming results
//! - Broadcast flags
//! - Device identity and diagnostics

pub mod accessory;
pub mod broadcast;
pub mod device;
pub mod loco;
pub mod programming;
pub mod state;

pub use accessory::{AccessoryInfo, MAX_ACCESSORY_ADDR, TurnoutPosition};
pub use broadcast::BroadcastFlags;
pub use device::{Diagnostics, FirmwareVersion, HardwareInfo, HardwareType, NOT_YET_READ};
pub use loco::{Direction, Functions, LocoInfo, MAX_FUNCTIONS, MAX_LOCO_ADDR, MAX_SPEED, SpeedSteps};
pub use programming::{MAX_CV, PROG_TIMEOUT, ProgResult};
pub use state::{SystemState, SystemStateData, TriState};
