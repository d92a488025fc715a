//! # z21
//!
//! A Rust client library for Z21 model-railway command stations.
//!
//! This library speaks the Z21 LAN protocol over UDP: it encodes commands
//! (track power, loco drive and functions, turnouts, CV programming),
//! decodes the station's replies and pushes, and keeps a debounced view of
//! the system state that observers can react to.
//!
//! ## Features
//!
//! - Frame codec with lenient inbound decoding
//! - Range-checked command encoders, never silently clamped
//! - Observer callbacks, plus a Tokio broadcast adapter
//! - Optional Tokio host loop for polling and heartbeat
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use z21::{Direction, RunConfig, Z21};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), z21::Error> {
//!     let mut z21 = Z21::udp("192.168.0.111")?;
//!     z21.init()?;
//!
//!     z21.set_track_power(true)?;
//!     z21.set_loco_drive(3, Direction::Forward, 40)?;
//!
//!     z21.run(RunConfig::default(), tokio::time::sleep(Duration::from_secs(60)))
//!         .await?;
//!     z21.logoff()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`protocol`] - Frame codec, opcode tables, value mappers, parsers
//! - [`types`] - Data structures (state, locos, accessories, diagnostics)
//! - [`commands`] - Command encoders
//! - [`dispatch`] - Classification of inbound frames
//! - [`hub`] - Debounced state and observer fan-out
//! - [`event`] - Observer trait and event channel
//! - [`transport`] - UDP and in-memory transports
//! - [`client`] - The [`Z21`] context object

pub mod client;
pub mod commands;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod hub;
pub mod protocol;
pub mod transport;
pub mod types;

// Re-exports for convenience
pub use client::{DEFAULT_BROADCAST_FLAGS, HEARTBEAT_INTERVAL, RunConfig, Z21};
pub use commands::{Command, CommandEncoder};
pub use dispatch::Response;
pub use error::{Error, FrameError, Result};
pub use event::{
    Event, EventChannel, MAX_OBSERVERS, Observer, Subscription, Trace, TraceDirection,
};
pub use hub::StateHub;
pub use protocol::{Frame, FrameDecoder, LanHeader};
pub use transport::{MemoryTransport, Transport, UdpConfig, UdpTransport};
pub use types::{
    AccessoryInfo, BroadcastFlags, Diagnostics, Direction, FirmwareVersion, Functions,
    HardwareInfo, HardwareType, LocoInfo, ProgResult, SpeedSteps, SystemState, SystemStateData,
    TriState, TurnoutPosition,
};
