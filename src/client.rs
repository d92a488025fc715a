//! Main [`Z21`] client implementation.
//!
//! [`Z21`] is the context object that ties a transport, the command encoder
//! and the state hub together. It does no I/O on its own: the host calls
//! [`Z21::receive`] often and [`Z21::heartbeat`] every
//! [`HEARTBEAT_INTERVAL`], or hands both jobs to [`Z21::run`].

use std::future::Future;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};

use crate::commands::{Command, CommandEncoder};
use crate::dispatch::{Response, apply, decode_response};
use crate::error::Result;
use crate::event::{Event, Observer, Trace, TraceDirection};
use crate::hub::StateHub;
use crate::protocol::{Frame, decode_datagram};
use crate::transport::{Transport, UdpConfig, UdpTransport};
use crate::types::{
    BroadcastFlags, Diagnostics, Direction, PROG_TIMEOUT, ProgResult, SystemState, TurnoutPosition,
};

/// Interval at which the command station must hear from the client.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Default receive poll interval of [`Z21::run`].
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Broadcast flags requested by [`Z21::init`].
pub const DEFAULT_BROADCAST_FLAGS: BroadcastFlags =
    BroadcastFlags::from_bits(BroadcastFlags::BASIC.bits() | BroadcastFlags::SYSTEM_STATE.bits());

/// Timing of the [`Z21::run`] loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunConfig {
    /// How often the transport is polled.
    pub poll_interval: Duration,
    /// How often the heartbeat is sent.
    pub heartbeat: Duration,
}

impl RunConfig {
    /// Creates a configuration with default timing.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            heartbeat: HEARTBEAT_INTERVAL,
        }
    }

    /// Sets the poll interval.
    #[must_use]
    pub const fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Sets the heartbeat interval.
    #[must_use]
    pub const fn heartbeat(mut self, interval: Duration) -> Self {
        self.heartbeat = interval;
        self
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Client for a Z21 command station.
pub struct Z21<T> {
    transport: T,
    encoder: CommandEncoder,
    hub: StateHub,
    prog_started: Option<Instant>,
    last_sent: Option<Instant>,
    last_received: Option<Instant>,
}

impl Z21<UdpTransport> {
    /// Creates a client connected to the command station at `address`.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the socket cannot be bound.
    pub fn udp(address: impl Into<String>) -> Result<Self> {
        Self::with_udp_config(UdpConfig::new(address))
    }

    /// Creates a client with a custom UDP configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the socket cannot be bound.
    pub fn with_udp_config(config: UdpConfig) -> Result<Self> {
        let mut transport = UdpTransport::new(config);
        transport.connect()?;
        Ok(Self::new(transport))
    }

    /// Changes the command station address and reconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is invalid or the socket cannot be bound.
    pub fn set_ip_address(&mut self, address: impl Into<String>) -> Result<()> {
        self.transport.set_ip_address(address)
    }

    /// Current command station address.
    #[must_use]
    pub fn ip_address(&self) -> &str {
        self.transport.ip_address()
    }
}

impl<T: Transport> Z21<T> {
    /// Creates a client on top of an existing transport.
    #[must_use]
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            encoder: CommandEncoder::new(),
            hub: StateHub::new(),
            prog_started: None,
            last_sent: None,
            last_received: None,
        }
    }

    /// Returns the transport.
    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Returns the transport mutably.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Registers an observer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::TooManyObservers`] when the set is full.
    pub fn add_observer(&mut self, observer: impl Observer + 'static) -> Result<()> {
        self.hub.add_observer(Box::new(observer))
    }

    /// Sets the offset added to user loco addresses on the wire.
    pub fn set_addr_offset(&mut self, offset: i32) {
        self.encoder.set_addr_offset(offset);
    }

    /// Current loco address offset.
    #[must_use]
    pub const fn addr_offset(&self) -> i32 {
        self.encoder.addr_offset()
    }

    /// Wire address of the loco most recently commanded.
    #[must_use]
    pub const fn last_controlled_address(&self) -> Option<u16> {
        self.encoder.last_controlled_address()
    }

    /// Last known status flags.
    #[must_use]
    pub const fn state(&self) -> SystemState {
        self.hub.state()
    }

    /// Diagnostic values.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        self.hub.diagnostics()
    }

    /// Broadcast flags as last read back.
    #[must_use]
    pub const fn broadcast_flags(&self) -> Option<BroadcastFlags> {
        self.hub.broadcast_flags()
    }

    /// Returns true while a CV read or write awaits its answer.
    #[must_use]
    pub const fn prog_pending(&self) -> bool {
        self.prog_started.is_some()
    }

    /// Requests everything the client tracks.
    ///
    /// Sets [`DEFAULT_BROADCAST_FLAGS`], reads them back and queries the
    /// station identity and status.
    ///
    /// # Errors
    ///
    /// Returns an error if a send fails.
    pub fn init(&mut self) -> Result<()> {
        self.init_with_flags(DEFAULT_BROADCAST_FLAGS)
    }

    /// Like [`Z21::init`] with custom broadcast flags.
    ///
    /// # Errors
    ///
    /// Returns an error if a send fails.
    pub fn init_with_flags(&mut self, flags: BroadcastFlags) -> Result<()> {
        tracing::debug!("initializing with broadcast flags {}", flags);
        self.set_broadcast_flags(flags)?;
        self.get_broadcast_flags()?;
        self.get_serial_number()?;
        self.get_hw_info()?;
        self.get_firmware_version()?;
        self.get_version()?;
        self.get_status()?;
        self.get_system_state()
    }

    /// Sends the keepalive.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn heartbeat(&mut self) -> Result<()> {
        self.get_status()
    }

    /// Receives and dispatches at most one datagram.
    ///
    /// Returns `Ok(false)` if nothing was waiting. A datagram with a framing
    /// error is logged and dropped as a whole. Also reports a programming
    /// timeout if one is due.
    ///
    /// # Errors
    ///
    /// Returns an error if the transport fails.
    pub fn receive(&mut self) -> Result<bool> {
        self.check_prog_timeout();

        let Some(datagram) = self.transport.try_recv()? else {
            return Ok(false);
        };

        let frames = match decode_datagram(datagram.clone()) {
            Ok(frames) => frames,
            Err(e) => {
                tracing::warn!("dropping datagram {}: {}", hex::encode(&datagram), e);
                return Ok(true);
            }
        };

        for frame in &frames {
            self.process_frame(frame);
        }
        Ok(true)
    }

    /// Runs the host loop until `shutdown` resolves.
    ///
    /// Polls the transport every `poll_interval` (draining everything that
    /// is waiting) and sends the heartbeat every `heartbeat`, the first one
    /// a full interval after start.
    ///
    /// # Errors
    ///
    /// Returns the first transport error.
    pub async fn run<F>(&mut self, config: RunConfig, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut poll = tokio::time::interval(config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut heartbeat =
            tokio::time::interval_at(Instant::now() + config.heartbeat, config.heartbeat);
        heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::debug!("run loop stopped");
                    return Ok(());
                }
                _ = heartbeat.tick() => self.heartbeat()?,
                _ = poll.tick() => {
                    while self.receive()? {}
                }
            }
        }
    }

    // ==================== Commands ====================

    /// Switches track power on or off.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn set_track_power(&mut self, on: bool) -> Result<()> {
        let command = self.encoder.set_track_power(on);
        self.send(&command)
    }

    /// Emergency stop for all locos.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn set_stop(&mut self) -> Result<()> {
        let command = self.encoder.set_stop();
        self.send(&command)
    }

    /// Drives a loco. `speed` is 0–126.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address or speed,
    /// in which case nothing is sent.
    pub fn set_loco_drive(&mut self, addr: i32, direction: Direction, speed: u8) -> Result<()> {
        let command = self.encoder.set_loco_drive(addr, direction, speed)?;
        self.send(&command)
    }

    /// Emergency stop for one loco.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address.
    pub fn loco_stop(&mut self, addr: i32, direction: Direction) -> Result<()> {
        let command = self.encoder.loco_stop(addr, direction)?;
        self.send(&command)
    }

    /// Switches a loco function.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address or function.
    pub fn set_loco_function(&mut self, addr: i32, function: u8, on: bool) -> Result<()> {
        let command = self.encoder.set_loco_function(addr, function, on)?;
        self.send(&command)
    }

    /// Requests loco info; the answer arrives as a loco info notification.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address.
    pub fn get_loco_info(&mut self, addr: i32) -> Result<()> {
        let command = self.encoder.get_loco_info(addr)?;
        self.send(&command)
    }

    /// Switches a turnout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address.
    pub fn set_turnout(&mut self, addr: u16, position: TurnoutPosition) -> Result<()> {
        let command = self.encoder.set_turnout(addr, position)?;
        self.send(&command)
    }

    /// Requests the state of a turnout.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address.
    pub fn get_turnout_info(&mut self, addr: u16) -> Result<()> {
        let command = self.encoder.get_turnout_info(addr)?;
        self.send(&command)
    }

    /// Reads a CV on the programming track.
    ///
    /// The result arrives as a programming result notification, or as
    /// [`ProgResult::Timeout`] after [`PROG_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid CV.
    pub fn cv_read(&mut self, cv: u16) -> Result<()> {
        let command = self.encoder.cv_read(cv)?;
        self.send_prog(&command)
    }

    /// Writes a CV on the programming track.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid CV.
    pub fn cv_write(&mut self, cv: u16, value: u8) -> Result<()> {
        let command = self.encoder.cv_write(cv, value)?;
        self.send_prog(&command)
    }

    /// Writes a CV on the main track. There is no answer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfRange`] for an invalid address or CV.
    pub fn pom_write_byte(&mut self, addr: i32, cv: u16, value: u8) -> Result<()> {
        let command = self.encoder.pom_write_byte(addr, cv, value)?;
        self.send(&command)
    }

    /// Sets which broadcasts the station sends to this client.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn set_broadcast_flags(&mut self, flags: BroadcastFlags) -> Result<()> {
        let command = self.encoder.set_broadcast_flags(flags);
        self.send(&command)
    }

    /// Requests the broadcast flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_broadcast_flags(&mut self) -> Result<()> {
        let command = self.encoder.get_broadcast_flags();
        self.send(&command)
    }

    /// Requests a system state push.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_system_state(&mut self) -> Result<()> {
        let command = self.encoder.get_system_state();
        self.send(&command)
    }

    /// Requests the serial number.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_serial_number(&mut self) -> Result<()> {
        let command = self.encoder.get_serial_number();
        self.send(&command)
    }

    /// Requests hardware type and firmware version.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_hw_info(&mut self) -> Result<()> {
        let command = self.encoder.get_hw_info();
        self.send(&command)
    }

    /// Requests the firmware version.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_firmware_version(&mut self) -> Result<()> {
        let command = self.encoder.get_firmware_version();
        self.send(&command)
    }

    /// Requests the X-Bus version and command station id.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_version(&mut self) -> Result<()> {
        let command = self.encoder.get_version();
        self.send(&command)
    }

    /// Requests the central state.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn get_status(&mut self) -> Result<()> {
        let command = self.encoder.get_status();
        self.send(&command)
    }

    /// Tells the station this client is going away.
    ///
    /// # Errors
    ///
    /// Returns an error if the send fails.
    pub fn logoff(&mut self) -> Result<()> {
        let command = self.encoder.logoff();
        self.send(&command)
    }

    // ==================== Internals ====================

    fn send(&mut self, command: &Command) -> Result<()> {
        self.transport.send(&command.bytes)?;

        let now = Instant::now();
        let since_last = self.last_sent.map_or(Duration::ZERO, |t| now - t);
        self.last_sent = Some(now);

        let parameters = hex::encode(&command.bytes);
        tracing::trace!("-> {} {}", command.name, parameters);
        self.hub.trace(Trace {
            direction: TraceDirection::ToStation,
            since_last,
            message: command.name.to_string(),
            parameters,
        });
        Ok(())
    }

    fn send_prog(&mut self, command: &Command) -> Result<()> {
        self.send(command)?;
        if self.prog_started.replace(Instant::now()).is_some() {
            tracing::debug!("programming request replaces one still pending");
        }
        Ok(())
    }

    fn check_prog_timeout(&mut self) {
        let Some(started) = self.prog_started else {
            return;
        };
        if started.elapsed() >= PROG_TIMEOUT {
            self.prog_started = None;
            tracing::warn!("no programming result within {:?}", PROG_TIMEOUT);
            self.hub.notify(&Event::ProgResult(ProgResult::Timeout));
        }
    }

    fn process_frame(&mut self, frame: &Frame) {
        let now = Instant::now();
        let since_last = self.last_received.map_or(Duration::ZERO, |t| now - t);
        self.last_received = Some(now);
        self.hub.diagnostics_mut().last_received = Some(now);

        let response = decode_response(frame, self.encoder.addr_offset());
        let message = response.as_ref().map_or_else(
            || format!("LAN_0x{:04X}", frame.header),
            |r| r.name().to_string(),
        );
        let parameters = hex::encode(&frame.data);
        tracing::trace!("<- {} {}", message, parameters);
        self.hub.trace(Trace {
            direction: TraceDirection::FromStation,
            since_last,
            message,
            parameters,
        });

        let Some(response) = response else {
            return;
        };

        match &response {
            Response::Prog(_) => self.prog_started = None,
            Response::LocoInfo(info) if info.taken_over => {
                let wire = i64::from(info.address) + i64::from(self.encoder.addr_offset());
                if self.encoder.last_controlled_address().map(i64::from) == Some(wire) {
                    tracing::info!("loco {} was taken over by another controller", info.address);
                }
            }
            _ => {}
        }

        apply(response, &mut self.hub);
    }
}

impl<T> std::fmt::Debug for Z21<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Z21")
            .field("encoder", &self.encoder)
            .field("hub", &self.hub)
            .field("prog_pending", &self.prog_started.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::error::Error;
    use crate::event::MAX_OBSERVERS;
    use crate::transport::MemoryTransport;
    use crate::types::{LocoInfo, TriState};

    #[derive(Clone, Default)]
    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn entries(&self) -> Vec<String> {
            self.log.lock().unwrap().clone()
        }
    }

    impl Observer for Recorder {
        fn track_power_changed(&mut self, state: TriState) {
            self.log.lock().unwrap().push(format!("power {state}"));
        }

        fn emergency_stop_changed(&mut self, state: TriState) {
            self.log.lock().unwrap().push(format!("stop {state}"));
        }

        fn prog_result(&mut self, result: ProgResult) {
            self.log.lock().unwrap().push(format!("prog {result:?}"));
        }

        fn loco_info_changed(&mut self, info: &LocoInfo) {
            self.log.lock().unwrap().push(format!(
                "loco {} speed {} taken {}",
                info.address, info.speed, info.taken_over
            ));
        }

        fn trace(&mut self, trace: &Trace) {
            if trace.direction == TraceDirection::ToStation {
                self.log
                    .lock()
                    .unwrap()
                    .push(format!("-> {} {}", trace.message, trace.parameters));
            }
        }
    }

    const POWER_ON: &[u8] = &[0x07, 0x00, 0x40, 0x00, 0x61, 0x01, 0x60];
    const STATUS_OK: &[u8] = &[0x08, 0x00, 0x40, 0x00, 0x62, 0x22, 0x00, 0x40];

    fn client() -> (Z21<MemoryTransport>, MemoryTransport, Recorder) {
        let handle = MemoryTransport::new();
        let recorder = Recorder::default();
        let mut z21 = Z21::new(handle.clone());
        z21.add_observer(recorder.clone()).unwrap();
        (z21, handle, recorder)
    }

    #[test]
    fn test_track_power_round_trip() {
        let (mut z21, handle, recorder) = client();

        z21.set_track_power(true).unwrap();
        assert_eq!(
            handle.take_sent(),
            vec![bytes::Bytes::from_static(&[
                0x07, 0x00, 0x40, 0x00, 0x21, 0x81, 0xA0
            ])]
        );

        handle.push_inbound(POWER_ON);
        handle.push_inbound(POWER_ON);
        assert!(z21.receive().unwrap());
        assert!(z21.receive().unwrap());
        assert!(!z21.receive().unwrap());

        assert_eq!(z21.state().track_power, TriState::Active);
        let entries = recorder.entries();
        assert_eq!(
            entries,
            vec![
                "-> LAN_X_SET_TRACK_POWER_ON 070040002181a0",
                "power on",
                "stop off"
            ]
        );
    }

    #[test]
    fn test_truncated_datagram_changes_nothing() {
        let (mut z21, handle, recorder) = client();
        handle.push_inbound(POWER_ON[..6].to_vec());

        assert!(z21.receive().unwrap());
        assert_eq!(z21.state(), SystemState::default());
        assert!(recorder.entries().is_empty());
    }

    #[test]
    fn test_datagram_with_bad_tail_is_dropped_whole() {
        let (mut z21, handle, _recorder) = client();
        let mut datagram = POWER_ON.to_vec();
        datagram.extend_from_slice(&[0x09, 0x00, 0x40]);
        handle.push_inbound(datagram);

        z21.receive().unwrap();
        assert_eq!(z21.state().track_power, TriState::Unknown);
    }

    #[test]
    fn test_multi_frame_datagram() {
        let (mut z21, handle, _recorder) = client();
        let mut datagram = STATUS_OK.to_vec();
        datagram.extend_from_slice(&[0x08, 0x00, 0x51, 0x00, 0x01, 0x01, 0x00, 0x00]);
        handle.push_inbound(datagram);

        z21.receive().unwrap();
        assert_eq!(z21.state().track_power, TriState::Active);
        assert_eq!(z21.state().programming, TriState::Inactive);
        assert_eq!(
            z21.broadcast_flags(),
            Some(BroadcastFlags::BASIC | BroadcastFlags::SYSTEM_STATE)
        );
        assert!(z21.diagnostics().last_received.is_some());
    }

    #[test]
    fn test_identical_status_pushes_notify_once() {
        let (mut z21, handle, recorder) = client();
        handle.push_inbound(STATUS_OK);
        handle.push_inbound(STATUS_OK);
        z21.receive().unwrap();
        z21.receive().unwrap();

        assert_eq!(recorder.entries(), vec!["power on", "stop off"]);
    }

    #[test]
    fn test_unknown_datagram_is_ignored() {
        let (mut z21, handle, recorder) = client();
        handle.push_inbound(vec![0x05, 0x00, 0xA0, 0x00, 0x01]);
        assert!(z21.receive().unwrap());
        assert!(recorder.entries().is_empty());
        assert_eq!(z21.state(), SystemState::default());
    }

    #[test]
    fn test_observer_limit() {
        let mut z21 = Z21::new(MemoryTransport::new());
        for _ in 0..MAX_OBSERVERS {
            z21.add_observer(Recorder::default()).unwrap();
        }
        let overflow = Recorder::default();
        assert!(matches!(
            z21.add_observer(overflow.clone()),
            Err(Error::TooManyObservers { .. })
        ));

        z21.set_stop().unwrap();
        assert!(overflow.entries().is_empty());
    }

    #[test]
    fn test_out_of_range_sends_nothing() {
        let (mut z21, handle, recorder) = client();
        assert!(z21.set_loco_drive(3, Direction::Forward, 127).is_err());
        assert!(z21.set_loco_drive(10_000, Direction::Forward, 0).is_err());
        assert!(z21.cv_read(0).is_err());
        assert!(handle.sent().is_empty());
        assert!(recorder.entries().is_empty());
        assert!(!z21.prog_pending());
    }

    #[test]
    fn test_loco_info_with_offset() {
        let (mut z21, handle, recorder) = client();
        z21.set_addr_offset(10);
        z21.set_loco_drive(5, Direction::Forward, 4).unwrap();
        assert_eq!(z21.last_controlled_address(), Some(15));

        // wire address 15, taken over, 128 steps, forward, DCC speed 5
        handle.push_inbound(vec![
            0x0E, 0x00, 0x40, 0x00, 0xEF, 0x00, 0x0F, 0x0C, 0x85, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        z21.receive().unwrap();

        assert_eq!(recorder.entries().last().unwrap(), "loco 5 speed 4 taken true");
    }

    #[test]
    fn test_loco_info_with_extreme_offset() {
        const TAKEN_OVER_15: &[u8] = &[
            0x0E, 0x00, 0x40, 0x00, 0xEF, 0x00, 0x0F, 0x0C, 0x85, 0x00, 0x00, 0x00, 0x00, 0x00,
        ];

        let (mut z21, handle, recorder) = client();
        z21.set_addr_offset(i32::MIN);
        handle.push_inbound(TAKEN_OVER_15);
        assert!(z21.receive().unwrap());
        assert!(recorder.entries().is_empty());

        z21.set_addr_offset(i32::MAX);
        handle.push_inbound(TAKEN_OVER_15);
        assert!(z21.receive().unwrap());
        assert_eq!(
            recorder.entries(),
            vec![format!("loco {} speed 4 taken true", 15 - i32::MAX)]
        );
    }

    #[test]
    fn test_system_state_push() {
        #[derive(Clone, Default)]
        struct FlagCounter {
            counts: Arc<Mutex<[usize; 4]>>,
        }

        impl Observer for FlagCounter {
            fn track_power_changed(&mut self, _state: TriState) {
                self.counts.lock().unwrap()[0] += 1;
            }

            fn short_circuit_changed(&mut self, _state: TriState) {
                self.counts.lock().unwrap()[1] += 1;
            }

            fn emergency_stop_changed(&mut self, _state: TriState) {
                self.counts.lock().unwrap()[2] += 1;
            }

            fn prog_state_changed(&mut self, _state: TriState) {
                self.counts.lock().unwrap()[3] += 1;
            }
        }

        // main 100 mA, prog 10 mA, filtered 96 mA, 30 °C, supply 0x4A10,
        // vcc 0x3F8C, central state clear, low voltage and high temperature
        const SYSTEM_STATE: &[u8] = &[
            0x14, 0x00, 0x84, 0x00, 0x64, 0x00, 0x0A, 0x00, 0x60, 0x00, 0x1E, 0x00, 0x10, 0x4A,
            0x8C, 0x3F, 0x00, 0x03, 0x00, 0x00,
        ];

        let (mut z21, handle, _recorder) = client();
        let counter = FlagCounter::default();
        z21.add_observer(counter.clone()).unwrap();

        handle.push_inbound(SYSTEM_STATE);
        handle.push_inbound(SYSTEM_STATE);
        assert!(z21.receive().unwrap());
        assert!(z21.receive().unwrap());

        let state = z21.state();
        assert_eq!(state.track_power, TriState::Active);
        assert_eq!(state.short_circuit, TriState::Inactive);
        assert_eq!(state.emergency_stop, TriState::Inactive);
        assert_eq!(state.programming, TriState::Inactive);
        assert_eq!(*counter.counts.lock().unwrap(), [1, 1, 1, 1]);

        let diag = z21.diagnostics();
        assert_eq!(diag.main_current, "100 mA");
        assert_eq!(diag.prog_current, "10 mA");
        assert_eq!(diag.temperature, "30 °C");
        assert!(diag.low_voltage);
        assert!(diag.high_temperature);
        let data = diag.system_state.unwrap();
        assert_eq!(data.filtered_main_current, 96);
        assert_eq!(data.supply_voltage, 0x4A10);
        assert_eq!(data.vcc_voltage, 0x3F8C);
    }

    #[test]
    fn test_init_sends_queries() {
        let (mut z21, handle, recorder) = client();
        z21.init().unwrap();

        let sent = handle.sent();
        assert_eq!(sent.len(), 8);
        assert_eq!(
            sent[0].as_ref(),
            &[0x08, 0x00, 0x50, 0x00, 0x01, 0x01, 0x00, 0x00]
        );
        assert_eq!(
            sent[6].as_ref(),
            &[0x07, 0x00, 0x40, 0x00, 0x21, 0x24, 0x05]
        );
        assert_eq!(recorder.entries().len(), 8);
    }

    #[test]
    fn test_diagnostics_from_replies() {
        let (mut z21, handle, _recorder) = client();
        handle.push_inbound(vec![0x08, 0x00, 0x10, 0x00, 0x39, 0x30, 0x00, 0x00]);
        z21.receive().unwrap();
        assert_eq!(z21.diagnostics().serial_number, "12345");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cv_read_answered() {
        let (mut z21, handle, recorder) = client();
        z21.cv_read(8).unwrap();
        assert!(z21.prog_pending());

        handle.push_inbound(vec![0x0A, 0x00, 0x40, 0x00, 0x64, 0x14, 0x00, 0x07, 0x55, 0x22]);
        z21.receive().unwrap();
        assert!(!z21.prog_pending());

        tokio::time::advance(PROG_TIMEOUT * 2).await;
        z21.receive().unwrap();
        let entries = recorder.entries();
        assert_eq!(
            entries.last().unwrap(),
            "prog Success { cv: 8, value: 85 }"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_cv_result_with_bad_address_is_dropped() {
        let (mut z21, handle, recorder) = client();
        z21.cv_read(8).unwrap();

        handle.push_inbound(vec![0x0A, 0x00, 0x40, 0x00, 0x64, 0x14, 0xFF, 0xFF, 0x00, 0x00]);
        assert!(z21.receive().unwrap());

        assert!(z21.prog_pending());
        assert!(!recorder.entries().iter().any(|e| e.starts_with("prog")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cv_read_timeout() {
        let (mut z21, _handle, recorder) = client();
        z21.cv_write(29, 6).unwrap();

        tokio::time::advance(PROG_TIMEOUT - Duration::from_millis(1)).await;
        z21.receive().unwrap();
        assert!(z21.prog_pending());

        tokio::time::advance(Duration::from_millis(1)).await;
        z21.receive().unwrap();
        assert!(!z21.prog_pending());

        // reported once
        z21.receive().unwrap();
        let timeouts = recorder
            .entries()
            .iter()
            .filter(|e| *e == "prog Timeout")
            .count();
        assert_eq!(timeouts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_loop_heartbeat() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let (mut z21, handle, _recorder) = client();
        handle.push_inbound(POWER_ON);

        let config = RunConfig::new().poll_interval(Duration::from_millis(100));
        z21.run(config, tokio::time::sleep(Duration::from_secs(65)))
            .await
            .unwrap();

        assert_eq!(z21.state().track_power, TriState::Active);
        let sent = handle.sent();
        assert_eq!(sent.len(), 2);
        assert!(
            sent.iter()
                .all(|s| s.as_ref() == [0x07, 0x00, 0x40, 0x00, 0x21, 0x24, 0x05])
        );
    }

    #[test]
    fn test_run_config_defaults() {
        let config = RunConfig::default();
        assert_eq!(config.poll_interval, DEFAULT_POLL_INTERVAL);
        assert_eq!(config.heartbeat, HEARTBEAT_INTERVAL);
    }
}
