//! Notifications delivered to observers.
//!
//! Observers implement [`Observer`], which has one method per event class.
//! Internally every notification is first built as an [`Event`] and then
//! fanned out to the registered observers in registration order.
//! [`EventChannel`] bridges the observer interface to a tokio broadcast
//! channel for consumers that prefer to `await` events.

use std::time::Duration;

use tokio::sync::broadcast;

use crate::error::{Error, Result};
use crate::types::{AccessoryInfo, BroadcastFlags, Diagnostics, LocoInfo, ProgResult, TriState};

/// Maximum number of registered observers.
pub const MAX_OBSERVERS: usize = 20;

/// Direction of a traced message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceDirection {
    /// Sent to the command station.
    ToStation,
    /// Received from the command station.
    FromStation,
}

/// A traced message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    /// Message direction.
    pub direction: TraceDirection,
    /// Time since the previous message in the same direction.
    pub since_last: Duration,
    /// Message name (e.g. `LAN_X_SET_LOCO_DRIVE`).
    pub message: String,
    /// Raw frame bytes as hex.
    pub parameters: String,
}

/// Event types that can be dispatched.
#[derive(Debug, Clone)]
pub enum Event {
    /// Track power changed.
    TrackPowerChanged(TriState),
    /// Short circuit state changed.
    ShortCircuitChanged(TriState),
    /// Emergency stop state changed.
    EmergencyStopChanged(TriState),
    /// Programming mode changed.
    ProgStateChanged(TriState),
    /// A CV read or write finished.
    ProgResult(ProgResult),
    /// Loco info received.
    LocoInfo(Box<LocoInfo>),
    /// Accessory state received.
    AccessoryState(AccessoryInfo),
    /// Diagnostic values were updated.
    DiagnosticsChanged(Box<Diagnostics>),
    /// Broadcast flags were read back.
    BroadcastFlagsChanged(BroadcastFlags),
    /// A message was sent or received.
    Trace(Box<Trace>),
}

impl Event {
    /// Delivers this event to the matching observer method.
    pub fn notify(&self, observer: &mut dyn Observer) {
        match self {
            Self::TrackPowerChanged(state) => observer.track_power_changed(*state),
            Self::ShortCircuitChanged(state) => observer.short_circuit_changed(*state),
            Self::EmergencyStopChanged(state) => observer.emergency_stop_changed(*state),
            Self::ProgStateChanged(state) => observer.prog_state_changed(*state),
            Self::ProgResult(result) => observer.prog_result(*result),
            Self::LocoInfo(info) => observer.loco_info_changed(info),
            Self::AccessoryState(info) => observer.accessory_state_changed(*info),
            Self::DiagnosticsChanged(diag) => observer.diagnostics_changed(diag),
            Self::BroadcastFlagsChanged(flags) => observer.broadcast_flags_changed(*flags),
            Self::Trace(trace) => observer.trace(trace),
        }
    }
}

/// Receiver of command station notifications.
///
/// Every method has an empty default so observers only implement what they
/// care about.
#[allow(unused_variables)]
pub trait Observer: Send {
    /// Track power changed.
    fn track_power_changed(&mut self, state: TriState) {}

    /// Short circuit state changed.
    fn short_circuit_changed(&mut self, state: TriState) {}

    /// Emergency stop state changed.
    fn emergency_stop_changed(&mut self, state: TriState) {}

    /// Programming mode changed.
    fn prog_state_changed(&mut self, state: TriState) {}

    /// A CV read or write finished.
    fn prog_result(&mut self, result: ProgResult) {}

    /// Loco info received. Not debounced.
    fn loco_info_changed(&mut self, info: &LocoInfo) {}

    /// Accessory state received. Not debounced.
    fn accessory_state_changed(&mut self, info: AccessoryInfo) {}

    /// Diagnostic values were updated.
    fn diagnostics_changed(&mut self, diagnostics: &Diagnostics) {}

    /// Broadcast flags were read back.
    fn broadcast_flags_changed(&mut self, flags: BroadcastFlags) {}

    /// A message was sent or received.
    fn trace(&mut self, trace: &Trace) {}
}

/// Ordered, bounded set of observers.
#[derive(Default)]
pub struct ObserverSet {
    observers: Vec<Box<dyn Observer>>,
}

impl ObserverSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            observers: Vec::with_capacity(MAX_OBSERVERS),
        }
    }

    /// Appends an observer.
    ///
    /// Duplicates are not detected. When the set is full the observer is
    /// dropped and an error returned; registered observers are unaffected.
    pub fn add(&mut self, observer: Box<dyn Observer>) -> Result<()> {
        if self.observers.len() >= MAX_OBSERVERS {
            tracing::warn!("observer limit {} reached, registration ignored", MAX_OBSERVERS);
            return Err(Error::TooManyObservers { max: MAX_OBSERVERS });
        }
        self.observers.push(observer);
        Ok(())
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.observers.len()
    }

    /// Returns true if no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Delivers an event to every observer in registration order.
    pub fn dispatch(&mut self, event: &Event) {
        for observer in &mut self.observers {
            event.notify(observer.as_mut());
        }
    }
}

impl std::fmt::Debug for ObserverSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObserverSet")
            .field("len", &self.observers.len())
            .finish()
    }
}

/// A subscription to events from an [`EventChannel`].
pub struct Subscription {
    receiver: broadcast::Receiver<Event>,
}

impl Subscription {
    /// Receives the next event.
    ///
    /// Returns `None` once the channel is closed. Lagged events are skipped.
    pub async fn recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::debug!("subscription lagged, {} events skipped", n);
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<Event> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(_)) => {}
                Err(_) => return None,
            }
        }
    }
}

/// Observer that republishes every notification on a broadcast channel.
#[derive(Clone)]
pub struct EventChannel {
    sender: broadcast::Sender<Event>,
}

impl EventChannel {
    /// Creates a channel buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribes to events.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
        }
    }

    fn publish(&self, event: Event) {
        // No receivers is fine
        let _ = self.sender.send(event);
    }
}

impl Observer for EventChannel {
    fn track_power_changed(&mut self, state: TriState) {
        self.publish(Event::TrackPowerChanged(state));
    }

    fn short_circuit_changed(&mut self, state: TriState) {
        self.publish(Event::ShortCircuitChanged(state));
    }

    fn emergency_stop_changed(&mut self, state: TriState) {
        self.publish(Event::EmergencyStopChanged(state));
    }

    fn prog_state_changed(&mut self, state: TriState) {
        self.publish(Event::ProgStateChanged(state));
    }

    fn prog_result(&mut self, result: ProgResult) {
        self.publish(Event::ProgResult(result));
    }

    fn loco_info_changed(&mut self, info: &LocoInfo) {
        self.publish(Event::LocoInfo(Box::new(info.clone())));
    }

    fn accessory_state_changed(&mut self, info: AccessoryInfo) {
        self.publish(Event::AccessoryState(info));
    }

    fn diagnostics_changed(&mut self, diagnostics: &Diagnostics) {
        self.publish(Event::DiagnosticsChanged(Box::new(diagnostics.clone())));
    }

    fn broadcast_flags_changed(&mut self, flags: BroadcastFlags) {
        self.publish(Event::BroadcastFlagsChanged(flags));
    }

    fn trace(&mut self, trace: &Trace) {
        self.publish(Event::Trace(Box::new(trace.clone())));
    }
}
