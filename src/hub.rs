//! Last-known command station state and observer fan-out.
//!
//! The four status flags are debounced: a setter only notifies observers
//! when the stored value actually changes, so each transition is seen once
//! regardless of how many pushes repeat it.

use crate::error::Result;
use crate::event::{Event, Observer, ObserverSet, Trace};
use crate::types::{BroadcastFlags, Diagnostics, SystemState, TriState};

/// State and notification hub.
#[derive(Debug, Default)]
pub struct StateHub {
    state: SystemState,
    diagnostics: Diagnostics,
    broadcast_flags: Option<BroadcastFlags>,
    observers: ObserverSet,
}

impl StateHub {
    /// Creates a hub with every flag unknown and no observers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an observer.
    pub fn add_observer(&mut self, observer: Box<dyn Observer>) -> Result<()> {
        self.observers.add(observer)
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Current status flags.
    #[must_use]
    pub const fn state(&self) -> SystemState {
        self.state
    }

    /// Diagnostic values.
    #[must_use]
    pub const fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Mutable access to the diagnostic values.
    ///
    /// Call [`StateHub::diagnostics_updated`] afterwards to notify observers.
    pub fn diagnostics_mut(&mut self) -> &mut Diagnostics {
        &mut self.diagnostics
    }

    /// Broadcast flags as last read back, `None` until then.
    #[must_use]
    pub const fn broadcast_flags(&self) -> Option<BroadcastFlags> {
        self.broadcast_flags
    }

    /// Delivers an event to all observers.
    pub fn notify(&mut self, event: &Event) {
        self.observers.dispatch(event);
    }

    /// Notifies observers that diagnostics changed.
    pub fn diagnostics_updated(&mut self) {
        let event = Event::DiagnosticsChanged(Box::new(self.diagnostics.clone()));
        self.notify(&event);
    }

    /// Stores broadcast flags read back from the station and notifies.
    pub fn set_broadcast_flags(&mut self, flags: BroadcastFlags) {
        self.broadcast_flags = Some(flags);
        self.notify(&Event::BroadcastFlagsChanged(flags));
    }

    /// Sends a trace record to observers.
    pub fn trace(&mut self, trace: Trace) {
        self.notify(&Event::Trace(Box::new(trace)));
    }

    /// Updates the track power flag.
    pub fn set_track_power(&mut self, value: TriState) {
        if update(&mut self.state.track_power, value) {
            tracing::debug!("track power {}", value);
            self.notify(&Event::TrackPowerChanged(value));
        }
    }

    /// Updates the emergency stop flag.
    pub fn set_emergency_stop(&mut self, value: TriState) {
        if update(&mut self.state.emergency_stop, value) {
            tracing::debug!("emergency stop {}", value);
            self.notify(&Event::EmergencyStopChanged(value));
        }
    }

    /// Updates the short circuit flag.
    pub fn set_short_circuit(&mut self, value: TriState) {
        if update(&mut self.state.short_circuit, value) {
            tracing::debug!("short circuit {}", value);
            self.notify(&Event::ShortCircuitChanged(value));
        }
    }

    /// Updates the programming mode flag.
    pub fn set_programming(&mut self, value: TriState) {
        if update(&mut self.state.programming, value) {
            tracing::debug!("programming mode {}", value);
            self.notify(&Event::ProgStateChanged(value));
        }
    }

    /// Applies all four flags.
    pub fn apply_state(&mut self, state: SystemState) {
        self.set_track_power(state.track_power);
        self.set_emergency_stop(state.emergency_stop);
        self.set_short_circuit(state.short_circuit);
        self.set_programming(state.programming);
    }
}

/// Stores `value` if it is known and differs. Returns true on change.
fn update(slot: &mut TriState, value: TriState) -> bool {
    if !value.is_known() || *slot == value {
        return false;
    }
    *slot = value;
    true
}
