//! Events emitted upward by devices and seekers.
//!
//! StickUp never reports discovery, forgetting or ambiguity through return values
//! of state queries; it emits small timestamped events instead:
//!
//! - [`DeviceEvent`]: produced by one device's `poll()` (connection edges and
//!   press / hold / release events from its pressable monitor).
//! - [`SeekerEvent`]: produced by a seeker (peripheral discovered / forgotten,
//!   ambiguity edges) and wrapping the device events of its active sessions.
//!
//! Timestamps are the `now` passed to the poll that produced the event, so they
//! are monotonic within a run and suitable for ordering.

use crate::peripheral::{PeripheralId, Transport};
use crate::pressable::Direction;
use std::time::Instant;

/// Press / hold / release classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PressKind {
    /// `held: false` for the initial press, `held: true` for repeats while held.
    Press { held: bool },
    /// The press lasted past the hold threshold. Emitted once per press.
    Hold,
    Release { was_held: bool },
}

/// Pressable-monitor output for one feature (and direction, for sticks).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PressEvent {
    pub feature: &'static str,
    pub direction: Option<Direction>,
    pub kind: PressKind,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEventKind {
    Connected,
    Disconnected,
    Pressable(PressEvent),
}

/// Event produced by a device poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceEvent {
    pub at: Instant,
    pub kind: DeviceEventKind,
}

impl DeviceEvent {
    pub fn press(&self) -> Option<&PressEvent> {
        match &self.kind {
            DeviceEventKind::Pressable(p) => Some(p),
            _ => None,
        }
    }
}

/// Why a seeker forgot a peripheral.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ForgetReason {
    /// The peripheral disappeared from enumeration or a detach notice arrived.
    Disconnected,
    /// Setup attempts were exhausted or the device faulted; the identity is quarantined.
    Troubled(String),
    /// The seeker was closed.
    Closed,
}

/// Event produced by a seeker.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeekerEvent {
    Discovered {
        peripheral: PeripheralId,
        name: String,
        transport: Transport,
        at: Instant,
    },
    Forgotten {
        peripheral: PeripheralId,
        reason: ForgetReason,
        at: Instant,
    },
    /// Fired only when the ambiguity condition flips.
    AmbiguityChanged { ambiguous: bool, at: Instant },
    /// Event from the device of an active session.
    Device {
        peripheral: PeripheralId,
        event: DeviceEvent,
    },
}

impl SeekerEvent {
    /// Peripheral this event concerns, if any.
    pub fn peripheral(&self) -> Option<&PeripheralId> {
        match self {
            SeekerEvent::Discovered { peripheral, .. }
            | SeekerEvent::Forgotten { peripheral, .. }
            | SeekerEvent::Device { peripheral, .. } => Some(peripheral),
            SeekerEvent::AmbiguityChanged { .. } => None,
        }
    }

    pub fn at(&self) -> Instant {
        match self {
            SeekerEvent::Discovered { at, .. }
            | SeekerEvent::Forgotten { at, .. }
            | SeekerEvent::AmbiguityChanged { at, .. } => *at,
            SeekerEvent::Device { event, .. } => event.at,
        }
    }

    /// Discovery, forgetting and ambiguity events.
    pub fn is_lifecycle(&self) -> bool {
        !matches!(self, SeekerEvent::Device { .. })
    }

    pub fn is_connection(&self) -> bool {
        matches!(
            self,
            SeekerEvent::Device {
                event: DeviceEvent {
                    kind: DeviceEventKind::Connected | DeviceEventKind::Disconnected,
                    ..
                },
                ..
            }
        )
    }

    pub fn is_pressable(&self) -> bool {
        matches!(
            self,
            SeekerEvent::Device {
                event: DeviceEvent {
                    kind: DeviceEventKind::Pressable(_),
                    ..
                },
                ..
            }
        )
    }
}
