//! Fan-out of seeker events to registered listeners.

use crate::event::SeekerEvent;
use crate::peripheral::PeripheralId;
use std::collections::BTreeMap;

/// Reacts to events emitted by seekers and their devices.
pub trait EventListener: Send {
    fn on_event(&mut self, event: &SeekerEvent);
}

impl<F: FnMut(&SeekerEvent) + Send> EventListener for F {
    fn on_event(&mut self, event: &SeekerEvent) {
        self(event)
    }
}

/// Which kinds of events a listener wants to receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventFilter {
    All,
    /// Discovered, forgotten and ambiguity events.
    Lifecycle,
    /// Device connected / disconnected edges.
    Connection,
    /// Press, hold and release events.
    Pressables,
    Custom(fn(&SeekerEvent) -> bool),
}

impl EventFilter {
    pub fn accepts(&self, event: &SeekerEvent) -> bool {
        match self {
            EventFilter::All => true,
            EventFilter::Lifecycle => event.is_lifecycle(),
            EventFilter::Connection => event.is_connection(),
            EventFilter::Pressables => event.is_pressable(),
            EventFilter::Custom(f) => f(event),
        }
    }
}

/// Registration handle returned by [`EventBus::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

struct ListenerEntry {
    listener: Box<dyn EventListener>,
    enabled: bool,
    filter: EventFilter,
    /// Only events about this peripheral. Events without one (ambiguity) still pass.
    tag: Option<PeripheralId>,
}

impl ListenerEntry {
    fn wants(&self, event: &SeekerEvent) -> bool {
        if !self.enabled {
            return false;
        }
        if let (Some(wanted), Some(peripheral)) = (&self.tag, event.peripheral()) {
            if wanted != peripheral {
                return false;
            }
        }
        self.filter.accepts(event)
    }
}

/// Listeners are invoked in registration order.
#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: BTreeMap<ListenerId, ListenerEntry>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_listener(
        &mut self,
        listener: impl EventListener + 'static,
        filter: EventFilter,
        tag: Option<PeripheralId>,
    ) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.insert(
            id,
            ListenerEntry {
                listener: Box::new(listener),
                enabled: true,
                filter,
                tag,
            },
        );
        id
    }

    pub fn enable(&mut self, id: ListenerId) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = true;
        }
    }

    /// Mute a listener without removing it.
    pub fn disable(&mut self, id: ListenerId) {
        if let Some(entry) = self.listeners.get_mut(&id) {
            entry.enabled = false;
        }
    }

    /// Returns whether the listener was registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn emit(&mut self, event: &SeekerEvent) {
        for entry in self.listeners.values_mut() {
            if entry.wants(event) {
                entry.listener.on_event(event);
            }
        }
    }

    pub fn emit_all(&mut self, events: &[SeekerEvent]) {
        for event in events {
            self.emit(event);
        }
    }
}
