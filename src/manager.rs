//! Top-level driver over several seekers.
//!
//! A [`Manager`] owns any number of seekers (one per vendor source) and an
//! [`EventBus`]. Each [`tick_at`](Manager::tick_at) runs seek + poll on every
//! seeker in registration order and fans the resulting events out to the bus.
//! A failing seeker does not stop the others; the first error of the tick is
//! returned once every seeker has run.

use crate::device::Device;
use crate::error::SeekerError;
use crate::event::SeekerEvent;
use crate::eventbus::{EventBus, EventFilter, EventListener, ListenerId};
use crate::peripheral::PeripheralId;
use crate::seeker::DeviceSeeker;
use std::time::Instant;
use tracing::warn;

#[derive(Default)]
pub struct Manager {
    seekers: Vec<Box<dyn DeviceSeeker>>,
    bus: EventBus,
}

impl Manager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_seeker(&mut self, seeker: impl DeviceSeeker + 'static) {
        self.seekers.push(Box::new(seeker));
    }

    pub fn with_seeker(mut self, seeker: impl DeviceSeeker + 'static) -> Self {
        self.add_seeker(seeker);
        self
    }

    pub fn add_listener(
        &mut self,
        listener: impl EventListener + 'static,
        filter: EventFilter,
        tag: Option<PeripheralId>,
    ) -> ListenerId {
        self.bus.add_listener(listener, filter, tag)
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut EventBus {
        &mut self.bus
    }

    pub fn seekers(&self) -> impl Iterator<Item = &dyn DeviceSeeker> + '_ {
        self.seekers.iter().map(|s| s.as_ref())
    }

    /// Whether any seeker currently sees one device over two transports.
    pub fn is_ambiguous(&self) -> bool {
        self.seekers.iter().any(|s| s.is_ambiguous())
    }

    /// Active peripherals across all seekers.
    pub fn active(&self) -> Vec<PeripheralId> {
        self.seekers.iter().flat_map(|s| s.active()).collect()
    }

    pub fn device_mut(&mut self, id: &PeripheralId) -> Option<&mut (dyn Device + 'static)> {
        self.seekers.iter_mut().find_map(|s| s.device_mut(id))
    }

    /// One seek + poll round over every seeker.
    pub fn tick_at(&mut self, now: Instant) -> Result<(), SeekerError> {
        let mut first_error = None;
        for seeker in &mut self.seekers {
            for result in [seeker.seek_at(now), seeker.poll_at(now)] {
                match result {
                    Ok(events) => self.bus.emit_all(&events),
                    Err(err) => {
                        warn!(seeker = seeker.name(), error = %err, "seeker failed this tick");
                        first_error.get_or_insert(err);
                    }
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    pub fn tick(&mut self) -> Result<(), SeekerError> {
        self.tick_at(Instant::now())
    }

    /// Close every seeker, delivering their final `Forgotten` events.
    pub fn close_at(&mut self, now: Instant) {
        for seeker in &mut self.seekers {
            let events: Vec<SeekerEvent> = seeker.close_at(now);
            self.bus.emit_all(&events);
        }
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.close_at(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::virtual_input::VirtualSource;
    use crate::config::SeekerConfig;
    use crate::event::ForgetReason;
    use crate::peripheral::Transport;
    use crate::seeker::Seeker;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn seeker(source: VirtualSource) -> Seeker<VirtualSource> {
        Seeker::new(
            source,
            SeekerConfig {
                scan_interval_ms: 10,
                setup_attempts: 3,
            },
        )
        .unwrap()
    }

    fn recorder(manager: &mut Manager, filter: EventFilter) -> Arc<Mutex<Vec<SeekerEvent>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        manager.add_listener(move |e: &SeekerEvent| sink.lock().push(e.clone()), filter, None);
        seen
    }

    #[test]
    fn a_failing_seeker_does_not_stop_the_others() {
        let broken = VirtualSource::new();
        broken.control().fail_enumeration("bus reset");
        let healthy = VirtualSource::new();
        let pad = healthy.control().plug_pad(0x045e, 0x028e, Transport::Usb);

        let mut manager = Manager::new()
            .with_seeker(seeker(broken))
            .with_seeker(seeker(healthy));
        let seen = recorder(&mut manager, EventFilter::Lifecycle);

        let err = manager.tick_at(Instant::now()).unwrap_err();
        assert!(matches!(err, SeekerError::Source(_)));
        assert_eq!(manager.active(), vec![pad.id().clone()]);
        assert!(matches!(
            seen.lock().as_slice(),
            [SeekerEvent::Discovered { peripheral, .. }] if peripheral == pad.id()
        ));
    }

    #[test]
    fn close_delivers_forgotten_events_once() {
        let source = VirtualSource::new();
        source.control().plug_pad(1, 2, Transport::Usb);
        let mut manager = Manager::new().with_seeker(seeker(source));
        let seen = recorder(&mut manager, EventFilter::Lifecycle);

        let t0 = Instant::now();
        manager.tick_at(t0).unwrap();
        manager.close_at(t0);
        manager.close_at(t0);

        let closed = seen
            .lock()
            .iter()
            .filter(|e| matches!(e, SeekerEvent::Forgotten { reason: ForgetReason::Closed, .. }))
            .count();
        assert_eq!(closed, 1);
        assert!(manager.active().is_empty());
    }

    #[test]
    fn devices_are_reachable_through_the_manager() {
        let source = VirtualSource::new();
        let pad = source.control().plug_pad(1, 2, Transport::Usb);
        let mut manager = Manager::new().with_seeker(seeker(source));
        manager.tick_at(Instant::now()).unwrap();
        let device = manager.device_mut(pad.id()).unwrap();
        assert!(device.is_connected());
    }
}
