use crate::event::{DeviceEventKind, SeekerEvent};
use crate::eventbus::EventListener;
use tracing::{debug, info, warn};

/// Listener that turns every event into a `tracing` event.
///
/// Lifecycle goes to `info` (`warn` for troubled peripherals), connection edges
/// and presses to `debug`. Installing a subscriber is up to the host.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        TracingLogger
    }
}

impl EventListener for TracingLogger {
    fn on_event(&mut self, event: &SeekerEvent) {
        match event {
            SeekerEvent::Discovered {
                peripheral,
                name,
                transport,
                ..
            } => info!(%peripheral, name = name.as_str(), transport = transport.as_str(), "peripheral discovered"),
            SeekerEvent::Forgotten {
                peripheral,
                reason: crate::event::ForgetReason::Troubled(why),
                ..
            } => warn!(%peripheral, reason = why.as_str(), "peripheral quarantined"),
            SeekerEvent::Forgotten {
                peripheral, reason, ..
            } => info!(%peripheral, ?reason, "peripheral forgotten"),
            SeekerEvent::AmbiguityChanged { ambiguous, .. } => {
                info!(ambiguous, "USB / Bluetooth ambiguity changed")
            }
            SeekerEvent::Device { peripheral, event } => match &event.kind {
                DeviceEventKind::Connected => debug!(%peripheral, "connected"),
                DeviceEventKind::Disconnected => debug!(%peripheral, "disconnected"),
                DeviceEventKind::Pressable(press) => debug!(
                    %peripheral,
                    feature = press.feature,
                    direction = ?press.direction,
                    kind = ?press.kind,
                    "press"
                ),
            },
        }
    }
}
