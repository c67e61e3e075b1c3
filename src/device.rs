//! Devices: the public face of one adapter instance.
//!
//! [`Device`] is the object-safe trait seekers, managers and workers store as
//! `Box<dyn Device>`. [`AdaptedDevice`] is the one implementation the crate
//! ships: it owns a [`MappedFeatureRegistry`] plus a [`DeviceAdapter`] and drives
//! them in a fixed order on every poll:
//!
//! 1. `adapter.poll_device()` refreshes raw data,
//! 2. every mapped updater runs against that raw data,
//! 3. the connection flag is recomputed (edges become events),
//! 4. the pressable monitor and any attached monitors run.
//!
//! Errors from step 1 propagate to the caller of `poll`; nothing is retried here.

use crate::adapter::{AdapterState, DeviceAdapter};
use crate::config::PressableConfig;
use crate::error::{DeviceError, RegistryError};
use crate::event::{DeviceEvent, DeviceEventKind};
use crate::feature::{Feature, FeatureState};
use crate::metadata::DeviceMeta;
use crate::pressable::PressableMonitor;
use crate::registry::{FeatureRegistry, MappedFeatureRegistry};
use crate::state::{ButtonState, StickState};
use std::time::Instant;

/// Observer run at the end of every successful poll.
pub trait FeatureMonitor: Send {
    fn update(&mut self, now: Instant, out: &mut Vec<DeviceEvent>);
}

/// A polled input device.
pub trait Device: Send {
    /// Stable identifier (usually the peripheral id rendered as a string).
    fn id(&self) -> &str;

    /// Human-readable name.
    fn name(&self) -> &str;

    fn metadata(&self) -> DeviceMeta;

    /// Run one poll cycle, stamping events with `now`.
    fn poll_at(&mut self, now: Instant) -> Result<Vec<DeviceEvent>, DeviceError>;

    fn poll(&mut self) -> Result<Vec<DeviceEvent>, DeviceError> {
        self.poll_at(Instant::now())
    }

    /// Connection flag computed by the most recent poll.
    fn is_connected(&self) -> bool;

    /// Per-device feature table. Registered features can't be removed through it.
    fn features(&mut self) -> &mut FeatureRegistry;

    fn watch_button(
        &mut self,
        feature: &'static Feature<ButtonState>,
    ) -> Result<(), RegistryError>;

    fn watch_stick(&mut self, feature: &'static Feature<StickState>)
        -> Result<(), RegistryError>;

    fn add_monitor(&mut self, monitor: Box<dyn FeatureMonitor>);

    /// Release adapter resources. Safe to call more than once.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

impl dyn Device {
    /// Public view of `feature` on this device.
    pub fn state<S: FeatureState>(
        &mut self,
        feature: &'static Feature<S>,
    ) -> Result<S::View, RegistryError> {
        self.features().state(feature)
    }
}

/// Registry + adapter pair implementing [`Device`].
pub struct AdaptedDevice<A: DeviceAdapter> {
    id: String,
    name: String,
    meta: DeviceMeta,
    registry: MappedFeatureRegistry<A::Raw>,
    adapter: A,
    lifecycle: AdapterState,
    connected: bool,
    pressables: PressableMonitor,
    monitors: Vec<Box<dyn FeatureMonitor>>,
}

impl<A: DeviceAdapter> AdaptedDevice<A> {
    /// Build the device shell, then its registry, then the adapter (via `factory`),
    /// then run `init_adapter` and seal the mappings.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        meta: DeviceMeta,
        factory: impl FnOnce() -> A,
    ) -> Result<Self, DeviceError> {
        Self::with_pressable_config(id, name, meta, PressableConfig::default(), factory)
    }

    pub fn with_pressable_config(
        id: impl Into<String>,
        name: impl Into<String>,
        meta: DeviceMeta,
        pressable: PressableConfig,
        factory: impl FnOnce() -> A,
    ) -> Result<Self, DeviceError> {
        let mut registry = MappedFeatureRegistry::new();
        let mut adapter = factory();
        adapter.init_adapter(&mut registry)?;
        registry.seal()?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            meta,
            registry,
            adapter,
            lifecycle: AdapterState::Initialized,
            connected: false,
            pressables: PressableMonitor::new(pressable),
            monitors: Vec::new(),
        })
    }

    pub fn lifecycle(&self) -> AdapterState {
        self.lifecycle
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn pressables(&self) -> &PressableMonitor {
        &self.pressables
    }

    pub fn has_mapping<S: FeatureState>(&self, feature: &'static Feature<S>) -> bool {
        self.registry.has_mapping(feature)
    }

    /// Public view of `feature`.
    pub fn state<S: FeatureState>(
        &mut self,
        feature: &'static Feature<S>,
    ) -> Result<S::View, RegistryError> {
        self.registry.state(feature)
    }
}

impl<A: DeviceAdapter> Device for AdaptedDevice<A> {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn metadata(&self) -> DeviceMeta {
        self.meta.clone()
    }

    fn poll_at(&mut self, now: Instant) -> Result<Vec<DeviceEvent>, DeviceError> {
        if self.lifecycle == AdapterState::Closed {
            return Err(DeviceError::Closed);
        }

        self.adapter.poll_device()?;
        self.registry.update_all(self.adapter.raw());
        self.lifecycle = AdapterState::Polling;

        let mut events = Vec::new();
        let connected = self.adapter.is_device_connected();
        if connected != self.connected {
            self.connected = connected;
            events.push(DeviceEvent {
                at: now,
                kind: if connected {
                    DeviceEventKind::Connected
                } else {
                    DeviceEventKind::Disconnected
                },
            });
        }

        self.pressables.update(now, &mut events);
        for monitor in &mut self.monitors {
            monitor.update(now, &mut events);
        }
        Ok(events)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn features(&mut self) -> &mut FeatureRegistry {
        self.registry.registry_mut()
    }

    fn watch_button(
        &mut self,
        feature: &'static Feature<ButtonState>,
    ) -> Result<(), RegistryError> {
        self.pressables
            .watch_button(self.registry.registry_mut(), feature)
    }

    fn watch_stick(
        &mut self,
        feature: &'static Feature<StickState>,
    ) -> Result<(), RegistryError> {
        self.pressables
            .watch_stick(self.registry.registry_mut(), feature)
    }

    fn add_monitor(&mut self, monitor: Box<dyn FeatureMonitor>) {
        self.monitors.push(monitor);
    }

    fn close(&mut self) {
        if self.lifecycle == AdapterState::Closed {
            return;
        }
        self.adapter.close();
        self.pressables.clear();
        self.monitors.clear();
        self.connected = false;
        self.lifecycle = AdapterState::Closed;
    }

    fn is_closed(&self) -> bool {
        self.lifecycle == AdapterState::Closed
    }
}

impl<A: DeviceAdapter> Drop for AdaptedDevice<A> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::gamepad;
    use crate::event::PressKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    /// Writes `next` into its raw buffer on every poll.
    struct SentinelAdapter {
        raw: u32,
        next: u32,
        connected: bool,
        closes: Arc<AtomicUsize>,
        fail: bool,
    }

    impl SentinelAdapter {
        fn new(closes: Arc<AtomicUsize>) -> Self {
            Self {
                raw: 0,
                next: 0,
                connected: true,
                closes,
                fail: false,
            }
        }
    }

    impl DeviceAdapter for SentinelAdapter {
        type Raw = u32;

        fn init_adapter(
            &mut self,
            registry: &mut MappedFeatureRegistry<u32>,
        ) -> Result<(), DeviceError> {
            registry.map_feature(
                &gamepad::LEFT_TRIGGER,
                (),
                |s: &mut crate::state::TriggerState, _: &(), raw: &u32| {
                    s.value = *raw as f32;
                },
            )?;
            registry.map_feature(
                &gamepad::SOUTH,
                (),
                |s: &mut ButtonState, _: &(), raw: &u32| s.pressed = *raw & 1 == 1,
            )?;
            Ok(())
        }

        fn poll_device(&mut self) -> Result<(), DeviceError> {
            if self.fail {
                return Err(DeviceError::Io("unplugged".into()));
            }
            self.raw = self.next;
            Ok(())
        }

        fn raw(&self) -> &u32 {
            &self.raw
        }

        fn is_device_connected(&self) -> bool {
            self.connected
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn device(closes: &Arc<AtomicUsize>) -> AdaptedDevice<SentinelAdapter> {
        let closes = closes.clone();
        AdaptedDevice::new("test:0", "Sentinel", DeviceMeta::default(), move || {
            SentinelAdapter::new(closes)
        })
        .unwrap()
    }

    #[test]
    fn updaters_see_the_freshly_polled_sentinel() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut dev = device(&closes);
        let trigger = dev.state(&gamepad::LEFT_TRIGGER).unwrap();
        for sentinel in [7u32, 11, 42] {
            dev.adapter_mut().next = sentinel;
            dev.poll().unwrap();
            assert_eq!(trigger.value(), sentinel as f32);
        }
    }

    #[test]
    fn lifecycle_progresses() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut dev = device(&closes);
        assert_eq!(dev.lifecycle(), AdapterState::Initialized);
        dev.poll().unwrap();
        assert_eq!(dev.lifecycle(), AdapterState::Polling);
        dev.close();
        assert_eq!(dev.lifecycle(), AdapterState::Closed);
        assert!(matches!(dev.poll(), Err(DeviceError::Closed)));
    }

    #[test]
    fn close_is_idempotent_and_drop_does_not_close_twice() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut dev = device(&closes);
        dev.close();
        dev.close();
        drop(dev);
        assert_eq!(closes.load(Ordering::SeqCst), 1);

        let dev = device(&closes);
        drop(dev);
        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn connection_edges_are_reported_once() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut dev = device(&closes);
        let t0 = Instant::now();

        let first = dev.poll_at(t0).unwrap();
        assert_eq!(first[0].kind, DeviceEventKind::Connected);
        assert!(dev.poll_at(t0).unwrap().is_empty());

        dev.adapter_mut().connected = false;
        let ev = dev.poll_at(t0 + Duration::from_millis(5)).unwrap();
        assert_eq!(ev.len(), 1);
        assert_eq!(ev[0].kind, DeviceEventKind::Disconnected);
        assert!(!dev.is_connected());
    }

    #[test]
    fn poll_errors_propagate() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut dev = device(&closes);
        dev.adapter_mut().fail = true;
        assert_eq!(dev.poll(), Err(DeviceError::Io("unplugged".into())));
    }

    #[test]
    fn pressables_run_after_updaters() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut dev = device(&closes);
        dev.watch_button(&gamepad::SOUTH).unwrap();
        dev.adapter_mut().next = 1;
        let events = dev.poll().unwrap();
        let press = events.iter().find_map(|e| e.press()).unwrap();
        assert_eq!(press.feature, "gamepad.south");
        assert_eq!(press.kind, PressKind::Press { held: false });
    }

    struct Unmapped;

    impl DeviceAdapter for Unmapped {
        type Raw = ();

        fn init_adapter(
            &mut self,
            registry: &mut MappedFeatureRegistry<()>,
        ) -> Result<(), DeviceError> {
            registry.require(&gamepad::START);
            Ok(())
        }

        fn poll_device(&mut self) -> Result<(), DeviceError> {
            Ok(())
        }

        fn raw(&self) -> &() {
            &()
        }

        fn is_device_connected(&self) -> bool {
            true
        }
    }

    #[test]
    fn missing_mandatory_mapping_fails_construction() {
        let err = AdaptedDevice::new("x", "x", DeviceMeta::default(), || Unmapped)
            .err()
            .unwrap();
        assert_eq!(
            err,
            DeviceError::Registry(RegistryError::UnmappedFeature("gamepad.start"))
        );
    }

    #[test]
    fn dyn_device_exposes_views() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut boxed: Box<dyn Device> = Box::new(device(&closes));
        let south = boxed.state(&gamepad::SOUTH).unwrap();
        assert!(!south.is_pressed());
    }

    #[test]
    fn mapped_features_stay_reachable() {
        let closes = Arc::new(AtomicUsize::new(0));
        let mut boxed: Box<dyn Device> = Box::new(device(&closes));
        boxed.state(&gamepad::LEFT_TRIGGER).unwrap();
        assert!(!boxed.features().declare_absent(&gamepad::LEFT_TRIGGER));
        boxed.poll().unwrap();
        assert!(boxed.state(&gamepad::LEFT_TRIGGER).is_ok());
    }
}
