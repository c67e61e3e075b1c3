//! Scriptable in-process peripherals.
//!
//! - [`VirtualPad`]: handle a test (or a demo) uses to set buttons / axes and to
//!   inject poll failures into one pad.
//! - [`VirtualJoystick`]: the [`JoystickSource`] reading that pad.
//! - [`VirtualSource`]: a [`PeripheralSource`] over a set of virtual pads, driven
//!   through a cloneable [`VirtualControl`] (plug, unplug, replug with a new
//!   native handle, setup failure budgets).
//!
//! Everything is shared through `parking_lot::Mutex`, so the control handle can
//! live on another thread than the seeker.

use crate::config::PressableConfig;
use crate::device::{AdaptedDevice, Device};
use crate::error::{DeviceError, SetupError, SourceError};
use crate::joystick::{JoystickAdapter, JoystickKind, JoystickRaw, JoystickSource};
use crate::metadata::DeviceMeta;
use crate::peripheral::{NativeHandle, PeripheralId, PeripheralInfo, Transport};
use crate::seeker::PeripheralSource;
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Debug, Default)]
struct PadShared {
    raw: JoystickRaw,
    fail_next: Option<String>,
    rumble: (f32, f32),
    closed: bool,
}

/// Handle onto one virtual pad's raw data.
#[derive(Clone, Debug)]
pub struct VirtualPad {
    id: PeripheralId,
    kind: JoystickKind,
    shared: Arc<Mutex<PadShared>>,
}

impl VirtualPad {
    pub fn new(id: PeripheralId, kind: JoystickKind) -> Self {
        let layout = kind.layout();
        let raw = JoystickRaw {
            connected: true,
            ..JoystickRaw::with_capacity(layout.axes, layout.buttons)
        };
        Self {
            id,
            kind,
            shared: Arc::new(Mutex::new(PadShared {
                raw,
                ..PadShared::default()
            })),
        }
    }

    pub fn id(&self) -> &PeripheralId {
        &self.id
    }

    pub fn kind(&self) -> JoystickKind {
        self.kind
    }

    /// Out-of-range indices are ignored.
    pub fn set_button(&self, index: usize, pressed: bool) {
        if let Some(b) = self.shared.lock().raw.buttons.get_mut(index) {
            *b = pressed;
        }
    }

    pub fn set_axis(&self, index: usize, value: f32) {
        if let Some(a) = self.shared.lock().raw.axes.get_mut(index) {
            *a = value;
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.shared.lock().raw.connected = connected;
    }

    /// Make the next read fail with [`DeviceError::Io`].
    pub fn fail_next_poll(&self, message: impl Into<String>) {
        self.shared.lock().fail_next = Some(message.into());
    }

    /// Last `(strong, weak)` rumble written by the adapter.
    pub fn rumble(&self) -> (f32, f32) {
        self.shared.lock().rumble
    }

    pub fn is_closed(&self) -> bool {
        self.shared.lock().closed
    }

    pub fn joystick(&self) -> VirtualJoystick {
        VirtualJoystick { pad: self.clone() }
    }

    /// Wrap this pad in a ready-to-poll device.
    pub fn into_device(
        self,
        pressable: PressableConfig,
    ) -> Result<AdaptedDevice<JoystickAdapter<VirtualJoystick>>, DeviceError> {
        let kind = self.kind;
        let meta = DeviceMeta {
            bus: Some("virtual".into()),
            vid: Some(self.id.vendor_id),
            pid: Some(self.id.product_id),
            product_string: Some(format!("Virtual {}", kind.display_name())),
            ..DeviceMeta::default()
        };
        let name = meta.display_name(kind.display_name());
        AdaptedDevice::with_pressable_config(self.id.to_string(), name, meta, pressable, || {
            JoystickAdapter::new(kind, self.joystick())
        })
    }
}

/// [`JoystickSource`] backed by a [`VirtualPad`].
pub struct VirtualJoystick {
    pad: VirtualPad,
}

impl JoystickSource for VirtualJoystick {
    fn read(&mut self, raw: &mut JoystickRaw) -> Result<(), DeviceError> {
        let mut shared = self.pad.shared.lock();
        if let Some(message) = shared.fail_next.take() {
            return Err(DeviceError::Io(message));
        }
        raw.clone_from(&shared.raw);
        Ok(())
    }

    fn set_rumble(&mut self, strong: f32, weak: f32) -> Result<(), DeviceError> {
        self.pad.shared.lock().rumble = (strong, weak);
        Ok(())
    }

    fn close(&mut self) {
        self.pad.shared.lock().closed = true;
    }
}

#[derive(Debug)]
struct Entry {
    info: PeripheralInfo,
    pad: VirtualPad,
    present: bool,
    recoverable_failures: u32,
    fatal: bool,
    setup_calls: u32,
}

#[derive(Debug, Default)]
struct SourceShared {
    entries: Vec<Entry>,
    next_handle: u64,
    next_instance: u32,
    enumeration_error: Option<String>,
}

impl SourceShared {
    fn entry_mut(&mut self, id: &PeripheralId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| &e.info.id == id)
    }

    fn fresh_handle(&mut self) -> NativeHandle {
        self.next_handle += 1;
        NativeHandle(self.next_handle)
    }
}

/// Cloneable remote for a [`VirtualSource`].
#[derive(Clone, Debug)]
pub struct VirtualControl {
    shared: Arc<Mutex<SourceShared>>,
}

impl VirtualControl {
    /// Plug a generic-layout pad.
    pub fn plug_pad(&self, vendor_id: u16, product_id: u16, transport: Transport) -> VirtualPad {
        self.plug(JoystickKind::Generic, vendor_id, product_id, transport)
    }

    pub fn plug(
        &self,
        kind: JoystickKind,
        vendor_id: u16,
        product_id: u16,
        transport: Transport,
    ) -> VirtualPad {
        self.add(kind, vendor_id, product_id, transport, true).0
    }

    /// Register a pad the source can set up but does not enumerate (yet).
    /// Returns what a hotplug callback would report for it.
    pub fn describe_unplugged(
        &self,
        vendor_id: u16,
        product_id: u16,
        transport: Transport,
    ) -> PeripheralInfo {
        self.add(JoystickKind::Generic, vendor_id, product_id, transport, false)
            .1
    }

    fn add(
        &self,
        kind: JoystickKind,
        vendor_id: u16,
        product_id: u16,
        transport: Transport,
        present: bool,
    ) -> (VirtualPad, PeripheralInfo) {
        let mut shared = self.shared.lock();
        shared.next_instance += 1;
        let id = PeripheralId::new(
            vendor_id,
            product_id,
            format!("virtual-{}", shared.next_instance),
        );
        let handle = shared.fresh_handle();
        let pad = VirtualPad::new(id.clone(), kind);
        let info = PeripheralInfo {
            id,
            handle,
            transport,
            meta: DeviceMeta {
                bus: Some(transport.as_str().into()),
                vid: Some(vendor_id),
                pid: Some(product_id),
                product_string: Some(format!("Virtual {}", kind.display_name())),
                ..DeviceMeta::default()
            },
        };
        shared.entries.push(Entry {
            info: info.clone(),
            pad: pad.clone(),
            present,
            recoverable_failures: 0,
            fatal: false,
            setup_calls: 0,
        });
        (pad, info)
    }

    /// Remove from enumeration. The native handle is kept until [`replug`](Self::replug).
    pub fn unplug(&self, id: &PeripheralId) {
        if let Some(e) = self.shared.lock().entry_mut(id) {
            e.present = false;
        }
    }

    /// Physical reconnect: present again, with a new native handle.
    pub fn replug(&self, id: &PeripheralId) {
        let mut shared = self.shared.lock();
        let handle = shared.fresh_handle();
        if let Some(e) = shared.entry_mut(id) {
            e.present = true;
            e.info.handle = handle;
        }
    }

    /// Reconnect on the same port: present again, and the OS reports the same
    /// native handle as before.
    pub fn reattach(&self, id: &PeripheralId) {
        if let Some(e) = self.shared.lock().entry_mut(id) {
            e.present = true;
        }
    }

    /// The next `times` setups of `id` fail with a recoverable error.
    pub fn fail_setup(&self, id: &PeripheralId, times: u32) {
        if let Some(e) = self.shared.lock().entry_mut(id) {
            e.recoverable_failures = times;
        }
    }

    pub fn fail_setup_fatally(&self, id: &PeripheralId) {
        if let Some(e) = self.shared.lock().entry_mut(id) {
            e.fatal = true;
        }
    }

    /// The next enumeration fails.
    pub fn fail_enumeration(&self, message: impl Into<String>) {
        self.shared.lock().enumeration_error = Some(message.into());
    }

    pub fn setup_calls(&self, id: &PeripheralId) -> u32 {
        self.shared
            .lock()
            .entries
            .iter()
            .find(|e| &e.info.id == id)
            .map_or(0, |e| e.setup_calls)
    }

    pub fn info(&self, id: &PeripheralId) -> Option<PeripheralInfo> {
        self.shared
            .lock()
            .entries
            .iter()
            .find(|e| &e.info.id == id)
            .map(|e| e.info.clone())
    }
}

/// [`PeripheralSource`] over virtual pads.
#[derive(Debug, Default)]
pub struct VirtualSource {
    shared: Arc<Mutex<SourceShared>>,
}

impl VirtualSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn control(&self) -> VirtualControl {
        VirtualControl {
            shared: self.shared.clone(),
        }
    }
}

impl PeripheralSource for VirtualSource {
    fn name(&self) -> &str {
        "virtual"
    }

    fn enumerate(&mut self) -> Result<Vec<PeripheralInfo>, SourceError> {
        let mut shared = self.shared.lock();
        if let Some(message) = shared.enumeration_error.take() {
            return Err(SourceError::Enumeration(message));
        }
        Ok(shared
            .entries
            .iter()
            .filter(|e| e.present)
            .map(|e| e.info.clone())
            .collect())
    }

    fn setup(
        &mut self,
        info: &PeripheralInfo,
        pressable: &PressableConfig,
    ) -> Result<Box<dyn Device>, SetupError> {
        let pad = {
            let mut shared = self.shared.lock();
            let entry = shared
                .entry_mut(&info.id)
                .ok_or_else(|| SetupError::Fatal(format!("unknown virtual pad {}", info.id)))?;
            entry.setup_calls += 1;
            if entry.fatal {
                return Err(SetupError::Fatal("pad refused to open".into()));
            }
            if entry.recoverable_failures > 0 {
                entry.recoverable_failures -= 1;
                return Err(SetupError::Recoverable("pad busy".into()));
            }
            entry.pad.clone()
        };
        let device = pad.into_device(pressable.clone())?;
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::gamepad;

    #[test]
    fn pad_drives_a_device() {
        let pad = VirtualPad::new(PeripheralId::new(1, 2, "p"), JoystickKind::Generic);
        let mut dev = pad.clone().into_device(PressableConfig::default()).unwrap();
        let north = dev.state(&gamepad::NORTH).unwrap();
        pad.set_button(3, true);
        dev.poll().unwrap();
        assert!(north.is_pressed());
        assert_eq!(dev.name(), "Virtual Gamepad");
    }

    #[test]
    fn injected_failure_hits_one_poll() {
        let pad = VirtualPad::new(PeripheralId::new(1, 2, "p"), JoystickKind::Generic);
        let mut dev = pad.clone().into_device(PressableConfig::default()).unwrap();
        pad.fail_next_poll("boom");
        assert_eq!(dev.poll(), Err(DeviceError::Io("boom".into())));
        assert!(dev.poll().is_ok());
    }

    #[test]
    fn closing_the_device_closes_the_source() {
        let pad = VirtualPad::new(PeripheralId::new(1, 2, "p"), JoystickKind::Xbox);
        let dev = pad.clone().into_device(PressableConfig::default()).unwrap();
        drop(dev);
        assert!(pad.is_closed());
    }

    #[test]
    fn replug_issues_a_new_handle() {
        let source = VirtualSource::new();
        let control = source.control();
        let pad = control.plug_pad(1, 2, Transport::Usb);
        let before = control.info(pad.id()).unwrap().handle;
        control.unplug(pad.id());
        control.replug(pad.id());
        assert_ne!(control.info(pad.id()).unwrap().handle, before);
    }

    #[test]
    fn enumeration_lists_present_pads_only() {
        let mut source = VirtualSource::new();
        let control = source.control();
        let a = control.plug_pad(1, 2, Transport::Usb);
        control.describe_unplugged(1, 2, Transport::Bluetooth);
        let listed = source.enumerate().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(&listed[0].id, a.id());

        control.fail_enumeration("bus reset");
        assert!(source.enumerate().is_err());
        assert_eq!(source.enumerate().unwrap().len(), 1);
    }
}
