//! `hidapi`-backed peripheral source.
//!
//! Enumerates HID game-control endpoints (Generic Desktop joystick / gamepad)
//! and opens DualShock 4 pads through the report adapter. Other endpoints are
//! reported so the seeker can quarantine them, but their setup fails fatally.
//!
//! The `HidApi` context is process-wide: every [`HidSource`] shares it through a
//! [`LibrarySlot`], and it is released when the last source is dropped.

use crate::backends::ds4::{self, open_ds4};
use crate::backends::report::ReportReader;
use crate::config::PressableConfig;
use crate::context::LibrarySlot;
use crate::device::Device;
use crate::error::{DeviceError, SetupError, SourceError};
use crate::metadata::DeviceMeta;
use crate::peripheral::{NativeHandle, PeripheralId, PeripheralInfo, Transport};
use crate::seeker::PeripheralSource;
use hidapi::{BusType, DeviceInfo, HidApi, HidDevice};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::ffi::CString;
use std::sync::Arc;
use tracing::{debug, warn};

static HIDAPI: LibrarySlot<Mutex<HidApi>> = LibrarySlot::new();

const USAGE_PAGE_GENERIC_DESKTOP: u16 = 0x01;
const USAGE_JOYSTICK: u16 = 0x04;
const USAGE_GAMEPAD: u16 = 0x05;

/// Feature report that switches a Bluetooth DualShock 4 to full `0x11` input reports.
const DS4_BT_CALIBRATION_REPORT: u8 = 0x02;
const DS4_BT_CALIBRATION_LEN: usize = 37;

pub(crate) fn transport_of(bus: BusType) -> Transport {
    match bus {
        BusType::Usb => Transport::Usb,
        BusType::Bluetooth => Transport::Bluetooth,
        _ => Transport::Other,
    }
}

/// Serial number when the firmware reports one, else the OS path.
pub(crate) fn instance_of(serial: Option<&str>, path: &str) -> String {
    match serial {
        Some(s) if !s.trim().is_empty() => s.to_string(),
        _ => path.to_string(),
    }
}

/// Path-derived. The OS may hand the same path to a pad reattached on the same
/// port, so the seeker also treats an enumeration gap as a reconnect.
pub(crate) fn handle_of(path: &[u8]) -> NativeHandle {
    NativeHandle(u64::from(crc32fast::hash(path)))
}

fn is_game_control(info: &DeviceInfo) -> bool {
    info.usage_page() == USAGE_PAGE_GENERIC_DESKTOP
        && matches!(info.usage(), USAGE_JOYSTICK | USAGE_GAMEPAD)
}

fn meta(info: &DeviceInfo, transport: Transport) -> DeviceMeta {
    let interface_number = Some(info.interface_number()).filter(|n| *n >= 0);
    DeviceMeta {
        bus: Some(transport.as_str().to_string()),
        vid: Some(info.vendor_id()),
        pid: Some(info.product_id()),
        product_string: info.product_string().map(str::to_string),
        serial_number: info.serial_number().map(str::to_string),
        interface_number,
        usage_page: Some(info.usage_page()),
        usage: Some(info.usage()),
        path: Some(info.path().to_string_lossy().to_string()),
    }
}

/// Non-blocking [`ReportReader`] over an open `HidDevice`.
pub struct HidReader {
    device: HidDevice,
}

impl HidReader {
    pub fn new(device: HidDevice) -> Result<Self, DeviceError> {
        device
            .set_blocking_mode(false)
            .map_err(|e| DeviceError::Io(e.to_string()))?;
        Ok(Self { device })
    }
}

impl ReportReader for HidReader {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, DeviceError> {
        self.device
            .read(buf)
            .map_err(|e| DeviceError::Io(e.to_string()))
    }

    fn write(&mut self, report: &[u8]) -> Result<usize, DeviceError> {
        self.device
            .write(report)
            .map_err(|e| DeviceError::Io(e.to_string()))
    }
}

pub struct HidSource {
    api: Arc<Mutex<HidApi>>,
    paths: HashMap<PeripheralId, CString>,
}

impl HidSource {
    pub fn new() -> Result<Self, SourceError> {
        let api = HIDAPI.acquire(|| {
            HidApi::new()
                .map(Mutex::new)
                .map_err(|e| SourceError::Unavailable(e.to_string()))
        })?;
        Ok(Self {
            api,
            paths: HashMap::new(),
        })
    }
}

impl PeripheralSource for HidSource {
    fn name(&self) -> &str {
        "hid"
    }

    fn enumerate(&mut self) -> Result<Vec<PeripheralInfo>, SourceError> {
        let mut api = self.api.lock();
        api.refresh_devices()
            .map_err(|e| SourceError::Enumeration(e.to_string()))?;

        self.paths.clear();
        let mut found = Vec::new();
        for info in api.device_list().filter(|i| is_game_control(i)) {
            let path = info.path();
            let transport = transport_of(info.bus_type());
            let id = PeripheralId::new(
                info.vendor_id(),
                info.product_id(),
                instance_of(info.serial_number(), &path.to_string_lossy()),
            );
            // Composite devices list one entry per top-level collection.
            if self.paths.contains_key(&id) {
                continue;
            }
            self.paths.insert(id.clone(), path.to_owned());
            found.push(PeripheralInfo {
                id,
                handle: handle_of(path.to_bytes()),
                transport,
                meta: meta(info, transport),
            });
        }
        Ok(found)
    }

    fn setup(
        &mut self,
        info: &PeripheralInfo,
        pressable: &PressableConfig,
    ) -> Result<Box<dyn Device>, SetupError> {
        if !ds4::is_ds4(info.id.vendor_id, info.id.product_id) {
            return Err(SetupError::Fatal(format!(
                "no report layout for {:04x}:{:04x}",
                info.id.vendor_id, info.id.product_id
            )));
        }
        let path = self
            .paths
            .get(&info.id)
            .ok_or_else(|| SetupError::Recoverable(format!("{} is no longer listed", info.id)))?;

        let device = self.api.lock().open_path(path).map_err(|e| {
            warn!(peripheral = %info.id, error = %e, "HID open failed");
            SetupError::Recoverable(e.to_string())
        })?;

        if info.transport == Transport::Bluetooth {
            let mut calibration = [0u8; DS4_BT_CALIBRATION_LEN];
            calibration[0] = DS4_BT_CALIBRATION_REPORT;
            if let Err(e) = device.get_feature_report(&mut calibration) {
                debug!(peripheral = %info.id, error = %e, "calibration report unavailable");
            }
        }

        let reader = HidReader::new(device)?;
        let device = open_ds4(info, reader, pressable.clone())?;
        Ok(Box::new(device))
    }

    fn close(&mut self) {
        self.paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bus_types_map_to_transports() {
        assert_eq!(transport_of(BusType::Usb), Transport::Usb);
        assert_eq!(transport_of(BusType::Bluetooth), Transport::Bluetooth);
        assert_eq!(transport_of(BusType::Unknown), Transport::Other);
    }

    #[test]
    fn blank_serials_fall_back_to_the_path() {
        assert_eq!(instance_of(Some("A1B2"), "/dev/hidraw3"), "A1B2");
        assert_eq!(instance_of(Some("  "), "/dev/hidraw3"), "/dev/hidraw3");
        assert_eq!(instance_of(None, "/dev/hidraw3"), "/dev/hidraw3");
    }

    #[test]
    fn handles_follow_the_path() {
        assert_eq!(handle_of(b"/dev/hidraw3"), handle_of(b"/dev/hidraw3"));
        assert_ne!(handle_of(b"/dev/hidraw3"), handle_of(b"/dev/hidraw4"));
    }
}
