//! Device metadata snapshot.
//!
//! [`DeviceMeta`] is a lightweight, cloneable description of a device suitable
//! for UI display and logging. Sources populate what they know; unknown fields
//! remain `None`.
//!
//! # Conventions
//! - `bus` is a short, human-readable hint like `"usb"`, `"bluetooth"`, `"xinput"`, `"virtual"`.
//! - `product_string` should be a friendly, user-facing name when available.
//! - `path` is an OS/topology path (opaque string) useful for diagnostics.
//!
//! `path` is platform-specific and may change across ports, drivers and
//! reconnects; treat it as diagnostic first, identity second.

use serde::{Deserialize, Serialize};

/// Snapshot of metadata describing a single device.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DeviceMeta {
    /// High-level bus classification.
    pub bus: Option<String>,

    /// USB Vendor ID (VID), if known.
    pub vid: Option<u16>,

    /// USB Product ID (PID), if known.
    pub pid: Option<u16>,

    /// Human-readable product name from the driver/firmware.
    pub product_string: Option<String>,

    /// Device serial number supplied by firmware/OS, if present.
    pub serial_number: Option<String>,

    /// HID interface index (platform-reported). `None` when not applicable.
    pub interface_number: Option<i32>,

    /// HID Usage Page (e.g., `0x01` for Generic Desktop), if known.
    pub usage_page: Option<u16>,

    /// HID Usage within the page (e.g., `0x05` Gamepad), if known.
    pub usage: Option<u16>,

    /// OS/topological path to the device.
    pub path: Option<String>,
}

impl DeviceMeta {
    /// Display name: the product string, else `fallback`.
    pub fn display_name(&self, fallback: &str) -> String {
        self.product_string
            .clone()
            .unwrap_or_else(|| fallback.to_string())
    }
}
