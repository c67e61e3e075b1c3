//! Peripheral identity as seen by seekers.
//!
//! A peripheral has:
//! - a stable [`PeripheralId`] (vendor id, product id, and an instance key such as a
//!   serial number, a slot index or a hardware path),
//! - a [`NativeHandle`] identifying the OS device node. It usually changes on a
//!   physical unplug + replug, but some backends reuse it per port, and
//! - a [`Transport`] tag used by ambiguity detection.
//!
//! Seekers quarantine by identity and lift the quarantine when the same
//! identity shows up with a different native handle, or reappears after
//! dropping out of enumeration.

use crate::metadata::DeviceMeta;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a physical (or logical) peripheral.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeripheralId {
    pub vendor_id: u16,
    pub product_id: u16,
    pub instance: String,
}

impl PeripheralId {
    pub fn new(vendor_id: u16, product_id: u16, instance: impl Into<String>) -> Self {
        Self {
            vendor_id,
            product_id,
            instance: instance.into(),
        }
    }
}

impl fmt::Display for PeripheralId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04x}:{:04x}:{}",
            self.vendor_id, self.product_id, self.instance
        )
    }
}

/// OS-level handle generation of a peripheral. Opaque; only compared for equality.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NativeHandle(pub u64);

/// Link a peripheral reports over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Transport {
    Usb,
    Bluetooth,
    Virtual,
    Other,
}

impl Transport {
    /// Transports over which one physical device can show up twice.
    pub fn is_ambiguity_relevant(self) -> bool {
        matches!(self, Transport::Usb | Transport::Bluetooth)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Transport::Usb => "usb",
            Transport::Bluetooth => "bluetooth",
            Transport::Virtual => "virtual",
            Transport::Other => "other",
        }
    }
}

/// One enumerated peripheral.
#[derive(Clone, Debug, PartialEq)]
pub struct PeripheralInfo {
    pub id: PeripheralId,
    pub handle: NativeHandle,
    pub transport: Transport,
    pub meta: DeviceMeta,
}

impl PeripheralInfo {
    pub fn name(&self) -> String {
        self.meta.display_name(&self.id.to_string())
    }
}

/// Vendor / product filter a seeker matches enumerated peripherals against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TargetFilter {
    pub vendor_id: u16,
    /// `None` matches every product of the vendor.
    pub product_id: Option<u16>,
}

impl TargetFilter {
    pub fn product(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id: Some(product_id),
        }
    }

    pub fn vendor(vendor_id: u16) -> Self {
        Self {
            vendor_id,
            product_id: None,
        }
    }

    pub fn matches(&self, id: &PeripheralId) -> bool {
        self.vendor_id == id.vendor_id && self.product_id.map_or(true, |p| p == id.product_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_hex_fingerprint() {
        let id = PeripheralId::new(0x054c, 0x09cc, "usb-1.2");
        assert_eq!(id.to_string(), "054c:09cc:usb-1.2");
    }

    #[test]
    fn filters() {
        let id = PeripheralId::new(0x054c, 0x09cc, "a");
        assert!(TargetFilter::vendor(0x054c).matches(&id));
        assert!(TargetFilter::product(0x054c, 0x09cc).matches(&id));
        assert!(!TargetFilter::product(0x054c, 0x05c4).matches(&id));
        assert!(!TargetFilter::vendor(0x045e).matches(&id));
    }

    #[test]
    fn ambiguity_relevant_transports() {
        assert!(Transport::Usb.is_ambiguity_relevant());
        assert!(Transport::Bluetooth.is_ambiguity_relevant());
        assert!(!Transport::Virtual.is_ambiguity_relevant());
    }
}
