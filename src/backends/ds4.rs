//! DualShock 4 report layout.
//!
//! The same controller speaks two dialects:
//!
//! | transport | input report | data offset | output report | output size |
//! |-----------|--------------|-------------|---------------|-------------|
//! | USB       | `0x01`       | 1           | `0x05`        | 32          |
//! | Bluetooth | `0x11`       | 3           | `0x11`        | 78 (+CRC)   |
//!
//! Input fields, relative to the data offset:
//!
//! | byte   | field                                                   |
//! |--------|---------------------------------------------------------|
//! | 0..4   | LX, LY, RX, RY (`0x80` centre, `y` grows downwards)     |
//! | 4      | hat (low nibble), Square, Cross, Circle, Triangle       |
//! | 5      | L1, R1, L2, R2, Share, Options, L3, R3                  |
//! | 6      | PS, touchpad click                                      |
//! | 7, 8   | L2, R2 analog                                           |
//! | 12..18 | gyro x, y, z (`i16` LE)                                 |
//! | 18..24 | accel x, y, z (`i16` LE)                                |
//!
//! Bluetooth output reports end with a CRC-32 over `0xA2` followed by the first
//! 74 bytes of the report.

use crate::backends::report::{OutputRequest, ReportAdapter, ReportLayout, ReportRaw, ReportReader};
use crate::catalog::gamepad;
use crate::config::PressableConfig;
use crate::device::AdaptedDevice;
use crate::error::DeviceError;
use crate::feature::Feature;
use crate::normalize::{byte_to_positive, byte_to_unit};
use crate::peripheral::{PeripheralInfo, Transport};
use crate::registry::MappedFeatureRegistry;
use crate::state::{set_stick, ButtonState, SensorState, StickState, TriggerState};

pub const SONY_VENDOR_ID: u16 = 0x054c;
/// DualShock 4 v1, v2 and the USB wireless adapter.
pub const DS4_PRODUCT_IDS: [u16; 3] = [0x05c4, 0x09cc, 0x0ba0];

const USB_INPUT_REPORT: u8 = 0x01;
const BT_INPUT_REPORT: u8 = 0x11;
const USB_OUTPUT_REPORT: u8 = 0x05;
const BT_OUTPUT_REPORT: u8 = 0x11;
const USB_OUTPUT_LEN: usize = 32;
const BT_OUTPUT_LEN: usize = 78;
const BT_CRC_SEED: u8 = 0xA2;
/// Rumble + lightbar enable flags.
const OUTPUT_FLAGS: u8 = 0x07;

pub fn is_ds4(vendor_id: u16, product_id: u16) -> bool {
    vendor_id == SONY_VENDOR_ID && DS4_PRODUCT_IDS.contains(&product_id)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ds4Link {
    Usb,
    Bluetooth,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ds4Layout {
    link: Ds4Link,
}

/// Button bit within a byte relative to the data offset.
#[derive(Clone, Copy, Debug)]
struct Bit {
    byte: usize,
    mask: u8,
}

static BUTTON_BITS: [(&Feature<ButtonState>, Bit); 12] = [
    (&gamepad::WEST, Bit { byte: 4, mask: 0x10 }),
    (&gamepad::SOUTH, Bit { byte: 4, mask: 0x20 }),
    (&gamepad::EAST, Bit { byte: 4, mask: 0x40 }),
    (&gamepad::NORTH, Bit { byte: 4, mask: 0x80 }),
    (&gamepad::LEFT_BUMPER, Bit { byte: 5, mask: 0x01 }),
    (&gamepad::RIGHT_BUMPER, Bit { byte: 5, mask: 0x02 }),
    (&gamepad::SELECT, Bit { byte: 5, mask: 0x10 }),
    (&gamepad::START, Bit { byte: 5, mask: 0x20 }),
    (&gamepad::LEFT_THUMB, Bit { byte: 5, mask: 0x40 }),
    (&gamepad::RIGHT_THUMB, Bit { byte: 5, mask: 0x80 }),
    (&gamepad::GUIDE, Bit { byte: 6, mask: 0x01 }),
    (&gamepad::TOUCHPAD, Bit { byte: 6, mask: 0x02 }),
];

/// D-pad directions as `[up, right, down, left]` for a hat value.
///
/// `0..=7` is Up, clockwise; anything else is neutral.
pub fn hat_to_dpad(hat: u8) -> [bool; 4] {
    match hat {
        0 => [true, false, false, false],
        1 => [true, true, false, false],
        2 => [false, true, false, false],
        3 => [false, true, true, false],
        4 => [false, false, true, false],
        5 => [false, false, true, true],
        6 => [false, false, false, true],
        7 => [true, false, false, true],
        _ => [false; 4],
    }
}

impl Ds4Layout {
    pub fn new(link: Ds4Link) -> Self {
        Self { link }
    }

    /// `None` for transports a DualShock 4 never uses.
    pub fn for_transport(transport: Transport) -> Option<Self> {
        match transport {
            Transport::Usb => Some(Self::new(Ds4Link::Usb)),
            Transport::Bluetooth => Some(Self::new(Ds4Link::Bluetooth)),
            Transport::Virtual | Transport::Other => None,
        }
    }

    pub fn link(&self) -> Ds4Link {
        self.link
    }

    pub fn report_id(&self) -> u8 {
        match self.link {
            Ds4Link::Usb => USB_INPUT_REPORT,
            Ds4Link::Bluetooth => BT_INPUT_REPORT,
        }
    }

    pub fn data_offset(&self) -> usize {
        match self.link {
            Ds4Link::Usb => 1,
            Ds4Link::Bluetooth => 3,
        }
    }

    fn map_stick(
        &self,
        registry: &mut MappedFeatureRegistry<ReportRaw>,
        feature: &'static Feature<StickState>,
        axes: usize,
        thumb: Bit,
    ) -> Result<(), DeviceError> {
        let at = self.data_offset();
        registry.map_feature(
            feature,
            (at + axes, Bit { byte: at + thumb.byte, mask: thumb.mask }),
            |s: &mut StickState, (x, thumb): &(usize, Bit), raw: &ReportRaw| {
                set_stick(
                    s,
                    byte_to_unit(raw.byte(*x)),
                    byte_to_unit(raw.byte(*x + 1)),
                    raw.bit(thumb.byte, thumb.mask),
                );
            },
        )?;
        Ok(())
    }

    fn map_sensor(
        &self,
        registry: &mut MappedFeatureRegistry<ReportRaw>,
        feature: &'static Feature<SensorState>,
        byte: usize,
    ) -> Result<(), DeviceError> {
        registry.map_feature(
            feature,
            self.data_offset() + byte,
            |s: &mut SensorState, at: &usize, raw: &ReportRaw| {
                s.x = f32::from(raw.i16_le(*at));
                s.y = f32::from(raw.i16_le(*at + 2));
                s.z = f32::from(raw.i16_le(*at + 4));
            },
        )?;
        Ok(())
    }
}

impl ReportLayout for Ds4Layout {
    fn input_len(&self) -> usize {
        match self.link {
            Ds4Link::Usb => 64,
            Ds4Link::Bluetooth => 78,
        }
    }

    fn accepts(&self, report: &[u8]) -> bool {
        report.len() > self.data_offset() + 24 && report[0] == self.report_id()
    }

    fn map_features(
        &self,
        registry: &mut MappedFeatureRegistry<ReportRaw>,
    ) -> Result<(), DeviceError> {
        let at = self.data_offset();

        for (feature, bit) in BUTTON_BITS {
            registry.map_feature(
                feature,
                Bit { byte: at + bit.byte, mask: bit.mask },
                |s: &mut ButtonState, bit: &Bit, raw: &ReportRaw| {
                    s.pressed = raw.bit(bit.byte, bit.mask)
                },
            )?;
        }

        let dpad = [
            &gamepad::DPAD_UP,
            &gamepad::DPAD_RIGHT,
            &gamepad::DPAD_DOWN,
            &gamepad::DPAD_LEFT,
        ];
        for (direction, feature) in dpad.into_iter().enumerate() {
            registry.map_feature(
                feature,
                (at + 4, direction),
                |s: &mut ButtonState, (byte, dir): &(usize, usize), raw: &ReportRaw| {
                    s.pressed = hat_to_dpad(raw.byte(*byte) & 0x0f)[*dir];
                },
            )?;
        }

        self.map_stick(registry, &gamepad::LEFT_STICK, 0, Bit { byte: 5, mask: 0x40 })?;
        self.map_stick(registry, &gamepad::RIGHT_STICK, 2, Bit { byte: 5, mask: 0x80 })?;

        for (feature, byte) in [(&gamepad::LEFT_TRIGGER, 7), (&gamepad::RIGHT_TRIGGER, 8)] {
            registry.map_feature(
                feature,
                at + byte,
                |s: &mut TriggerState, at: &usize, raw: &ReportRaw| {
                    s.value = byte_to_positive(raw.byte(*at))
                },
            )?;
        }

        self.map_sensor(registry, &gamepad::GYRO, 12)?;
        self.map_sensor(registry, &gamepad::ACCEL, 18)?;
        Ok(())
    }

    fn output_report(&self, request: &OutputRequest) -> Option<Vec<u8>> {
        Some(output_report(self.link, request))
    }
}

fn motor(strength: f32) -> u8 {
    (strength.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Rumble + lightbar output report for `link`.
pub fn output_report(link: Ds4Link, request: &OutputRequest) -> Vec<u8> {
    let (mut report, at) = match link {
        Ds4Link::Usb => {
            let mut r = vec![0u8; USB_OUTPUT_LEN];
            r[0] = USB_OUTPUT_REPORT;
            r[1] = OUTPUT_FLAGS;
            (r, 4)
        }
        Ds4Link::Bluetooth => {
            let mut r = vec![0u8; BT_OUTPUT_LEN];
            r[0] = BT_OUTPUT_REPORT;
            // HID + CRC present
            r[1] = 0xC0;
            r[3] = OUTPUT_FLAGS;
            (r, 6)
        }
    };
    report[at] = motor(request.weak);
    report[at + 1] = motor(request.strong);
    report[at + 2..at + 5].copy_from_slice(&request.rgb);

    if link == Ds4Link::Bluetooth {
        let crc = bt_crc(&report[..BT_OUTPUT_LEN - 4]);
        report[BT_OUTPUT_LEN - 4..].copy_from_slice(&crc.to_le_bytes());
    }
    report
}

fn bt_crc(body: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(&[BT_CRC_SEED]);
    hasher.update(body);
    hasher.finalize()
}

pub type Ds4Device<R> = AdaptedDevice<ReportAdapter<R, Ds4Layout>>;

/// Wrap an open DualShock 4 handle into a device.
pub fn open_ds4<R: ReportReader>(
    info: &PeripheralInfo,
    reader: R,
    pressable: PressableConfig,
) -> Result<Ds4Device<R>, DeviceError> {
    let layout = Ds4Layout::for_transport(info.transport).ok_or_else(|| {
        DeviceError::Backend(format!(
            "DualShock 4 over {} is not supported",
            info.transport.as_str()
        ))
    })?;
    AdaptedDevice::with_pressable_config(
        info.id.to_string(),
        info.meta.display_name("DualShock 4"),
        info.meta.clone(),
        pressable,
        || ReportAdapter::new(reader, layout),
    )
}
