//! Peripheral sources and adapters.
//!
//! - [`virtual_input`]: scriptable pads for tests and demos.
//! - [`report`] + [`ds4`]: HID report decoding, DualShock 4 layout.
//! - [`pointer`]: mouse fed by the host's event loop.
//! - `hid` (feature **`hid`**): `hidapi` enumeration and setup.
//! - `windows` (Windows only): XInput slots.
//!
//! StickUp reads input devices; it does not create virtual devices (vJoy/uinput).

pub mod ds4;
pub mod pointer;
pub mod report;
pub mod virtual_input;

#[cfg(feature = "hid")]
#[cfg_attr(docsrs, doc(cfg(feature = "hid")))]
pub mod hid;

#[cfg(target_os = "windows")]
#[cfg_attr(docsrs, doc(cfg(target_os = "windows")))]
pub mod windows;
