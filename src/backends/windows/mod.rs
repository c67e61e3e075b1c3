//! Windows backends.
//!
//! XInput slots are exposed as an [`XInputSource`] for a seeker. HID pads on
//! Windows go through the cross-platform `hid` source.

pub mod xinput;

pub use xinput::{XInputSlot, XInputSource};
