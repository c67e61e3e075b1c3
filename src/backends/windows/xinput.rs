//! XInput pads.
//!
//! XInput exposes up to four Xbox-style controllers as numbered slots. Each
//! slot becomes a peripheral with a synthesized identity (`045e:028e:xinput:N`)
//! and is polled through the generic joystick adapter with the Xbox layout.
//!
//! Raw values written by [`XInputSlot`]:
//! - axes `0..4`: LX, LY, RX, RY in `[-1, 1]`, `y` positive up (the Xbox stick
//!   transform flips it),
//! - axes `4..6`: LT, RT mapped to `[-1, 1]` (`-1` released),
//! - buttons in Xbox layout order. Guide is not reported by the public API and
//!   stays released.
//!
//! XInput slots carry no bus information, so they never count towards
//! USB / Bluetooth ambiguity.

use crate::config::PressableConfig;
use crate::device::{AdaptedDevice, Device};
use crate::error::{DeviceError, SetupError, SourceError};
use crate::joystick::{JoystickAdapter, JoystickKind, JoystickRaw, JoystickSource};
use crate::metadata::DeviceMeta;
use crate::normalize::thumb_to_unit;
use crate::peripheral::{NativeHandle, PeripheralId, PeripheralInfo, Transport};
use crate::seeker::PeripheralSource;
use tracing::debug;
use windows_sys::Win32::Foundation::ERROR_SUCCESS;
use windows_sys::Win32::UI::Input::XboxController::*;

pub const XINPUT_SLOTS: u32 = 4;
const MICROSOFT_VENDOR_ID: u16 = 0x045e;
/// Conventional Xbox 360 product id; XInput does not report the real one.
const XBOX_360_PRODUCT_ID: u16 = 0x028e;

/// XInput button bit per Xbox layout index. Guide (index 8) has no public bit.
const BUTTON_BITS: [(u16, usize); 14] = [
    (XINPUT_GAMEPAD_A, 0),
    (XINPUT_GAMEPAD_B, 1),
    (XINPUT_GAMEPAD_X, 2),
    (XINPUT_GAMEPAD_Y, 3),
    (XINPUT_GAMEPAD_LEFT_SHOULDER, 4),
    (XINPUT_GAMEPAD_RIGHT_SHOULDER, 5),
    (XINPUT_GAMEPAD_BACK, 6),
    (XINPUT_GAMEPAD_START, 7),
    (XINPUT_GAMEPAD_LEFT_THUMB, 9),
    (XINPUT_GAMEPAD_RIGHT_THUMB, 10),
    (XINPUT_GAMEPAD_DPAD_UP, 11),
    (XINPUT_GAMEPAD_DPAD_RIGHT, 12),
    (XINPUT_GAMEPAD_DPAD_DOWN, 13),
    (XINPUT_GAMEPAD_DPAD_LEFT, 14),
];

/// `0 -> -1.0` (released), `255 -> +1.0` (fully pressed).
#[inline]
fn trigger_to_signed(v: u8) -> f32 {
    (v as f32) / 255.0 * 2.0 - 1.0
}

#[inline]
fn motor_speed(strength: f32) -> u16 {
    (strength.clamp(0.0, 1.0) * f32::from(u16::MAX)).round() as u16
}

/// Current state of `slot`, `None` when nothing is plugged there.
fn get_state(slot: u32) -> Option<XINPUT_STATE> {
    // SAFETY: XINPUT_STATE is plain data; the all-zero pattern is valid.
    let mut state: XINPUT_STATE = unsafe { std::mem::zeroed() };
    // SAFETY: `state` is a valid, writable XINPUT_STATE for the duration of the call.
    let res = unsafe { XInputGetState(slot, &mut state) };
    (res == ERROR_SUCCESS).then_some(state)
}

pub(crate) fn fill_raw(gp: &XINPUT_GAMEPAD, raw: &mut JoystickRaw) {
    raw.axes.resize(6, 0.0);
    raw.axes[0] = thumb_to_unit(gp.sThumbLX);
    raw.axes[1] = thumb_to_unit(gp.sThumbLY);
    raw.axes[2] = thumb_to_unit(gp.sThumbRX);
    raw.axes[3] = thumb_to_unit(gp.sThumbRY);
    raw.axes[4] = trigger_to_signed(gp.bLeftTrigger);
    raw.axes[5] = trigger_to_signed(gp.bRightTrigger);

    raw.buttons.clear();
    raw.buttons.resize(15, false);
    for (mask, index) in BUTTON_BITS {
        raw.buttons[index] = gp.wButtons & mask != 0;
    }
    raw.connected = true;
}

/// [`JoystickSource`] reading one XInput slot.
pub struct XInputSlot {
    slot: u32,
}

impl XInputSlot {
    pub fn new(slot: u32) -> Self {
        Self { slot }
    }

    pub fn slot(&self) -> u32 {
        self.slot
    }
}

impl JoystickSource for XInputSlot {
    fn read(&mut self, raw: &mut JoystickRaw) -> Result<(), DeviceError> {
        match get_state(self.slot) {
            Some(state) => fill_raw(&state.Gamepad, raw),
            None => raw.connected = false,
        }
        Ok(())
    }

    fn set_rumble(&mut self, strong: f32, weak: f32) -> Result<(), DeviceError> {
        // Left motor is the low-frequency (strong) one.
        let vibration = XINPUT_VIBRATION {
            wLeftMotorSpeed: motor_speed(strong),
            wRightMotorSpeed: motor_speed(weak),
        };
        // SAFETY: `vibration` outlives the call.
        let res = unsafe { XInputSetState(self.slot, &vibration) };
        if res == ERROR_SUCCESS {
            Ok(())
        } else {
            Err(DeviceError::Io(format!(
                "XInputSetState({}) failed with {res}",
                self.slot
            )))
        }
    }

    fn close(&mut self) {
        let _ = self.set_rumble(0.0, 0.0);
    }
}

/// Peripheral source over XInput slots `0..4`.
///
/// A slot that goes empty and fills again between two enumerations gets a new
/// native handle, which lifts any quarantine on it.
#[derive(Debug, Default)]
pub struct XInputSource {
    generations: [u64; XINPUT_SLOTS as usize],
    present: [bool; XINPUT_SLOTS as usize],
}

impl XInputSource {
    pub fn new() -> Self {
        Self::default()
    }

    fn info(&self, slot: u32) -> PeripheralInfo {
        let instance = format!("xinput:{slot}");
        PeripheralInfo {
            id: PeripheralId::new(MICROSOFT_VENDOR_ID, XBOX_360_PRODUCT_ID, instance.clone()),
            handle: NativeHandle(self.generations[slot as usize]),
            transport: Transport::Other,
            meta: DeviceMeta {
                bus: Some("xinput".into()),
                vid: Some(MICROSOFT_VENDOR_ID),
                pid: Some(XBOX_360_PRODUCT_ID),
                product_string: Some(format!("XInput Controller {slot}")),
                path: Some(instance),
                ..DeviceMeta::default()
            },
        }
    }
}

impl PeripheralSource for XInputSource {
    fn name(&self) -> &str {
        "xinput"
    }

    fn enumerate(&mut self) -> Result<Vec<PeripheralInfo>, SourceError> {
        let mut found = Vec::new();
        for slot in 0..XINPUT_SLOTS {
            let i = slot as usize;
            let present = get_state(slot).is_some();
            if present && !self.present[i] {
                self.generations[i] += 1;
                debug!(slot, generation = self.generations[i], "XInput slot filled");
            }
            self.present[i] = present;
            if present {
                found.push(self.info(slot));
            }
        }
        Ok(found)
    }

    fn setup(
        &mut self,
        info: &PeripheralInfo,
        pressable: &PressableConfig,
    ) -> Result<Box<dyn Device>, SetupError> {
        let slot = info
            .id
            .instance
            .strip_prefix("xinput:")
            .and_then(|s| s.parse::<u32>().ok())
            .filter(|s| *s < XINPUT_SLOTS)
            .ok_or_else(|| SetupError::Fatal(format!("{} is not an XInput slot", info.id)))?;
        if get_state(slot).is_none() {
            return Err(SetupError::Recoverable(format!("XInput slot {slot} is empty")));
        }
        let device = AdaptedDevice::with_pressable_config(
            info.id.to_string(),
            info.meta.display_name(JoystickKind::Xbox.display_name()),
            info.meta.clone(),
            pressable.clone(),
            || JoystickAdapter::new(JoystickKind::Xbox, XInputSlot::new(slot)),
        )?;
        Ok(Box::new(device))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gamepad_state_fills_the_xbox_layout() {
        // SAFETY: plain data.
        let mut gp: XINPUT_GAMEPAD = unsafe { std::mem::zeroed() };
        gp.wButtons = XINPUT_GAMEPAD_A | XINPUT_GAMEPAD_DPAD_LEFT | XINPUT_GAMEPAD_RIGHT_THUMB;
        gp.sThumbLY = i16::MAX;
        gp.bRightTrigger = 255;

        let mut raw = JoystickRaw::default();
        fill_raw(&gp, &mut raw);

        assert!(raw.connected);
        assert!(raw.button(0));
        assert!(raw.button(14));
        assert!(raw.button(10));
        assert!(!raw.button(8));
        assert_eq!(raw.axis(1), 1.0);
        assert_eq!(raw.axis(4), -1.0);
        assert_eq!(raw.axis(5), 1.0);
    }

    #[test]
    fn motor_speed_is_clamped() {
        assert_eq!(motor_speed(2.0), u16::MAX);
        assert_eq!(motor_speed(-1.0), 0);
    }
}
