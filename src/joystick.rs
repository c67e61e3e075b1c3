//! Generic joystick adapter.
//!
//! One adapter serves every pad that a vendor binding exposes as "N axes + M
//! buttons" (XInput slots, virtual pads, OS joystick APIs). What differs per pad
//! family is data, not code:
//!
//! - a [`JoystickLayout`] table (raw button index per feature, stick axes and
//!   thumb-button overlay, trigger axis and its range), chosen by [`JoystickKind`];
//! - a stick transform closure applied to both sticks (e.g. XInput reports
//!   up as positive `y`, so the Xbox transform flips it).
//!
//! Features a layout does not list are declared absent, so asking an Xbox pad
//! for [`gamepad::TOUCHPAD`] fails with
//! [`UnsupportedFeature`](crate::error::RegistryError::UnsupportedFeature).
//!
//! Raw index conventions (Xbox / PlayStation follow the common OS joystick order):
//!
//! | feature      | Xbox | DS4 / DualSense | Generic |
//! |--------------|------|-----------------|---------|
//! | south        | 0    | 1               | 0       |
//! | east         | 1    | 2               | 1       |
//! | west         | 2    | 0               | 2       |
//! | north        | 3    | 3               | 3       |
//! | left bumper  | 4    | 4               | 4       |
//! | right bumper | 5    | 5               | 5       |
//! | select       | 6    | 8               | 6       |
//! | start        | 7    | 9               | 7       |
//! | guide        | 8    | 12              | -       |
//! | left thumb   | 9    | 10              | 8       |
//! | right thumb  | 10   | 11              | 9       |
//! | d-pad U/R/D/L| 11-14| 14-17           | 10-13   |
//! | touchpad     | -    | 13              | -       |

use crate::adapter::DeviceAdapter;
use crate::catalog::gamepad;
use crate::error::DeviceError;
use crate::feature::{Feature, StateCell};
use crate::normalize::{clamp_positive, clamp_unit, signed_axis_to_trigger};
use crate::registry::MappedFeatureRegistry;
use crate::state::{set_stick, ButtonState, RumbleState, StickState, TriggerState};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Raw buffer filled by a [`JoystickSource`] on every poll.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct JoystickRaw {
    /// Normalized to `[-1, 1]` by the source.
    pub axes: Vec<f32>,
    pub buttons: Vec<bool>,
    pub connected: bool,
}

impl JoystickRaw {
    pub fn with_capacity(axes: usize, buttons: usize) -> Self {
        Self {
            axes: vec![0.0; axes],
            buttons: vec![false; buttons],
            connected: false,
        }
    }

    /// `0.0` for an index the source does not report.
    pub fn axis(&self, index: usize) -> f32 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }

    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }
}

/// Vendor binding behind a [`JoystickAdapter`].
pub trait JoystickSource: Send + 'static {
    /// Overwrite `raw` with the current sample.
    fn read(&mut self, raw: &mut JoystickRaw) -> Result<(), DeviceError>;

    /// Drive the motors, each in `[0, 1]`.
    fn set_rumble(&mut self, _strong: f32, _weak: f32) -> Result<(), DeviceError> {
        Ok(())
    }

    fn close(&mut self) {}
}

/// Pad family; selects the layout and the stick transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoystickKind {
    Xbox,
    DualShock4,
    DualSense,
    Generic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StickBinding {
    pub x_axis: usize,
    pub y_axis: usize,
    /// Button whose press sets the stick's `z` overlay.
    pub thumb_button: Option<usize>,
}

/// How a trigger axis is reported by the source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerRange {
    /// Already in `[0, 1]`.
    Unit,
    /// `-1` released, `+1` fully pressed.
    Signed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TriggerBinding {
    pub axis: usize,
    pub range: TriggerRange,
}

/// Raw indices of one pad family.
#[derive(Clone, Debug)]
pub struct JoystickLayout {
    pub axes: usize,
    pub buttons: usize,
    pub button_map: &'static [(&'static Feature<ButtonState>, usize)],
    pub left_stick: Option<StickBinding>,
    pub right_stick: Option<StickBinding>,
    pub left_trigger: Option<TriggerBinding>,
    pub right_trigger: Option<TriggerBinding>,
    pub rumble: bool,
}

static XBOX_BUTTONS: [(&Feature<ButtonState>, usize); 15] = [
    (&gamepad::SOUTH, 0),
    (&gamepad::EAST, 1),
    (&gamepad::WEST, 2),
    (&gamepad::NORTH, 3),
    (&gamepad::LEFT_BUMPER, 4),
    (&gamepad::RIGHT_BUMPER, 5),
    (&gamepad::SELECT, 6),
    (&gamepad::START, 7),
    (&gamepad::GUIDE, 8),
    (&gamepad::LEFT_THUMB, 9),
    (&gamepad::RIGHT_THUMB, 10),
    (&gamepad::DPAD_UP, 11),
    (&gamepad::DPAD_RIGHT, 12),
    (&gamepad::DPAD_DOWN, 13),
    (&gamepad::DPAD_LEFT, 14),
];

static PSX_BUTTONS: [(&Feature<ButtonState>, usize); 16] = [
    (&gamepad::WEST, 0),
    (&gamepad::SOUTH, 1),
    (&gamepad::EAST, 2),
    (&gamepad::NORTH, 3),
    (&gamepad::LEFT_BUMPER, 4),
    (&gamepad::RIGHT_BUMPER, 5),
    (&gamepad::SELECT, 8),
    (&gamepad::START, 9),
    (&gamepad::LEFT_THUMB, 10),
    (&gamepad::RIGHT_THUMB, 11),
    (&gamepad::GUIDE, 12),
    (&gamepad::TOUCHPAD, 13),
    (&gamepad::DPAD_UP, 14),
    (&gamepad::DPAD_RIGHT, 15),
    (&gamepad::DPAD_DOWN, 16),
    (&gamepad::DPAD_LEFT, 17),
];

static GENERIC_BUTTONS: [(&Feature<ButtonState>, usize); 14] = [
    (&gamepad::SOUTH, 0),
    (&gamepad::EAST, 1),
    (&gamepad::WEST, 2),
    (&gamepad::NORTH, 3),
    (&gamepad::LEFT_BUMPER, 4),
    (&gamepad::RIGHT_BUMPER, 5),
    (&gamepad::SELECT, 6),
    (&gamepad::START, 7),
    (&gamepad::LEFT_THUMB, 8),
    (&gamepad::RIGHT_THUMB, 9),
    (&gamepad::DPAD_UP, 10),
    (&gamepad::DPAD_RIGHT, 11),
    (&gamepad::DPAD_DOWN, 12),
    (&gamepad::DPAD_LEFT, 13),
];

/// Stick transform: raw `(x, y)` to "y negative is up" `(x, y)`.
pub type StickTransform = Arc<dyn Fn(f32, f32) -> (f32, f32) + Send + Sync>;

impl JoystickKind {
    pub fn layout(self) -> JoystickLayout {
        match self {
            JoystickKind::Xbox => JoystickLayout {
                axes: 6,
                buttons: 15,
                button_map: &XBOX_BUTTONS,
                left_stick: Some(StickBinding {
                    x_axis: 0,
                    y_axis: 1,
                    thumb_button: Some(9),
                }),
                right_stick: Some(StickBinding {
                    x_axis: 2,
                    y_axis: 3,
                    thumb_button: Some(10),
                }),
                left_trigger: Some(TriggerBinding {
                    axis: 4,
                    range: TriggerRange::Signed,
                }),
                right_trigger: Some(TriggerBinding {
                    axis: 5,
                    range: TriggerRange::Signed,
                }),
                rumble: true,
            },
            JoystickKind::DualShock4 | JoystickKind::DualSense => JoystickLayout {
                axes: 6,
                buttons: 18,
                button_map: &PSX_BUTTONS,
                left_stick: Some(StickBinding {
                    x_axis: 0,
                    y_axis: 1,
                    thumb_button: Some(10),
                }),
                right_stick: Some(StickBinding {
                    x_axis: 2,
                    y_axis: 5,
                    thumb_button: Some(11),
                }),
                left_trigger: Some(TriggerBinding {
                    axis: 3,
                    range: TriggerRange::Signed,
                }),
                right_trigger: Some(TriggerBinding {
                    axis: 4,
                    range: TriggerRange::Signed,
                }),
                rumble: true,
            },
            JoystickKind::Generic => JoystickLayout {
                axes: 4,
                buttons: 14,
                button_map: &GENERIC_BUTTONS,
                left_stick: Some(StickBinding {
                    x_axis: 0,
                    y_axis: 1,
                    thumb_button: Some(8),
                }),
                right_stick: Some(StickBinding {
                    x_axis: 2,
                    y_axis: 3,
                    thumb_button: Some(9),
                }),
                left_trigger: None,
                right_trigger: None,
                rumble: false,
            },
        }
    }

    pub fn stick_transform(self) -> StickTransform {
        match self {
            JoystickKind::Xbox => Arc::new(|x, y| (x, -y)),
            JoystickKind::DualShock4 | JoystickKind::DualSense | JoystickKind::Generic => {
                Arc::new(|x, y| (x, y))
            }
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            JoystickKind::Xbox => "Xbox Controller",
            JoystickKind::DualShock4 => "DualShock 4",
            JoystickKind::DualSense => "DualSense",
            JoystickKind::Generic => "Gamepad",
        }
    }
}

/// Table-driven adapter over any [`JoystickSource`].
pub struct JoystickAdapter<J: JoystickSource> {
    source: J,
    kind: JoystickKind,
    layout: JoystickLayout,
    transform: StickTransform,
    raw: JoystickRaw,
    rumble: Option<(StateCell<RumbleState>, StateCell<RumbleState>)>,
    closed: bool,
}

impl<J: JoystickSource> JoystickAdapter<J> {
    pub fn new(kind: JoystickKind, source: J) -> Self {
        Self::with_layout(kind, kind.layout(), kind.stick_transform(), source)
    }

    /// Custom table and transform for pads the built-in kinds do not cover.
    pub fn with_layout(
        kind: JoystickKind,
        layout: JoystickLayout,
        transform: StickTransform,
        source: J,
    ) -> Self {
        let raw = JoystickRaw::with_capacity(layout.axes, layout.buttons);
        Self {
            source,
            kind,
            layout,
            transform,
            raw,
            rumble: None,
            closed: false,
        }
    }

    pub fn kind(&self) -> JoystickKind {
        self.kind
    }

    pub fn source(&self) -> &J {
        &self.source
    }

    fn map_stick(
        registry: &mut MappedFeatureRegistry<JoystickRaw>,
        feature: &'static Feature<StickState>,
        binding: Option<StickBinding>,
        transform: &StickTransform,
    ) -> Result<(), DeviceError> {
        let Some(binding) = binding else {
            registry.declare_absent(feature);
            return Ok(());
        };
        let transform = transform.clone();
        registry.map_feature(
            feature,
            binding,
            move |s: &mut StickState, b: &StickBinding, raw: &JoystickRaw| {
                let (x, y) = transform(raw.axis(b.x_axis), raw.axis(b.y_axis));
                let thumb = b.thumb_button.map_or(false, |i| raw.button(i));
                set_stick(s, x, y, thumb);
            },
        )?;
        Ok(())
    }

    fn map_trigger(
        registry: &mut MappedFeatureRegistry<JoystickRaw>,
        feature: &'static Feature<TriggerState>,
        binding: Option<TriggerBinding>,
    ) -> Result<(), DeviceError> {
        let Some(binding) = binding else {
            registry.declare_absent(feature);
            return Ok(());
        };
        registry.map_feature(
            feature,
            binding,
            |s: &mut TriggerState, b: &TriggerBinding, raw: &JoystickRaw| {
                let v = raw.axis(b.axis);
                s.value = match b.range {
                    TriggerRange::Unit => clamp_positive(v),
                    TriggerRange::Signed => signed_axis_to_trigger(clamp_unit(v)),
                };
            },
        )?;
        Ok(())
    }

    fn forward_rumble(&mut self) -> Result<(), DeviceError> {
        let Some((strong, weak)) = &self.rumble else {
            return Ok(());
        };
        let (s, w) = (strong.write().take_request(), weak.write().take_request());
        if s.is_none() && w.is_none() {
            return Ok(());
        }
        let s = s.unwrap_or_else(|| strong.read().strength);
        let w = w.unwrap_or_else(|| weak.read().strength);
        self.source.set_rumble(s, w)
    }
}

impl<J: JoystickSource> DeviceAdapter for JoystickAdapter<J> {
    type Raw = JoystickRaw;

    fn init_adapter(
        &mut self,
        registry: &mut MappedFeatureRegistry<JoystickRaw>,
    ) -> Result<(), DeviceError> {
        for &(feature, index) in self.layout.button_map {
            registry.map_feature(
                feature,
                index,
                |s: &mut ButtonState, i: &usize, raw: &JoystickRaw| s.pressed = raw.button(*i),
            )?;
        }
        for &feature in gamepad::BUTTONS.iter() {
            if !registry.has_mapping(feature) {
                registry.declare_absent(feature);
            }
        }
        registry.require(&gamepad::SOUTH);

        Self::map_stick(
            registry,
            &gamepad::LEFT_STICK,
            self.layout.left_stick,
            &self.transform,
        )?;
        Self::map_stick(
            registry,
            &gamepad::RIGHT_STICK,
            self.layout.right_stick,
            &self.transform,
        )?;
        Self::map_trigger(registry, &gamepad::LEFT_TRIGGER, self.layout.left_trigger)?;
        Self::map_trigger(registry, &gamepad::RIGHT_TRIGGER, self.layout.right_trigger)?;

        if self.layout.rumble {
            // Outputs: nothing to read back, the adapter drains requests in poll_device.
            let strong = registry.map_feature(&gamepad::RUMBLE_STRONG, (), |_, _, _| {})?;
            let weak = registry.map_feature(&gamepad::RUMBLE_WEAK, (), |_, _, _| {})?;
            self.rumble = Some((strong, weak));
        } else {
            registry.declare_absent(&gamepad::RUMBLE_STRONG);
            registry.declare_absent(&gamepad::RUMBLE_WEAK);
        }
        registry.declare_absent(&gamepad::LIGHTBAR);
        registry.declare_absent(&gamepad::GYRO);
        registry.declare_absent(&gamepad::ACCEL);
        Ok(())
    }

    fn poll_device(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        self.source.read(&mut self.raw)?;
        self.forward_rumble()
    }

    fn raw(&self) -> &JoystickRaw {
        &self.raw
    }

    fn is_device_connected(&self) -> bool {
        self.raw.connected
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AdaptedDevice, Device};
    use crate::error::RegistryError;
    use crate::metadata::DeviceMeta;
    use parking_lot::Mutex;
    use rstest::rstest;

    /// Replays whatever the test writes into `next`.
    #[derive(Clone, Default)]
    struct Scripted {
        next: Arc<Mutex<JoystickRaw>>,
        rumble: Arc<Mutex<Vec<(f32, f32)>>>,
    }

    impl JoystickSource for Scripted {
        fn read(&mut self, raw: &mut JoystickRaw) -> Result<(), DeviceError> {
            let next = self.next.lock();
            raw.axes.clone_from(&next.axes);
            raw.buttons.clone_from(&next.buttons);
            raw.connected = next.connected;
            Ok(())
        }

        fn set_rumble(&mut self, strong: f32, weak: f32) -> Result<(), DeviceError> {
            self.rumble.lock().push((strong, weak));
            Ok(())
        }
    }

    fn pad(kind: JoystickKind) -> (AdaptedDevice<JoystickAdapter<Scripted>>, Scripted) {
        let script = Scripted::default();
        let layout = kind.layout();
        *script.next.lock() = JoystickRaw {
            connected: true,
            ..JoystickRaw::with_capacity(layout.axes, layout.buttons)
        };
        let source = script.clone();
        let dev = AdaptedDevice::new("pad", kind.display_name(), DeviceMeta::default(), || {
            JoystickAdapter::new(kind, source)
        })
        .unwrap();
        (dev, script)
    }

    #[rstest]
    #[case::xbox(JoystickKind::Xbox)]
    #[case::ds4(JoystickKind::DualShock4)]
    #[case::dualsense(JoystickKind::DualSense)]
    #[case::generic(JoystickKind::Generic)]
    fn every_mapped_button_has_a_distinct_index(#[case] kind: JoystickKind) {
        let layout = kind.layout();
        let mut indices: Vec<_> = layout.button_map.iter().map(|(_, i)| *i).collect();
        indices.sort_unstable();
        indices.dedup();
        assert_eq!(indices.len(), layout.button_map.len());
        assert!(indices.iter().all(|i| *i < layout.buttons));
    }

    #[rstest]
    #[case::xbox(JoystickKind::Xbox)]
    #[case::ds4(JoystickKind::DualShock4)]
    #[case::generic(JoystickKind::Generic)]
    fn left_and_right_bind_to_their_own_buttons(#[case] kind: JoystickKind) {
        let (mut dev, script) = pad(kind);
        let left = dev.state(&gamepad::DPAD_LEFT).unwrap();
        let right = dev.state(&gamepad::DPAD_RIGHT).unwrap();
        let lb = dev.state(&gamepad::LEFT_BUMPER).unwrap();
        let rb = dev.state(&gamepad::RIGHT_BUMPER).unwrap();
        assert!(!left.shares_state_with(&right));

        let index_of = |f: &'static Feature<ButtonState>| {
            kind.layout()
                .button_map
                .iter()
                .find(|(g, _)| std::ptr::eq(*g, f))
                .map(|(_, i)| *i)
                .unwrap()
        };

        script.next.lock().buttons[index_of(&gamepad::DPAD_LEFT)] = true;
        script.next.lock().buttons[index_of(&gamepad::LEFT_BUMPER)] = true;
        dev.poll().unwrap();
        assert!(left.is_pressed() && !right.is_pressed());
        assert!(lb.is_pressed() && !rb.is_pressed());

        script.next.lock().buttons.iter_mut().for_each(|b| *b = false);
        script.next.lock().buttons[index_of(&gamepad::DPAD_RIGHT)] = true;
        dev.poll().unwrap();
        assert!(right.is_pressed() && !left.is_pressed());
    }

    #[test]
    fn left_and_right_sticks_read_their_own_axes() {
        let (mut dev, script) = pad(JoystickKind::DualShock4);
        let left = dev.state(&gamepad::LEFT_STICK).unwrap();
        let right = dev.state(&gamepad::RIGHT_STICK).unwrap();
        {
            let mut next = script.next.lock();
            next.axes[0] = 0.25;
            next.axes[5] = -0.5;
            next.buttons[11] = true;
        }
        dev.poll().unwrap();
        assert_eq!(left.position(), (0.25, 0.0));
        assert_eq!(right.position(), (0.0, -0.5));
        assert_eq!(right.z(), -1.0);
        assert_eq!(left.z(), 0.0);
    }

    #[test]
    fn xbox_transform_flips_y() {
        let (mut dev, script) = pad(JoystickKind::Xbox);
        let stick = dev.state(&gamepad::LEFT_STICK).unwrap();
        script.next.lock().axes[1] = 1.0;
        dev.poll().unwrap();
        assert_eq!(stick.y(), -1.0);
    }

    #[test]
    fn signed_triggers_rest_at_zero() {
        let (mut dev, script) = pad(JoystickKind::Xbox);
        let lt = dev.state(&gamepad::LEFT_TRIGGER).unwrap();
        script.next.lock().axes[4] = -1.0;
        dev.poll().unwrap();
        assert_eq!(lt.value(), 0.0);
        script.next.lock().axes[4] = 3.0;
        dev.poll().unwrap();
        assert_eq!(lt.value(), 1.0);
    }

    #[test]
    fn generic_pads_lack_triggers_and_rumble() {
        let (mut dev, _) = pad(JoystickKind::Generic);
        assert_eq!(
            dev.state(&gamepad::LEFT_TRIGGER).unwrap_err(),
            RegistryError::UnsupportedFeature("gamepad.left_trigger")
        );
        assert!(dev.state(&gamepad::RUMBLE_WEAK).is_err());
        assert!(dev.state(&gamepad::GUIDE).is_err());
    }

    #[test]
    fn rumble_requests_are_forwarded_once() {
        let (mut dev, script) = pad(JoystickKind::Xbox);
        let strong = dev.state(&gamepad::RUMBLE_STRONG).unwrap();
        strong.set_strength(0.75);
        dev.poll().unwrap();
        dev.poll().unwrap();
        assert_eq!(script.rumble.lock().as_slice(), &[(0.75, 0.0)]);
        assert_eq!(strong.strength(), 0.75);
    }

    #[test]
    fn disconnected_source_reports_disconnected() {
        let (mut dev, script) = pad(JoystickKind::Generic);
        dev.poll().unwrap();
        assert!(dev.is_connected());
        script.next.lock().connected = false;
        dev.poll().unwrap();
        assert!(!dev.is_connected());
    }
}
