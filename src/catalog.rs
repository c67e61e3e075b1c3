//! Standard feature sets.
//!
//! Devices of the same family expose the same `static` features, so application
//! code can ask any gamepad for [`gamepad::SOUTH`] regardless of whether an XInput
//! pad, a DualShock 4 over Bluetooth, or a virtual pad is behind it.
//!
//! Face buttons are named by position. On PlayStation pads `SOUTH` is Cross,
//! `EAST` Circle, `WEST` Square, `NORTH` Triangle; on Xbox pads A, B, X, Y.

/// Gamepad features.
pub mod gamepad {
    use crate::feature::{Feature, FeatureKind};
    use crate::state::{
        ButtonState, LedState, RumbleState, SensorState, StickState, TriggerState,
    };

    pub static SOUTH: Feature<ButtonState> = Feature::new("gamepad.south", FeatureKind::Button);
    pub static EAST: Feature<ButtonState> = Feature::new("gamepad.east", FeatureKind::Button);
    pub static WEST: Feature<ButtonState> = Feature::new("gamepad.west", FeatureKind::Button);
    pub static NORTH: Feature<ButtonState> = Feature::new("gamepad.north", FeatureKind::Button);

    pub static LEFT_BUMPER: Feature<ButtonState> =
        Feature::new("gamepad.left_bumper", FeatureKind::Button);
    pub static RIGHT_BUMPER: Feature<ButtonState> =
        Feature::new("gamepad.right_bumper", FeatureKind::Button);

    /// Back / Share / Create.
    pub static SELECT: Feature<ButtonState> = Feature::new("gamepad.select", FeatureKind::Button);
    /// Start / Options.
    pub static START: Feature<ButtonState> = Feature::new("gamepad.start", FeatureKind::Button);
    /// Xbox / PS button.
    pub static GUIDE: Feature<ButtonState> = Feature::new("gamepad.guide", FeatureKind::Button);

    pub static LEFT_THUMB: Feature<ButtonState> =
        Feature::new("gamepad.left_thumb", FeatureKind::Button);
    pub static RIGHT_THUMB: Feature<ButtonState> =
        Feature::new("gamepad.right_thumb", FeatureKind::Button);

    pub static DPAD_UP: Feature<ButtonState> = Feature::new("gamepad.dpad_up", FeatureKind::Button);
    pub static DPAD_DOWN: Feature<ButtonState> =
        Feature::new("gamepad.dpad_down", FeatureKind::Button);
    pub static DPAD_LEFT: Feature<ButtonState> =
        Feature::new("gamepad.dpad_left", FeatureKind::Button);
    pub static DPAD_RIGHT: Feature<ButtonState> =
        Feature::new("gamepad.dpad_right", FeatureKind::Button);

    pub static TOUCHPAD: Feature<ButtonState> = Feature::new("gamepad.touchpad", FeatureKind::Button);

    pub static LEFT_STICK: Feature<StickState> = Feature::new("gamepad.left_stick", FeatureKind::Stick);
    pub static RIGHT_STICK: Feature<StickState> =
        Feature::new("gamepad.right_stick", FeatureKind::Stick);

    pub static LEFT_TRIGGER: Feature<TriggerState> =
        Feature::new("gamepad.left_trigger", FeatureKind::Trigger);
    pub static RIGHT_TRIGGER: Feature<TriggerState> =
        Feature::new("gamepad.right_trigger", FeatureKind::Trigger);

    /// Low-frequency (left, heavy) motor.
    pub static RUMBLE_STRONG: Feature<RumbleState> =
        Feature::new("gamepad.rumble_strong", FeatureKind::Rumble);
    /// High-frequency (right, light) motor.
    pub static RUMBLE_WEAK: Feature<RumbleState> =
        Feature::new("gamepad.rumble_weak", FeatureKind::Rumble);

    pub static LIGHTBAR: Feature<LedState> = Feature::new("gamepad.lightbar", FeatureKind::Led);

    pub static GYRO: Feature<SensorState> = Feature::new("gamepad.gyro", FeatureKind::Sensor);
    pub static ACCEL: Feature<SensorState> = Feature::new("gamepad.accel", FeatureKind::Sensor);

    /// Every gamepad button, in catalog order.
    pub static BUTTONS: [&Feature<ButtonState>; 16] = [
        &SOUTH,
        &EAST,
        &WEST,
        &NORTH,
        &LEFT_BUMPER,
        &RIGHT_BUMPER,
        &SELECT,
        &START,
        &GUIDE,
        &LEFT_THUMB,
        &RIGHT_THUMB,
        &DPAD_UP,
        &DPAD_DOWN,
        &DPAD_LEFT,
        &DPAD_RIGHT,
        &TOUCHPAD,
    ];
}

/// Mouse features.
pub mod mouse {
    use crate::feature::{Feature, FeatureKind};
    use crate::state::{AxisState, ButtonState, CursorState};

    pub static LEFT: Feature<ButtonState> = Feature::new("mouse.left", FeatureKind::Button);
    pub static RIGHT: Feature<ButtonState> = Feature::new("mouse.right", FeatureKind::Button);
    pub static MIDDLE: Feature<ButtonState> = Feature::new("mouse.middle", FeatureKind::Button);
    pub static BACK: Feature<ButtonState> = Feature::new("mouse.back", FeatureKind::Button);
    pub static FORWARD: Feature<ButtonState> = Feature::new("mouse.forward", FeatureKind::Button);

    pub static CURSOR: Feature<CursorState> = Feature::new("mouse.cursor", FeatureKind::Cursor);

    /// Scroll wheel, in notches since the previous poll, clamped to `[-1, 1]`.
    pub static WHEEL: Feature<AxisState> = Feature::new("mouse.wheel", FeatureKind::Axis);
}
