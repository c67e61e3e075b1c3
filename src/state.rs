//! Internal feature states and their public views.
//!
//! Every internal state type pairs with a view type. Views are cheap `Clone`
//! handles onto the same [`StateCell`], so a view obtained once keeps reading the
//! latest polled values. Output-style views (rumble, LED, cursor) also carry
//! *requests* that the adapter consumes on its next `poll()`.
//!
//! ## Value conventions
//! - Stick `x`/`y` and free axes are normalized to `[-1.0, 1.0]`; `y` is negative
//!   when the stick points up.
//! - Stick `z` is `-1.0` while the stick's thumb button is pressed, else `0.0`.
//! - Triggers and rumble strengths are normalized to `[0.0, 1.0]`.

use crate::error::RegistryError;
use crate::feature::{FeatureState, StateCell};
use crate::normalize::{clamp_positive, clamp_unit};
use crate::pressable::Direction;
use std::sync::Arc;

/// Digital button.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ButtonState {
    pub pressed: bool,
}

#[derive(Clone, Debug)]
pub struct Button(StateCell<ButtonState>);

impl Button {
    pub fn is_pressed(&self) -> bool {
        self.0.read().pressed
    }

    pub fn shares_state_with(&self, other: &Button) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl FeatureState for ButtonState {
    type View = Button;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Button {
        Button(cell.clone())
    }
}

/// Two-axis analog stick with a thumb-button overlay on `z`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StickState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl StickState {
    /// Whether the stick is deflected at least `threshold` towards `dir`.
    pub fn leans(&self, dir: Direction, threshold: f32) -> bool {
        match dir {
            Direction::Up => self.y <= -threshold,
            Direction::Down => self.y >= threshold,
            Direction::Left => self.x <= -threshold,
            Direction::Right => self.x >= threshold,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Stick(StateCell<StickState>);

impl Stick {
    pub fn x(&self) -> f32 {
        self.0.read().x
    }

    pub fn y(&self) -> f32 {
        self.0.read().y
    }

    pub fn z(&self) -> f32 {
        self.0.read().z
    }

    pub fn position(&self) -> (f32, f32) {
        let s = self.0.read();
        (s.x, s.y)
    }

    pub fn is_thumb_pressed(&self) -> bool {
        self.0.read().z < 0.0
    }

    pub fn leans(&self, dir: Direction, threshold: f32) -> bool {
        self.0.read().leans(dir, threshold)
    }
}

impl FeatureState for StickState {
    type View = Stick;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Stick {
        Stick(cell.clone())
    }
}

/// Analog trigger in `[0, 1]`.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct TriggerState {
    pub value: f32,
}

#[derive(Clone, Debug)]
pub struct Trigger(StateCell<TriggerState>);

impl Trigger {
    pub fn value(&self) -> f32 {
        self.0.read().value
    }
}

impl FeatureState for TriggerState {
    type View = Trigger;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Trigger {
        Trigger(cell.clone())
    }
}

/// Free axis in `[-1, 1]` (scroll wheel, throttle, rudder).
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct AxisState {
    pub value: f32,
}

#[derive(Clone, Debug)]
pub struct Axis(StateCell<AxisState>);

impl Axis {
    pub fn value(&self) -> f32 {
        self.0.read().value
    }
}

impl FeatureState for AxisState {
    type View = Axis;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Axis {
        Axis(cell.clone())
    }
}

/// Pointer position, plus a pending reposition request.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CursorState {
    pub x: f64,
    pub y: f64,
    /// Set through [`Cursor::request_position`]; taken by the adapter on its next poll.
    pub requested: Option<(f64, f64)>,
    /// Granted by adapters that can move the pointer.
    pub can_set_position: bool,
}

#[derive(Clone, Debug)]
pub struct Cursor(StateCell<CursorState>, &'static str);

impl Cursor {
    pub fn position(&self) -> (f64, f64) {
        let s = self.0.read();
        (s.x, s.y)
    }

    pub fn can_set_position(&self) -> bool {
        self.0.read().can_set_position
    }

    /// Ask the adapter to move the pointer on its next poll.
    pub fn request_position(&self, x: f64, y: f64) -> Result<(), RegistryError> {
        let mut s = self.0.write();
        if !s.can_set_position {
            return Err(RegistryError::CapabilityUnavailable(self.1));
        }
        s.requested = Some((x, y));
        Ok(())
    }
}

impl FeatureState for CursorState {
    type View = Cursor;

    fn view(cell: &StateCell<Self>, id: &'static str) -> Cursor {
        Cursor(cell.clone(), id)
    }
}

/// Rumble motor. `strength` is the last applied value, `requested` is pending.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RumbleState {
    pub strength: f32,
    pub requested: Option<f32>,
}

impl RumbleState {
    /// Take the pending request, recording it as applied.
    pub fn take_request(&mut self) -> Option<f32> {
        let req = self.requested.take()?;
        self.strength = req;
        Some(req)
    }
}

#[derive(Clone, Debug)]
pub struct Rumble(StateCell<RumbleState>);

impl Rumble {
    /// Request a force in `[0, 1]`; out-of-range values are clamped.
    pub fn set_strength(&self, strength: f32) {
        self.0.write().requested = Some(clamp_positive(strength));
    }

    pub fn strength(&self) -> f32 {
        self.0.read().strength
    }
}

impl FeatureState for RumbleState {
    type View = Rumble;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Rumble {
        Rumble(cell.clone())
    }
}

/// RGB light.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LedState {
    pub rgb: [u8; 3],
    pub requested: Option<[u8; 3]>,
}

impl LedState {
    pub fn take_request(&mut self) -> Option<[u8; 3]> {
        let req = self.requested.take()?;
        self.rgb = req;
        Some(req)
    }
}

#[derive(Clone, Debug)]
pub struct Led(StateCell<LedState>);

impl Led {
    pub fn set_color(&self, rgb: [u8; 3]) {
        self.0.write().requested = Some(rgb);
    }

    pub fn color(&self) -> [u8; 3] {
        self.0.read().rgb
    }
}

impl FeatureState for LedState {
    type View = Led;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Led {
        Led(cell.clone())
    }
}

/// Three-axis sensor (gyroscope, accelerometer), in device units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SensorState {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

#[derive(Clone, Debug)]
pub struct Sensor(StateCell<SensorState>);

impl Sensor {
    pub fn read(&self) -> [f32; 3] {
        let s = self.0.read();
        [s.x, s.y, s.z]
    }
}

impl FeatureState for SensorState {
    type View = Sensor;

    fn view(cell: &StateCell<Self>, _id: &'static str) -> Sensor {
        Sensor(cell.clone())
    }
}

/// Write a stick sample, clamping each axis into `[-1, 1]`.
pub fn set_stick(state: &mut StickState, x: f32, y: f32, thumb_pressed: bool) {
    state.x = clamp_unit(x);
    state.y = clamp_unit(y);
    state.z = crate::normalize::thumb_press_overlay(thumb_pressed);
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::RwLock;

    fn cell<S: Default>() -> StateCell<S> {
        Arc::new(RwLock::new(S::default()))
    }

    #[test]
    fn views_read_through() {
        let c = cell::<ButtonState>();
        let view = ButtonState::view(&c, "test");
        assert!(!view.is_pressed());
        c.write().pressed = true;
        assert!(view.is_pressed());
    }

    #[test]
    fn cursor_request_requires_capability() {
        let c = cell::<CursorState>();
        let view = CursorState::view(&c, "test");
        assert!(matches!(
            view.request_position(1.0, 2.0),
            Err(RegistryError::CapabilityUnavailable(_))
        ));

        c.write().can_set_position = true;
        view.request_position(1.0, 2.0).unwrap();
        assert_eq!(c.read().requested, Some((1.0, 2.0)));
    }

    #[test]
    fn rumble_request_is_clamped_and_consumed_once() {
        let c = cell::<RumbleState>();
        let view = RumbleState::view(&c, "test");
        view.set_strength(3.0);
        assert_eq!(c.write().take_request(), Some(1.0));
        assert_eq!(c.write().take_request(), None);
        assert_eq!(view.strength(), 1.0);
    }

    #[test]
    fn stick_leans_and_overlay() {
        let mut s = StickState::default();
        set_stick(&mut s, 0.9, -2.0, true);
        assert_eq!(s.y, -1.0);
        assert_eq!(s.z, -1.0);
        assert!(s.leans(Direction::Right, 2.0 / 3.0));
        assert!(s.leans(Direction::Up, 2.0 / 3.0));
        assert!(!s.leans(Direction::Left, 2.0 / 3.0));
    }
}
