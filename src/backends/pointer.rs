//! Pointer (mouse) backend.
//!
//! The host owns the real pointer: it pushes motion, buttons and wheel ticks
//! into a [`PointerFeed`] from its own event loop, and applies repositions the
//! application asked for by draining [`PointerFeed::take_reposition`].

use crate::adapter::DeviceAdapter;
use crate::catalog::mouse;
use crate::config::PressableConfig;
use crate::device::AdaptedDevice;
use crate::error::DeviceError;
use crate::feature::{Feature, StateCell};
use crate::metadata::DeviceMeta;
use crate::normalize::clamp_unit;
use crate::registry::MappedFeatureRegistry;
use crate::state::{AxisState, ButtonState, CursorState};
use parking_lot::Mutex;
use std::sync::Arc;

/// Mouse buttons in [`PointerRaw::buttons`] order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
    Back,
    Forward,
}

impl MouseButton {
    fn index(self) -> usize {
        self as usize
    }

    fn feature(self) -> &'static Feature<ButtonState> {
        match self {
            MouseButton::Left => &mouse::LEFT,
            MouseButton::Right => &mouse::RIGHT,
            MouseButton::Middle => &mouse::MIDDLE,
            MouseButton::Back => &mouse::BACK,
            MouseButton::Forward => &mouse::FORWARD,
        }
    }
}

const ALL_BUTTONS: [MouseButton; 5] = [
    MouseButton::Left,
    MouseButton::Right,
    MouseButton::Middle,
    MouseButton::Back,
    MouseButton::Forward,
];

/// Snapshot of the feed taken once per poll.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerRaw {
    pub x: f64,
    pub y: f64,
    pub buttons: [bool; 5],
    /// Wheel ticks since the previous poll, clamped to `[-1, 1]`.
    pub wheel: f32,
    pub connected: bool,
}

#[derive(Debug, Default)]
struct FeedState {
    raw: PointerRaw,
    wheel: f32,
    reposition: Option<(f64, f64)>,
}

/// Host-side handle feeding one pointer device.
#[derive(Clone, Debug)]
pub struct PointerFeed(Arc<Mutex<FeedState>>);

impl Default for PointerFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl PointerFeed {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(FeedState {
            raw: PointerRaw {
                connected: true,
                ..PointerRaw::default()
            },
            ..FeedState::default()
        })))
    }

    pub fn move_by(&self, dx: f64, dy: f64) {
        let mut s = self.0.lock();
        s.raw.x += dx;
        s.raw.y += dy;
    }

    pub fn move_to(&self, x: f64, y: f64) {
        let mut s = self.0.lock();
        s.raw.x = x;
        s.raw.y = y;
    }

    pub fn set_button(&self, button: MouseButton, pressed: bool) {
        self.0.lock().raw.buttons[button.index()] = pressed;
    }

    /// Accumulate wheel ticks; positive scrolls away from the user.
    pub fn scroll(&self, ticks: f32) {
        self.0.lock().wheel += ticks;
    }

    pub fn set_connected(&self, connected: bool) {
        self.0.lock().raw.connected = connected;
    }

    /// Position the application asked for since the last call, if any.
    pub fn take_reposition(&self) -> Option<(f64, f64)> {
        self.0.lock().reposition.take()
    }

    fn snapshot(&self) -> PointerRaw {
        let mut s = self.0.lock();
        let wheel = std::mem::take(&mut s.wheel);
        PointerRaw {
            wheel: clamp_unit(wheel),
            ..s.raw
        }
    }

    fn reposition(&self, x: f64, y: f64) {
        let mut s = self.0.lock();
        s.raw.x = x;
        s.raw.y = y;
        s.reposition = Some((x, y));
    }
}

pub struct PointerAdapter {
    feed: PointerFeed,
    raw: PointerRaw,
    cursor: Option<StateCell<CursorState>>,
    can_reposition: bool,
    closed: bool,
}

impl PointerAdapter {
    pub fn new(feed: PointerFeed) -> Self {
        Self {
            feed,
            raw: PointerRaw::default(),
            cursor: None,
            can_reposition: true,
            closed: false,
        }
    }

    /// A pointer the application may read but never move.
    pub fn read_only(feed: PointerFeed) -> Self {
        Self {
            can_reposition: false,
            ..Self::new(feed)
        }
    }

    pub fn feed(&self) -> &PointerFeed {
        &self.feed
    }
}

impl DeviceAdapter for PointerAdapter {
    type Raw = PointerRaw;

    fn init_adapter(
        &mut self,
        registry: &mut MappedFeatureRegistry<PointerRaw>,
    ) -> Result<(), DeviceError> {
        for button in ALL_BUTTONS {
            registry.map_feature(
                button.feature(),
                button.index(),
                |s: &mut ButtonState, i: &usize, raw: &PointerRaw| s.pressed = raw.buttons[*i],
            )?;
        }
        registry.map_feature(&mouse::WHEEL, (), |s: &mut AxisState, _, raw: &PointerRaw| {
            s.value = raw.wheel
        })?;

        let cursor = registry.map_feature(
            &mouse::CURSOR,
            (),
            |s: &mut CursorState, _, raw: &PointerRaw| {
                s.x = raw.x;
                s.y = raw.y;
            },
        )?;
        cursor.write().can_set_position = self.can_reposition;
        self.cursor = Some(cursor);
        Ok(())
    }

    fn poll_device(&mut self) -> Result<(), DeviceError> {
        if self.closed {
            return Err(DeviceError::Closed);
        }
        let requested = self.cursor.as_ref().and_then(|c| c.write().requested.take());
        if let Some((x, y)) = requested {
            self.feed.reposition(x, y);
        }
        self.raw = self.feed.snapshot();
        Ok(())
    }

    fn raw(&self) -> &PointerRaw {
        &self.raw
    }

    fn is_device_connected(&self) -> bool {
        self.raw.connected && !self.closed
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

pub type PointerDevice = AdaptedDevice<PointerAdapter>;

pub fn pointer_device(
    id: impl Into<String>,
    feed: PointerFeed,
    pressable: PressableConfig,
) -> Result<PointerDevice, DeviceError> {
    AdaptedDevice::with_pressable_config(
        id,
        "Pointer",
        DeviceMeta::default(),
        pressable,
        || PointerAdapter::new(feed),
    )
}
