//! Press / hold / repeat / release detection.
//!
//! [`PressableState`] is the per-(feature[, direction]) debounce machine:
//!
//! ```text
//!  Released ──pressed──► Pressed ──held ≥ hold_threshold──► Held ──every repeat_interval──► Held
//!     ▲                     │                                   │
//!     └──────released───────┴───────────────released────────────┘
//! ```
//!
//! | transition            | event                    |
//! |-----------------------|--------------------------|
//! | Released → Pressed    | `Press { held: false }`  |
//! | Pressed → Held        | `Hold` (once)            |
//! | Held, repeat elapsed  | `Press { held: true }`   |
//! | Pressed/Held → Released | `Release { was_held }` |
//!
//! Repeats are measured from the previous held press, not from the first press.
//! Feeding the same `pressed` value twice at the same instant never produces a
//! second event.
//!
//! [`PressableMonitor`] runs one machine per watched button, and four per watched
//! stick (one per [`Direction`]), sampling feature state after every poll.

use crate::config::PressableConfig;
use crate::device::FeatureMonitor;
use crate::error::RegistryError;
use crate::event::{DeviceEvent, DeviceEventKind, PressEvent, PressKind};
use crate::feature::{Feature, FeatureKey};
use crate::registry::FeatureRegistry;
use crate::state::{ButtonState, StickState};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Stick direction. `Up` is negative `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];
}

/// Timing record for one pressable signal.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PressableState {
    pressed: bool,
    press_time: Option<Instant>,
    held: bool,
    last_held_press: Option<Instant>,
}

impl PressableState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    pub fn press_time(&self) -> Option<Instant> {
        self.press_time
    }

    /// Feed one sample; returns the event this sample triggers, if any.
    pub fn update(
        &mut self,
        now: Instant,
        pressed: bool,
        hold_threshold: Duration,
        repeat_interval: Duration,
    ) -> Option<PressKind> {
        match (self.pressed, pressed) {
            (false, false) => None,
            (false, true) => {
                self.pressed = true;
                self.held = false;
                self.press_time = Some(now);
                self.last_held_press = None;
                Some(PressKind::Press { held: false })
            }
            (true, true) => {
                if !self.held {
                    let since = elapsed(self.press_time, now);
                    if since >= hold_threshold {
                        self.held = true;
                        self.last_held_press = Some(now);
                        return Some(PressKind::Hold);
                    }
                    None
                } else if elapsed(self.last_held_press, now) >= repeat_interval {
                    self.last_held_press = Some(now);
                    Some(PressKind::Press { held: true })
                } else {
                    None
                }
            }
            (true, false) => {
                let was_held = self.held;
                self.pressed = false;
                self.held = false;
                Some(PressKind::Release { was_held })
            }
        }
    }
}

fn elapsed(since: Option<Instant>, now: Instant) -> Duration {
    since
        .map(|t| now.saturating_duration_since(t))
        .unwrap_or(Duration::ZERO)
}

type Sampler = Box<dyn Fn(f32) -> bool + Send>;

struct Watch {
    key: FeatureKey,
    feature: &'static str,
    direction: Option<Direction>,
    sample: Sampler,
    state: PressableState,
}

/// Observes buttons and stick directions after each poll.
pub struct PressableMonitor {
    config: PressableConfig,
    watches: Vec<Watch>,
}

impl Default for PressableMonitor {
    fn default() -> Self {
        Self::new(PressableConfig::default())
    }
}

impl PressableMonitor {
    pub fn new(config: PressableConfig) -> Self {
        Self {
            config,
            watches: Vec::new(),
        }
    }

    pub fn config(&self) -> &PressableConfig {
        &self.config
    }

    /// Watch a button. Watching the same button twice is a no-op.
    pub fn watch_button(
        &mut self,
        registry: &mut FeatureRegistry,
        feature: &'static Feature<ButtonState>,
    ) -> Result<(), RegistryError> {
        let key = feature.key();
        if self.watches.iter().any(|w| w.key == key) {
            return Ok(());
        }
        let cell = registry.internal(feature)?;
        self.watches.push(Watch {
            key,
            feature: feature.id(),
            direction: None,
            sample: Box::new(move |_| cell.read().pressed),
            state: PressableState::new(),
        });
        Ok(())
    }

    /// Watch the four directions of a stick.
    pub fn watch_stick(
        &mut self,
        registry: &mut FeatureRegistry,
        feature: &'static Feature<StickState>,
    ) -> Result<(), RegistryError> {
        let key = feature.key();
        if self.watches.iter().any(|w| w.key == key) {
            return Ok(());
        }
        let cell = registry.internal(feature)?;
        for dir in Direction::ALL {
            let cell = cell.clone();
            self.watches.push(Watch {
                key,
                feature: feature.id(),
                direction: Some(dir),
                sample: Box::new(move |threshold| cell.read().leans(dir, threshold)),
                state: PressableState::new(),
            });
        }
        Ok(())
    }

    /// Stop watching a feature and drop its timing records.
    pub fn unwatch<S>(&mut self, feature: &'static Feature<S>) {
        let key = feature.key();
        self.watches.retain(|w| w.key != key);
    }

    pub fn is_watching<S>(&self, feature: &'static Feature<S>) -> bool {
        let key = feature.key();
        self.watches.iter().any(|w| w.key == key)
    }

    pub fn clear(&mut self) {
        self.watches.clear();
    }

    /// Current timing record of a watched feature (and direction, for sticks).
    pub fn state_of<S>(
        &self,
        feature: &'static Feature<S>,
        direction: Option<Direction>,
    ) -> Option<&PressableState> {
        let key = feature.key();
        self.watches
            .iter()
            .find(|w| w.key == key && w.direction == direction)
            .map(|w| &w.state)
    }
}

impl FeatureMonitor for PressableMonitor {
    fn update(&mut self, now: Instant, out: &mut Vec<DeviceEvent>) {
        let hold = self.config.hold_threshold();
        let repeat = self.config.repeat_interval();
        let threshold = self.config.stick_threshold;
        for watch in &mut self.watches {
            let pressed = (watch.sample)(threshold);
            if let Some(kind) = watch.state.update(now, pressed, hold, repeat) {
                out.push(DeviceEvent {
                    at: now,
                    kind: DeviceEventKind::Pressable(PressEvent {
                        feature: watch.feature,
                        direction: watch.direction,
                        kind,
                    }),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::gamepad;
    use proptest::prelude::*;

    const HOLD: Duration = Duration::from_millis(1000);
    const REPEAT: Duration = Duration::from_millis(100);

    fn ms(t0: Instant, ms: u64) -> Instant {
        t0 + Duration::from_millis(ms)
    }

    #[test]
    fn press_hold_repeat_release() {
        let t0 = Instant::now();
        let mut s = PressableState::new();
        let mut events = Vec::new();
        for step in 0..=12u64 {
            let pressed = step < 12;
            if let Some(ev) = s.update(ms(t0, step * 100), pressed, HOLD, REPEAT) {
                events.push((step * 100, ev));
            }
        }
        assert_eq!(
            events,
            vec![
                (0, PressKind::Press { held: false }),
                (1000, PressKind::Hold),
                (1100, PressKind::Press { held: true }),
                (1200, PressKind::Release { was_held: true }),
            ]
        );
    }

    #[test]
    fn short_press_releases_unheld() {
        let t0 = Instant::now();
        let mut s = PressableState::new();
        assert_eq!(
            s.update(t0, true, HOLD, REPEAT),
            Some(PressKind::Press { held: false })
        );
        assert_eq!(s.update(ms(t0, 999), true, HOLD, REPEAT), None);
        assert_eq!(
            s.update(ms(t0, 999), false, HOLD, REPEAT),
            Some(PressKind::Release { was_held: false })
        );
        assert!(!s.is_pressed());
    }

    #[test]
    fn repeated_samples_are_idempotent() {
        let t0 = Instant::now();
        let mut s = PressableState::new();
        s.update(t0, true, HOLD, REPEAT);
        for _ in 0..5 {
            assert_eq!(s.update(t0, true, HOLD, REPEAT), None);
        }
        assert_eq!(s.update(ms(t0, 1000), true, HOLD, REPEAT), Some(PressKind::Hold));
        assert_eq!(s.update(ms(t0, 1000), true, HOLD, REPEAT), None);
        assert!(s.update(ms(t0, 5), false, HOLD, REPEAT).is_some());
        assert_eq!(s.update(ms(t0, 5), false, HOLD, REPEAT), None);
    }

    #[test]
    fn monitor_emits_per_stick_direction() {
        let mut registry = FeatureRegistry::new();
        let mut monitor = PressableMonitor::default();
        monitor.watch_stick(&mut registry, &gamepad::LEFT_STICK).unwrap();
        monitor.watch_stick(&mut registry, &gamepad::LEFT_STICK).unwrap();

        let cell = registry.internal(&gamepad::LEFT_STICK).unwrap();
        let t0 = Instant::now();
        let mut out = Vec::new();

        cell.write().x = 0.5;
        monitor.update(t0, &mut out);
        assert!(out.is_empty(), "half deflection is below the 2/3 threshold");

        cell.write().x = 0.7;
        cell.write().y = -0.9;
        monitor.update(ms(t0, 10), &mut out);
        let dirs: Vec<_> = out
            .iter()
            .filter_map(|e| match &e.kind {
                DeviceEventKind::Pressable(p) => p.direction,
                _ => None,
            })
            .collect();
        assert_eq!(dirs, vec![Direction::Up, Direction::Right]);
    }

    #[test]
    fn unwatch_drops_records() {
        let mut registry = FeatureRegistry::new();
        let mut monitor = PressableMonitor::default();
        monitor.watch_button(&mut registry, &gamepad::SOUTH).unwrap();
        assert!(monitor.is_watching(&gamepad::SOUTH));
        assert!(monitor.state_of(&gamepad::SOUTH, None).is_some());
        monitor.unwatch(&gamepad::SOUTH);
        assert!(!monitor.is_watching(&gamepad::SOUTH));
    }

    #[test]
    fn watching_absent_feature_fails() {
        let mut registry = FeatureRegistry::new();
        registry.declare_absent(&gamepad::TOUCHPAD);
        let mut monitor = PressableMonitor::default();
        assert_eq!(
            monitor.watch_button(&mut registry, &gamepad::TOUCHPAD),
            Err(RegistryError::UnsupportedFeature("gamepad.touchpad"))
        );
    }

    proptest! {
        // Holding from t=0 with an arbitrary tick period: one press, one hold at the
        // first tick ≥ 1000ms, repeats spaced ≥ 100ms, one release.
        #[test]
        fn hold_timing(period in 1u64..250, ticks in 1usize..80) {
            let t0 = Instant::now();
            let mut s = PressableState::new();
            let mut presses = 0;
            let mut holds = Vec::new();
            let mut repeats: Vec<u64> = Vec::new();
            for i in 0..ticks as u64 {
                match s.update(ms(t0, i * period), true, HOLD, REPEAT) {
                    Some(PressKind::Press { held: false }) => presses += 1,
                    Some(PressKind::Hold) => holds.push(i * period),
                    Some(PressKind::Press { held: true }) => repeats.push(i * period),
                    other => prop_assert!(other.is_none()),
                }
            }
            let end = ticks as u64 * period;
            let release = s.update(ms(t0, end), false, HOLD, REPEAT);
            prop_assert_eq!(presses, 1);
            prop_assert!(holds.len() <= 1);
            if let Some(&h) = holds.first() {
                prop_assert!(h >= 1000 && h < 1000 + period);
            }
            let mut prev = holds.first().copied();
            for r in &repeats {
                prop_assert!(prev.map(|p| r - p >= 100).unwrap_or(false));
                prev = Some(*r);
            }
            prop_assert_eq!(release, Some(PressKind::Release { was_held: !holds.is_empty() }));
        }
    }
}
