//! Feature identities.
//!
//! A [`Feature`] names one kind of input or output a device can expose: a button,
//! a stick, a trigger, a cursor, a rumble motor, an LED, a sensor. Features are
//! declared once as process-wide `static`s and compared by **identity**, never by
//! structure: two statics with the same id string are still different features.
//!
//! ```
//! use stickup_core::feature::{Feature, FeatureKind};
//! use stickup_core::state::ButtonState;
//!
//! static FIRE: Feature<ButtonState> = Feature::new("demo.fire", FeatureKind::Button);
//!
//! assert_eq!(FIRE.key(), FIRE.key());
//! ```
//!
//! Declare features as `static`, not `const`. A `const` is inlined at each use
//! site and has no single address, so it cannot serve as an identity.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Shared cell holding a feature's internal state.
///
/// The adapter writes through it during `poll()`; public views read through it.
pub type StateCell<S> = Arc<RwLock<S>>;

/// Category of a feature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureKind {
    Button,
    Stick,
    Trigger,
    Axis,
    Cursor,
    Rumble,
    Led,
    Sensor,
}

/// Internal state backing a feature.
///
/// `Default` produces the zeroed state a feature starts with. [`FeatureState::view`]
/// derives the public, read-facing handle exposed to application code.
pub trait FeatureState: Default + Send + Sync + 'static {
    type View: Clone + Send + Sync + 'static;

    fn view(cell: &StateCell<Self>, id: &'static str) -> Self::View;
}

/// Stable identity key of a `static` feature (its address).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FeatureKey(usize);

/// Immutable feature identity, typed by the internal state it carries.
pub struct Feature<S> {
    id: &'static str,
    kind: FeatureKind,
    _state: PhantomData<fn() -> S>,
}

impl<S> Feature<S> {
    pub const fn new(id: &'static str, kind: FeatureKind) -> Self {
        Self {
            id,
            kind,
            _state: PhantomData,
        }
    }

    #[inline]
    pub fn id(&self) -> &'static str {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> FeatureKind {
        self.kind
    }

    #[inline]
    pub fn key(&'static self) -> FeatureKey {
        FeatureKey(self as *const Self as *const () as usize)
    }
}

impl<S: FeatureState> Feature<S> {
    /// Fresh zeroed internal state.
    pub fn default_state(&self) -> S {
        S::default()
    }

    /// Public view over an internal state cell.
    pub fn derive_view(&self, cell: &StateCell<S>) -> S::View {
        S::view(cell, self.id)
    }
}

impl<S> PartialEq for Feature<S> {
    fn eq(&self, other: &Self) -> bool {
        std::ptr::eq(self, other)
    }
}

impl<S> Eq for Feature<S> {}

impl<S> fmt::Debug for Feature<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Feature")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish()
    }
}

impl<S> fmt::Display for Feature<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id)
    }
}
