//! Process-wide, reference-counted library handles.
//!
//! Native libraries that must be initialized once per process (hidapi, libusb
//! contexts) live in a [`LibrarySlot`]. The slot only holds a `Weak`; every
//! user keeps an `Arc`. The first [`acquire`](LibrarySlot::acquire) initializes
//! the library, later ones share it, and it is torn down when the last `Arc` is
//! dropped. A later `acquire` initializes it again.

use parking_lot::{const_mutex, Mutex};
use std::sync::{Arc, Weak};

pub struct LibrarySlot<T> {
    slot: Mutex<Weak<T>>,
}

impl<T> LibrarySlot<T> {
    pub const fn new() -> Self {
        Self {
            slot: const_mutex(Weak::new()),
        }
    }

    /// The live handle, or a fresh one from `init`.
    ///
    /// The slot lock is held across `init`, so concurrent callers never
    /// initialize twice.
    pub fn acquire<E>(&self, init: impl FnOnce() -> Result<T, E>) -> Result<Arc<T>, E> {
        let mut slot = self.slot.lock();
        if let Some(live) = slot.upgrade() {
            return Ok(live);
        }
        let fresh = Arc::new(init()?);
        *slot = Arc::downgrade(&fresh);
        Ok(fresh)
    }

    /// Whether some owner still holds the library.
    pub fn is_live(&self) -> bool {
        self.slot.lock().strong_count() > 0
    }
}

impl<T> Default for LibrarySlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
