//! Device adapter boundary.
//!
//! An adapter is the only code that talks to a vendor binding. It owns the raw
//! buffers for one device instance, declares its feature mappings once in
//! [`DeviceAdapter::init_adapter`], and refreshes the raw buffers in
//! [`DeviceAdapter::poll_device`]. Everything above it (updaters, monitors,
//! seekers) only ever sees the raw value returned by [`DeviceAdapter::raw`].
//!
//! Lifecycle, driven by [`AdaptedDevice`](crate::device::AdaptedDevice):
//!
//! ```text
//! Constructed ──init_adapter──► Initialized ──poll──► Polling ──poll──► Polling
//!                                     │                  │
//!                                     └──────close───────┴──► Closed
//! ```

use crate::error::DeviceError;
use crate::registry::MappedFeatureRegistry;

/// Where a device is in its adapter lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum AdapterState {
    Constructed,
    Initialized,
    Polling,
    Closed,
}

/// Vendor-specific half of a device.
pub trait DeviceAdapter: Send + 'static {
    /// Raw data refreshed by [`poll_device`](Self::poll_device) and read by updaters.
    type Raw: Send + 'static;

    /// Declare every feature mapping. Runs exactly once, before the first poll.
    ///
    /// Capability flags on shared internal state (e.g. "can set cursor position")
    /// are also granted here.
    fn init_adapter(
        &mut self,
        registry: &mut MappedFeatureRegistry<Self::Raw>,
    ) -> Result<(), DeviceError>;

    /// Refresh the raw buffers from the vendor source. No retries at this layer.
    fn poll_device(&mut self) -> Result<(), DeviceError>;

    fn raw(&self) -> &Self::Raw;

    /// Computed fresh on every call; never cached by the caller.
    fn is_device_connected(&self) -> bool;

    /// Release resources the adapter itself allocated. Called at most once.
    fn close(&mut self) {}
}
