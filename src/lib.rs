//! Device-abstraction core for StickUp.
//!
//! Vendor bindings (XInput, hidapi, OS joystick APIs, test doubles) sit behind
//! [`DeviceAdapter`]s. Each adapter declares which [`Feature`]s it provides and
//! how to compute them from its raw polled data; application code only ever
//! talks to the public feature views.
//!
//! ```
//! use stickup_core::backends::virtual_input::VirtualSource;
//! use stickup_core::catalog::gamepad;
//! use stickup_core::config::SeekerConfig;
//! use stickup_core::peripheral::Transport;
//! use stickup_core::seeker::Seeker;
//! use stickup_core::Device;
//!
//! let source = VirtualSource::new();
//! let pad = source.control().plug_pad(0x045e, 0x028e, Transport::Usb);
//!
//! let mut seeker = Seeker::new(source, SeekerConfig::default()).unwrap();
//! seeker.seek().unwrap();
//!
//! let device = seeker.device_mut(pad.id()).unwrap();
//! let south = device.state(&gamepad::SOUTH).unwrap();
//! pad.set_button(0, true);
//! device.poll().unwrap();
//! assert!(south.is_pressed());
//! ```
//!
//! # Layers
//! - [`registry`]: per-device feature tables and adapter mappings.
//! - [`device`]: the poll cycle (raw refresh, updaters, connection edge, monitors).
//! - [`seeker`]: enumeration, setup retries, quarantine, USB/Bluetooth ambiguity.
//! - [`pressable`]: press / hold / repeat / release classification.
//! - [`manager`], [`eventbus`], [`worker`]: driving seekers and delivering events.
//!
//! # Feature flags
//! - **`hid`**: `hidapi` peripheral source (DualShock 4 over USB and Bluetooth).
//!
//! Logging goes through `tracing`; the crate never installs a subscriber.

pub mod adapter;
pub mod backends;
pub mod catalog;
pub mod config;
pub mod context;
pub mod device;
pub mod error;
pub mod event;
pub mod eventbus;
pub mod feature;
pub mod filtered_listener;
pub mod hotplug;
pub mod joystick;
pub mod logger;
pub mod manager;
pub mod metadata;
pub mod normalize;
pub mod peripheral;
pub mod pressable;
pub mod registry;
pub mod seeker;
pub mod state;
pub mod worker;

pub use adapter::{AdapterState, DeviceAdapter};
pub use config::{PressableConfig, SeekerConfig, Settings, WorkerConfig};
pub use device::{AdaptedDevice, Device, FeatureMonitor};
pub use error::{
    ConfigError, DeviceError, Error, RegistryError, SeekerError, SetupError, SourceError,
};
pub use event::{DeviceEvent, DeviceEventKind, ForgetReason, PressEvent, PressKind, SeekerEvent};
pub use eventbus::{EventBus, EventFilter, EventListener, ListenerId};
pub use feature::{Feature, FeatureKind, FeatureState};
pub use filtered_listener::FilteredListener;
pub use logger::TracingLogger;
pub use manager::Manager;
pub use metadata::DeviceMeta;
pub use peripheral::{NativeHandle, PeripheralId, PeripheralInfo, TargetFilter, Transport};
pub use registry::{FeatureRegistry, MappedFeatureRegistry};
pub use seeker::{DeviceSeeker, PeripheralSource, Seeker};
pub use worker::{PollWorker, WorkerEvent, WorkerKey};
