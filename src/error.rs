//! Error types.
//!
//! Each layer has its own error enum so callers can tell configuration mistakes
//! (fail fast, never retried) apart from setup failures (retried by the seeker)
//! and runtime faults (quarantine the one peripheral that raised them).

use std::path::PathBuf;

/// Errors raised by the feature registries.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A feature was mapped twice on the same adapter instance.
    #[error("feature `{0}` is already mapped on this adapter")]
    DuplicateMapping(&'static str),

    /// The device type declared this feature as absent.
    #[error("feature `{0}` is not supported by this device")]
    UnsupportedFeature(&'static str),

    /// A mandatory feature was left without a mapping when the adapter finished initializing.
    #[error("mandatory feature `{0}` has no mapping")]
    UnmappedFeature(&'static str),

    /// A mapping was attempted after `init_adapter` completed.
    #[error("cannot map feature `{0}`: mappings are sealed after initialization")]
    MappingSealed(&'static str),

    /// The stored state for a feature has a different type than requested.
    #[error("state type mismatch for feature `{0}`")]
    StateTypeMismatch(&'static str),

    /// The adapter did not grant the capability needed for a request.
    #[error("feature `{0}` does not accept this request on this device")]
    CapabilityUnavailable(&'static str),
}

/// Errors raised while polling or constructing a device.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Reading from or writing to the underlying peripheral failed.
    #[error("device I/O failed: {0}")]
    Io(String),

    /// The device was closed and can no longer be polled.
    #[error("device is closed")]
    Closed,

    /// Vendor backend specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Failure while setting up a peripheral inside a seeker.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SetupError {
    /// Transient failure (busy handle, interface claimed elsewhere). Retried on a later scan.
    #[error("recoverable setup failure: {0}")]
    Recoverable(String),

    /// Permanent failure. The peripheral is quarantined immediately.
    #[error("fatal setup failure: {0}")]
    Fatal(String),
}

impl From<DeviceError> for SetupError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Io(msg) => SetupError::Recoverable(msg),
            other => SetupError::Fatal(other.to_string()),
        }
    }
}

/// Enumeration failure reported by a peripheral source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    #[error("enumeration failed: {0}")]
    Enumeration(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by [`Seeker::seek_at`](crate::seeker::Seeker::seek_at).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SeekerError {
    #[error(transparent)]
    Source(#[from] SourceError),

    /// An error captured on a vendor callback thread, re-raised on the polling thread.
    #[error("hotplug callback failed: {0}")]
    Callback(String),

    #[error("seeker is closed")]
    Closed,
}

/// Configuration loading and validation errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("scan interval {got} ms is below the {min} ms floor")]
    ScanIntervalTooShort { got: u64, min: u64 },

    #[error("setup attempt budget must be at least 1")]
    NoSetupAttempts,

    #[error("invalid pressable timing: {0}")]
    InvalidPressable(String),

    #[error("invalid worker settings: {0}")]
    InvalidWorker(String),

    #[error("failed to parse TOML settings: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("failed to parse JSON settings: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to read settings: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown settings format: {}", .0.display())]
    UnknownFormat(PathBuf),
}

/// Crate-wide error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Setup(#[from] SetupError),

    #[error(transparent)]
    Seeker(#[from] SeekerError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
