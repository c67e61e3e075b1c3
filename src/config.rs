//! Runtime settings.
//!
//! The only externally tunable knobs are the seeker scan interval and setup-attempt
//! budget, the pressable-monitor timings, and the background worker cadence.
//! Everything else is structural.
//!
//! Settings can be built in code, or loaded from TOML / JSON. Every load path runs
//! [`Settings::validate`], so an invalid scan interval fails at the call that
//! introduced it.
//!
//! ```toml
//! [seeker]
//! scan_interval_ms = 500
//! setup_attempts = 3
//!
//! [pressable]
//! hold_threshold_ms = 1000
//! repeat_interval_ms = 100
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest accepted enumeration interval.
pub const MIN_SCAN_INTERVAL_MS: u64 = 10;

/// Seeker enumeration cadence and retry budget.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    /// Minimum time between two enumeration passes.
    pub scan_interval_ms: u64,
    /// Setup attempts granted to a candidate before it is quarantined.
    pub setup_attempts: u32,
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            scan_interval_ms: 1000,
            setup_attempts: 3,
        }
    }
}

impl SeekerConfig {
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.scan_interval_ms < MIN_SCAN_INTERVAL_MS {
            return Err(ConfigError::ScanIntervalTooShort {
                got: self.scan_interval_ms,
                min: MIN_SCAN_INTERVAL_MS,
            });
        }
        if self.setup_attempts == 0 {
            return Err(ConfigError::NoSetupAttempts);
        }
        Ok(())
    }
}

/// Timing of the press / hold / repeat state machine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PressableConfig {
    /// Continuous press time after which a press becomes a hold.
    pub hold_threshold_ms: u64,
    /// Spacing of repeated presses while held.
    pub repeat_interval_ms: u64,
    /// Fraction of full stick deflection that counts as a directional press.
    pub stick_threshold: f32,
}

impl Default for PressableConfig {
    fn default() -> Self {
        Self {
            hold_threshold_ms: 1000,
            repeat_interval_ms: 100,
            stick_threshold: 2.0 / 3.0,
        }
    }
}

impl PressableConfig {
    pub fn hold_threshold(&self) -> Duration {
        Duration::from_millis(self.hold_threshold_ms)
    }

    pub fn repeat_interval(&self) -> Duration {
        Duration::from_millis(self.repeat_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.repeat_interval_ms == 0 {
            return Err(ConfigError::InvalidPressable(
                "repeat interval must be non-zero".into(),
            ));
        }
        if self.hold_threshold_ms < self.repeat_interval_ms {
            return Err(ConfigError::InvalidPressable(format!(
                "hold threshold {} ms is shorter than the repeat interval {} ms",
                self.hold_threshold_ms, self.repeat_interval_ms
            )));
        }
        if !(self.stick_threshold > 0.0 && self.stick_threshold <= 1.0) {
            return Err(ConfigError::InvalidPressable(format!(
                "stick threshold {} is outside (0, 1]",
                self.stick_threshold
            )));
        }
        Ok(())
    }
}

/// Cadence of the optional background poll worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub poll_interval_ms: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 16,
        }
    }
}

impl WorkerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidWorker(
                "poll interval must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// All settings, as stored in a settings file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub seeker: SeekerConfig,
    pub pressable: PressableConfig,
    pub worker: WorkerConfig,
}

impl Settings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.seeker.validate()?;
        self.pressable.validate()?;
        self.worker.validate()
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = toml::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(text)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a `.toml` or `.json` file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("toml") => Self::from_toml_str(&std::fs::read_to_string(path)?),
            Some("json") => Self::from_json_str(&std::fs::read_to_string(path)?),
            _ => Err(ConfigError::UnknownFormat(path.to_path_buf())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults_match_documented_knobs() {
        let s = Settings::default();
        assert_eq!(s.seeker.setup_attempts, 3);
        assert_eq!(s.pressable.hold_threshold(), Duration::from_millis(1000));
        assert_eq!(s.pressable.repeat_interval(), Duration::from_millis(100));
        assert!(s.validate().is_ok());
    }

    #[rstest]
    #[case(0, false)]
    #[case(MIN_SCAN_INTERVAL_MS - 1, false)]
    #[case(MIN_SCAN_INTERVAL_MS, true)]
    #[case(5_000, true)]
    fn scan_interval_floor(#[case] ms: u64, #[case] ok: bool) {
        let cfg = SeekerConfig {
            scan_interval_ms: ms,
            ..SeekerConfig::default()
        };
        assert_eq!(cfg.validate().is_ok(), ok);
    }

    #[test]
    fn zero_attempts_rejected() {
        let cfg = SeekerConfig {
            setup_attempts: 0,
            ..SeekerConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::NoSetupAttempts)));
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let s = Settings::from_toml_str("[seeker]\nscan_interval_ms = 250\n").unwrap();
        assert_eq!(s.seeker.scan_interval_ms, 250);
        assert_eq!(s.seeker.setup_attempts, 3);
        assert_eq!(s.pressable, PressableConfig::default());
    }

    #[test]
    fn toml_with_short_interval_fails_fast() {
        let err = Settings::from_toml_str("[seeker]\nscan_interval_ms = 1\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::ScanIntervalTooShort { got: 1, .. }
        ));
    }

    #[test]
    fn json_settings() {
        let s = Settings::from_json_str(
            r#"{ "pressable": { "hold_threshold_ms": 500, "repeat_interval_ms": 50 } }"#,
        )
        .unwrap();
        assert_eq!(s.pressable.hold_threshold_ms, 500);
        assert_eq!(s.pressable.repeat_interval_ms, 50);
    }

    #[test]
    fn stick_threshold_bounds() {
        let cfg = PressableConfig {
            stick_threshold: 1.5,
            ..PressableConfig::default()
        };
        assert!(cfg.validate().is_err());
    }

    #[rstest]
    #[case(1000, 100, true)]
    #[case(100, 100, true)]
    #[case(50, 100, false)]
    fn hold_must_not_be_shorter_than_repeat(
        #[case] hold_threshold_ms: u64,
        #[case] repeat_interval_ms: u64,
        #[case] ok: bool,
    ) {
        let cfg = PressableConfig {
            hold_threshold_ms,
            repeat_interval_ms,
            ..PressableConfig::default()
        };
        assert_eq!(cfg.validate().is_ok(), ok);
    }

    #[test]
    fn unknown_extension() {
        let err = Settings::load("settings.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnknownFormat(_)));
    }
}
