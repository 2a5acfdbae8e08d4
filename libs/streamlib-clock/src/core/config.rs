// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Scheduler settings via `streamlib-clock.yaml`.

use crate::core::clocks::{from_secs, TimeProviderKind};
use crate::core::{Result, StreamError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Settings shared by every clock of a registry.
///
/// ```yaml
/// frame_duration: 0.02
/// max_latency: 5
/// log_delay: 1
/// allow_streaming_errors: true
/// time_provider: cooperative
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClockSettings {
    /// Length of one tick, in seconds.
    pub frame_duration: f64,
    /// Drift beyond which sources are reset instead of caught up, in seconds.
    pub max_latency: f64,
    /// Minimum interval between two catch-up warnings, in seconds.
    pub log_delay: f64,
    /// Detach failing sources instead of shutting the process down.
    pub allow_streaming_errors: bool,
    pub time_provider: TimeProviderKind,
}

impl Default for ClockSettings {
    fn default() -> Self {
        Self {
            frame_duration: 0.04,
            max_latency: 60.0,
            log_delay: 1.0,
            allow_streaming_errors: false,
            time_provider: TimeProviderKind::Monotonic,
        }
    }
}

impl ClockSettings {
    /// Configuration file name.
    pub const FILE_NAME: &'static str = "streamlib-clock.yaml";

    /// Load settings from a directory. Returns error if the file is missing,
    /// cannot be parsed, or holds invalid values.
    pub fn load(dir: &Path) -> Result<Self> {
        let config_path = dir.join(Self::FILE_NAME);

        let content = std::fs::read_to_string(&config_path).map_err(|e| {
            StreamError::Configuration(format!("Failed to read {}: {}", config_path.display(), e))
        })?;

        let settings: Self = serde_yaml::from_str(&content).map_err(|e| {
            StreamError::Configuration(format!("Failed to parse {}: {}", config_path.display(), e))
        })?;
        settings.validate()?;

        tracing::info!("Loaded clock settings from {}", config_path.display());
        Ok(settings)
    }

    /// Load settings from a directory, returning defaults if the file is
    /// missing or unusable.
    pub fn load_or_default(dir: &Path) -> Self {
        let config_path = dir.join(Self::FILE_NAME);

        if !config_path.exists() {
            tracing::debug!(
                "No {} found in {}, using defaults",
                Self::FILE_NAME,
                dir.display()
            );
            return Self::default();
        }

        match Self::load(dir) {
            Ok(settings) => settings,
            Err(e) => {
                tracing::warn!("{}, using defaults", e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        check_positive("frame_duration", self.frame_duration)?;
        check_positive("max_latency", self.max_latency)?;
        if !self.log_delay.is_finite() || self.log_delay < 0.0 {
            return Err(StreamError::Configuration(format!(
                "log_delay must be a non-negative number of seconds, got {}",
                self.log_delay
            )));
        }
        Ok(())
    }

    pub fn frame_duration(&self) -> Duration {
        from_secs(self.frame_duration)
    }

    pub fn max_latency(&self) -> Duration {
        from_secs(self.max_latency)
    }

    pub fn log_delay(&self) -> Duration {
        from_secs(self.log_delay)
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(StreamError::Configuration(format!(
            "{} must be a positive number of seconds, got {}",
            name, value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_settings(dir: &Path, content: &str) {
        std::fs::write(dir.join(ClockSettings::FILE_NAME), content).unwrap();
    }

    #[test]
    fn test_defaults() {
        let settings = ClockSettings::default();
        assert_eq!(settings.frame_duration(), Duration::from_millis(40));
        assert_eq!(settings.max_latency(), Duration::from_secs(60));
        assert_eq!(settings.log_delay(), Duration::from_secs(1));
        assert!(!settings.allow_streaming_errors);
        assert_eq!(settings.time_provider, TimeProviderKind::Monotonic);
    }

    #[test]
    fn test_load_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(
            dir.path(),
            "max_latency: 2.5\nallow_streaming_errors: true\ntime_provider: cooperative\n",
        );

        let settings = ClockSettings::load(dir.path()).unwrap();
        assert_eq!(settings.max_latency, 2.5);
        assert!(settings.allow_streaming_errors);
        assert_eq!(settings.time_provider, TimeProviderKind::Cooperative);
        assert_eq!(settings.frame_duration, 0.04);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = ClockSettings::load(dir.path()).unwrap_err();
        assert!(matches!(err, StreamError::Configuration(_)));
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let dir = tempfile::tempdir().unwrap();
        write_settings(dir.path(), "frame_duration: 0\n");
        assert!(matches!(
            ClockSettings::load(dir.path()),
            Err(StreamError::Configuration(_))
        ));
    }

    #[test]
    fn test_load_or_default_on_missing_or_broken_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(ClockSettings::load_or_default(dir.path()), ClockSettings::default());

        write_settings(dir.path(), "max_latency: [not, a, number]\n");
        assert_eq!(ClockSettings::load_or_default(dir.path()), ClockSettings::default());
    }

    #[test]
    fn test_validate() {
        let mut settings = ClockSettings::default();
        assert!(settings.validate().is_ok());

        settings.max_latency = f64::INFINITY;
        assert!(settings.validate().is_err());

        settings.max_latency = 1.0;
        settings.log_delay = 0.0;
        assert!(settings.validate().is_ok());

        settings.log_delay = -1.0;
        assert!(settings.validate().is_err());
    }
}
