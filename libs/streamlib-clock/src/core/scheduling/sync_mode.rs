// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Pacing policy of a clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Pace against wall time unless a source self-syncs to a device.
    #[default]
    Automatic,
    /// Always pace against wall time.
    Cpu,
    /// Run as fast as possible.
    Unsynced,
    /// No thread; ticked only by a parent clock.
    Passive,
}

impl SyncMode {
    /// Whether a started clock with this mode gets its own thread.
    pub fn owns_thread(self) -> bool {
        self != SyncMode::Passive
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Automatic => write!(f, "auto"),
            SyncMode::Cpu => write!(f, "cpu"),
            SyncMode::Unsynced => write!(f, "unsynced"),
            SyncMode::Passive => write!(f, "passive"),
        }
    }
}

impl std::str::FromStr for SyncMode {
    type Err = crate::core::StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" | "automatic" => Ok(SyncMode::Automatic),
            "cpu" => Ok(SyncMode::Cpu),
            "none" | "unsynced" => Ok(SyncMode::Unsynced),
            "passive" => Ok(SyncMode::Passive),
            other => Err(crate::core::StreamError::Configuration(format!(
                "Unknown sync mode '{}' (expected auto, cpu, unsynced or passive)",
                other
            ))),
        }
    }
}

/// Externally observable status of a clock: its pacing policy while it runs,
/// or where it is in its shutdown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClockSync {
    Automatic,
    Cpu,
    Unsynced,
    Passive,
    Stopping,
    Stopped,
}

impl From<SyncMode> for ClockSync {
    fn from(mode: SyncMode) -> Self {
        match mode {
            SyncMode::Automatic => ClockSync::Automatic,
            SyncMode::Cpu => ClockSync::Cpu,
            SyncMode::Unsynced => ClockSync::Unsynced,
            SyncMode::Passive => ClockSync::Passive,
        }
    }
}

impl std::fmt::Display for ClockSync {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockSync::Automatic => write!(f, "auto"),
            ClockSync::Cpu => write!(f, "cpu"),
            ClockSync::Unsynced => write!(f, "unsynced"),
            ClockSync::Passive => write!(f, "passive"),
            ClockSync::Stopping => write!(f, "stopping"),
            ClockSync::Stopped => write!(f, "stopped"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("auto".parse::<SyncMode>().unwrap(), SyncMode::Automatic);
        assert_eq!("CPU".parse::<SyncMode>().unwrap(), SyncMode::Cpu);
        assert_eq!("none".parse::<SyncMode>().unwrap(), SyncMode::Unsynced);
        assert!("realtime".parse::<SyncMode>().is_err());
    }

    #[test]
    fn test_only_passive_runs_without_thread() {
        assert!(SyncMode::Automatic.owns_thread());
        assert!(SyncMode::Unsynced.owns_thread());
        assert!(!SyncMode::Passive.owns_thread());
    }

    #[test]
    fn test_clock_sync_display() {
        assert_eq!(ClockSync::from(SyncMode::Cpu).to_string(), "cpu");
        assert_eq!(ClockSync::Stopping.to_string(), "stopping");
    }

    #[test]
    fn test_yaml_names() {
        let mode: SyncMode = serde_yaml::from_str("unsynced").unwrap();
        assert_eq!(mode, SyncMode::Unsynced);
    }

    #[test]
    fn test_json_names() {
        assert_eq!(serde_json::to_string(&SyncMode::Cpu).unwrap(), "\"cpu\"");
        let mode: SyncMode = serde_json::from_str("\"passive\"").unwrap();
        assert_eq!(mode, SyncMode::Passive);
    }
}
