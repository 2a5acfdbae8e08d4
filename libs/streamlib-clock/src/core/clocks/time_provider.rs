// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Time provider trait - wall-clock reference used to pace clocks
//!
//! A clock captures its provider once, at start, and keeps it for as long as
//! it runs. Times are expressed as a [`Duration`] since the provider's own
//! origin, so the usual `Duration` arithmetic (`+`, `checked_sub`,
//! `mul_f64`, ordering) covers everything the pacing logic needs.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use super::{CooperativeTimeProvider, MonotonicTimeProvider};

/// Source of real time for clock pacing.
///
/// ## Implementations
///
/// - `MonotonicTimeProvider`: `Instant` + `thread::sleep`
/// - `CooperativeTimeProvider`: sliced sleep with a yielding tail
/// - `ManualTimeProvider`: virtual time for tests and offline rendering
pub trait TimeProvider: Send + Sync {
    /// Current time since the provider's origin.
    fn now(&self) -> Duration;

    /// Block the calling thread until `now() >= target`.
    ///
    /// Returns immediately if `target` is already in the past.
    fn sleep_until(&self, target: Duration);

    /// Human-readable provider name, used in logs.
    fn description(&self) -> &str;
}

pub type SharedTimeProvider = Arc<dyn TimeProvider>;

/// Seconds as `f64` (the `to_float` conversion).
#[inline]
pub fn to_secs(time: Duration) -> f64 {
    time.as_secs_f64()
}

/// Seconds to [`Duration`] (the `of_float` conversion).
///
/// Negative and non-finite values clamp to zero.
#[inline]
pub fn from_secs(secs: f64) -> Duration {
    if secs.is_finite() && secs > 0.0 {
        Duration::from_secs_f64(secs)
    } else {
        Duration::ZERO
    }
}

/// Provider selection as it appears in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TimeProviderKind {
    #[default]
    Monotonic,
    Cooperative,
}

impl TimeProviderKind {
    pub fn build(self) -> SharedTimeProvider {
        match self {
            TimeProviderKind::Monotonic => Arc::new(MonotonicTimeProvider::new()),
            TimeProviderKind::Cooperative => Arc::new(CooperativeTimeProvider::new()),
        }
    }
}

impl std::fmt::Display for TimeProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeProviderKind::Monotonic => write!(f, "monotonic"),
            TimeProviderKind::Cooperative => write!(f, "cooperative"),
        }
    }
}
