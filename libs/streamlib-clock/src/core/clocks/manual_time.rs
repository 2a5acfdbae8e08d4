// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Virtual time provider.
//!
//! Time only moves when [`ManualTimeProvider::advance`] is called or when a
//! clock sleeps. `sleep_until` jumps straight to the target and records the
//! sleep, which makes pacing decisions observable in tests and lets offline
//! renders run faster than real time.

use super::TimeProvider;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Clone, Default)]
pub struct ManualTimeProvider {
    now_ns: Arc<AtomicU64>,
    sleeps: Arc<AtomicU64>,
}

impl ManualTimeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start at `origin` instead of zero.
    pub fn starting_at(origin: Duration) -> Self {
        let provider = Self::default();
        provider.now_ns.store(origin.as_nanos() as u64, Ordering::Release);
        provider
    }

    /// Move virtual time forward.
    pub fn advance(&self, delta: Duration) {
        self.now_ns
            .fetch_add(delta.as_nanos() as u64, Ordering::AcqRel);
    }

    /// Number of `sleep_until` calls that actually had to wait.
    pub fn sleep_count(&self) -> u64 {
        self.sleeps.load(Ordering::Acquire)
    }
}

impl TimeProvider for ManualTimeProvider {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.now_ns.load(Ordering::Acquire))
    }

    fn sleep_until(&self, target: Duration) {
        let target_ns = target.as_nanos() as u64;
        let previous = self.now_ns.fetch_max(target_ns, Ordering::AcqRel);
        if previous < target_ns {
            self.sleeps.fetch_add(1, Ordering::AcqRel);
        }
    }

    fn description(&self) -> &str {
        "manual"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_advance() {
        let provider = ManualTimeProvider::new();
        assert_eq!(provider.now(), Duration::ZERO);

        provider.advance(Duration::from_millis(500));
        assert_eq!(provider.now(), Duration::from_millis(500));

        provider.advance(Duration::from_millis(250));
        assert_eq!(provider.now(), Duration::from_millis(750));
    }

    #[test]
    fn test_manual_sleep_jumps_forward_and_counts() {
        let provider = ManualTimeProvider::starting_at(Duration::from_secs(1));

        provider.sleep_until(Duration::from_secs(2));
        assert_eq!(provider.now(), Duration::from_secs(2));
        assert_eq!(provider.sleep_count(), 1);

        // Past target: no sleep, no rewind
        provider.sleep_until(Duration::from_secs(1));
        assert_eq!(provider.now(), Duration::from_secs(2));
        assert_eq!(provider.sleep_count(), 1);
    }

    #[test]
    fn test_manual_clones_share_time() {
        let provider = ManualTimeProvider::new();
        let shared = provider.clone();
        shared.advance(Duration::from_millis(40));
        assert_eq!(provider.now(), Duration::from_millis(40));
    }
}
