// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::TimeProvider;
use std::time::{Duration, Instant};

/// `Instant`-backed provider that sleeps with `std::thread::sleep`.
pub struct MonotonicTimeProvider {
    origin: Instant,
}

impl MonotonicTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for MonotonicTimeProvider {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, target: Duration) {
        let remaining = target.saturating_sub(self.now());
        if !remaining.is_zero() {
            std::thread::sleep(remaining);
        }
    }

    fn description(&self) -> &str {
        "monotonic"
    }
}
