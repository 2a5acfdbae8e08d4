// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Cooperative time provider.
//!
//! Sleeps in bounded slices and yields the CPU for the final stretch before
//! the deadline. OS sleeps routinely overshoot by a scheduler quantum; the
//! yielding tail trades a little CPU for wake-ups close to the frame boundary.

use super::TimeProvider;
use std::time::{Duration, Instant};

/// Longest single OS sleep.
const MAX_SLICE: Duration = Duration::from_millis(5);

/// Below this distance to the deadline we yield instead of sleeping.
const YIELD_WINDOW: Duration = Duration::from_micros(500);

pub struct CooperativeTimeProvider {
    origin: Instant,
}

impl CooperativeTimeProvider {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for CooperativeTimeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeProvider for CooperativeTimeProvider {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, target: Duration) {
        loop {
            let remaining = target.saturating_sub(self.now());
            if remaining.is_zero() {
                return;
            }
            if remaining > YIELD_WINDOW {
                std::thread::sleep((remaining - YIELD_WINDOW).min(MAX_SLICE));
            } else {
                std::thread::yield_now();
            }
        }
    }

    fn description(&self) -> &str {
        "cooperative"
    }
}
