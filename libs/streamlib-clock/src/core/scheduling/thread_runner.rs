// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock thread runner.
//!
//! One thread per started, non-passive clock. It ticks while the clock is
//! started, the process is not shutting down, and the clock still has
//! sources to animate. Then it releases the clock's sources and marks it
//! stopped.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;

use super::state::ClockState;
use super::Clock;
use crate::core::error::{panic_message, Result, StreamError};
use crate::core::loop_utils::{shutdown_aware_loop, LoopControl};

pub(crate) fn spawn_clock_thread(clock: Clock) -> Result<JoinHandle<()>> {
    let id = clock.id();
    std::thread::Builder::new()
        .name(format!("clock-{}", id))
        .spawn(move || run_clock_loop(clock))
        .map_err(|e| {
            StreamError::Runtime(format!("Failed to spawn thread for clock {}: {}", id, e))
        })
}

fn run_clock_loop(clock: Clock) {
    let id = clock.id();
    let signals = Arc::clone(clock.registry().signals());
    tracing::info!("[{}] Clock thread started", id);

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        shutdown_aware_loop(&signals, || {
            let record = clock.record();
            let params = match &*record.state.lock() {
                ClockState::Started(params) => Arc::clone(params),
                ClockState::Stopping(_) | ClockState::Stopped(_) => {
                    tracing::trace!("[{}] Clock no longer started", id);
                    return Ok(LoopControl::Break);
                }
            };

            if !record.has_work(&params) {
                tracing::debug!("[{}] No sources left to animate", id);
                return Ok(LoopControl::Break);
            }

            clock.run_tick(&record, &params)
        })
    }));

    let result = outcome.unwrap_or_else(|payload| {
        Err(StreamError::Runtime(format!(
            "clock thread panicked: {}",
            panic_message(&*payload)
        )))
    });

    if let Err(e) = result {
        tracing::error!("[{}] Clock failed: {}", id, e);
        if clock.registry().settings().allow_streaming_errors {
            tracing::warn!("[{}] Stopping clock after error", id);
        } else {
            signals.request_shutdown(1);
        }
    }

    clock.finish();
    tracing::info!("[{}] Clock thread exiting", id);
}
