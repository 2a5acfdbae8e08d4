// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Self-sync arbitration and real-time pacing
//!
//! At the end of every tick the clock compares real time with its logical
//! time `t0 + frame_duration * ticks`:
//!
//! | real time vs target      | action                                  |
//! |--------------------------|-----------------------------------------|
//! | early                    | sleep until the target                  |
//! | late, up to max latency  | keep going, warn (rate-limited)         |
//! | late beyond max latency  | reset animated sources, rebase `t0`     |
//!
//! `Unsynced` and `Passive` clocks never sleep. An `Automatic` clock whose
//! sources include exactly one device-paced source lets that device lead.

use std::time::Duration;

use super::state::{elapsed, ActiveParams};
use super::{Clock, SyncMode};
use crate::core::error::{Result, StreamError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pacing {
    /// On time, or pacing is not the clock's job.
    Proceed,
    /// Ahead of real time: sleep until the target.
    Sleep(Duration),
    /// Behind, within the latency budget.
    CatchUp { drift: Duration },
    /// Too far behind to catch up.
    Reset { drift: Duration },
}

pub(crate) fn decide(
    sync: SyncMode,
    delegated: bool,
    now: Duration,
    target: Duration,
    max_latency: Duration,
) -> Pacing {
    match sync {
        SyncMode::Unsynced | SyncMode::Passive => return Pacing::Proceed,
        SyncMode::Automatic if delegated => return Pacing::Proceed,
        SyncMode::Automatic | SyncMode::Cpu => {}
    }

    match now.checked_sub(target) {
        None => Pacing::Sleep(target),
        Some(drift) if drift.is_zero() => Pacing::Proceed,
        Some(drift) if drift > max_latency => Pacing::Reset { drift },
        Some(drift) => Pacing::CatchUp { drift },
    }
}

/// Whether a catch-up warning may be logged at `now`.
pub(crate) fn should_log(last: Option<Duration>, now: Duration, log_delay: Duration) -> bool {
    match last {
        None => true,
        Some(last) => now.saturating_sub(last) >= log_delay,
    }
}

/// Token description of the single animated source pacing itself against a
/// device, if any.
///
/// # Errors
///
/// `SelfSyncConflict` if more than one source claims to pace the clock.
pub(crate) fn arbitrate(clock_id: &str, params: &ActiveParams) -> Result<Option<String>> {
    let mut claims: Vec<String> = params
        .animated_sources()
        .iter()
        .filter_map(|source| {
            let self_sync = source.lock().self_sync();
            if self_sync.is_active() {
                self_sync.token_description()
            } else {
                None
            }
        })
        .collect();

    if claims.len() > 1 {
        return Err(StreamError::SelfSyncConflict {
            clock_id: clock_id.to_string(),
            sources: claims,
        });
    }
    Ok(claims.pop())
}

impl Clock {
    /// Description of the device currently pacing this clock, if any.
    ///
    /// # Errors
    ///
    /// `SelfSyncConflict` if several sources claim to pace the clock.
    pub fn self_sync(&self) -> Result<Option<String>> {
        match self.record().params() {
            Some(params) => arbitrate(&self.id(), &params),
            None => Ok(None),
        }
    }

    /// End-of-tick pacing.
    pub(crate) fn pace(&self, clock_id: &str, params: &ActiveParams) -> Result<()> {
        let delegate = arbitrate(clock_id, params)?;
        let now = params.time.now();
        let target = params.target_time();

        match decide(params.sync, delegate.is_some(), now, target, params.max_latency) {
            Pacing::Proceed => {}
            Pacing::Sleep(target) => {
                tracing::trace!(
                    "[{}] Sleeping {:?} until next tick",
                    clock_id,
                    target.saturating_sub(now)
                );
                params.time.sleep_until(target);
            }
            Pacing::CatchUp { drift } => {
                let mut last = params.last_catchup_log.lock();
                if should_log(*last, now, params.log_delay) {
                    tracing::warn!(
                        "[{}] We must catchup {:.2} seconds!",
                        clock_id,
                        drift.as_secs_f64()
                    );
                    *last = Some(now);
                }
            }
            Pacing::Reset { drift } => {
                tracing::error!(
                    "[{}] Too much latency ({:.2} seconds)! Resetting active sources...",
                    clock_id,
                    drift.as_secs_f64()
                );
                for source in params.animated_sources() {
                    source.lock().reset();
                }
                // Next target is now; stay on schedule from here.
                *params.t0.lock() =
                    now.saturating_sub(elapsed(params.frame_duration, params.ticks()));
            }
        }
        Ok(())
    }
}
