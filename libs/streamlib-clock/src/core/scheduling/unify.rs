// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock unification
//!
//! Merging is only allowed when an idle, uncommitted clock can join one that
//! is already running or committed to the same pacing policy:
//!
//! 1. Same record: nothing to do.
//! 2. Both stopped with the same pending sync: keep the one that has an id.
//! 3. `a` stopped with `Automatic` or with `b`'s effective sync: `a` joins `b`.
//! 4. The same with roles swapped.
//! 5. Anything else is a [`StreamError::ClockConflict`].
//!
//! Clocks that both have a parent are never merged, so a merged clock keeps
//! a single parent. A clock with a parent only merges into a passive
//! survivor: sub-clocks are ticked by their parent and never own a thread.

use super::registry::{find, Slot};
use super::state::{ClockRecord, ClockState};
use super::{Clock, SyncMode};
use crate::core::error::{Result, StreamError};

impl Clock {
    /// Merge `other` with this clock. Afterwards both handles resolve to the
    /// same clock.
    ///
    /// # Errors
    ///
    /// `ClockConflict` if the two clocks are committed to incompatible sync
    /// policies; both clocks are left untouched.
    pub fn unify(&self, other: &Clock) -> Result<()> {
        self.unify_at(other, None)
    }

    /// [`Clock::unify`], reporting `position` in the conflict error.
    pub fn unify_at(&self, other: &Clock, position: Option<&str>) -> Result<()> {
        self.check_same_registry(other)?;

        let merged = self.registry().with_slots(|slots| {
            let (a_index, a) = find(slots, self.index());
            let (b_index, b) = find(slots, other.index());
            if a_index == b_index {
                return Ok(None);
            }

            let keep_a = {
                let a_state = a.state.lock();
                let b_state = b.state.lock();
                let a_parented = a.parent.lock().is_some();
                let b_parented = b.parent.lock().is_some();

                let keep_a = if a_parented && b_parented {
                    None
                } else {
                    survivor_is_left(&a, &a_state, &b, &b_state).filter(|&keep_a| {
                        let survivor = if keep_a { &*a_state } else { &*b_state };
                        !(a_parented || b_parented) || survivor.sync_mode() == SyncMode::Passive
                    })
                };

                match keep_a {
                    Some(keep_a) => keep_a,
                    None => {
                        return Err(StreamError::ClockConflict {
                            left: a.label(a_state.sync_mode()),
                            right: b.label(b_state.sync_mode()),
                            position: position
                                .map(str::to_string)
                                .or_else(|| a.position.lock().clone()),
                        });
                    }
                }
            };

            let (winner_index, winner, loser_index, loser) = if keep_a {
                (a_index, a, b_index, b)
            } else {
                (b_index, b, a_index, a)
            };
            winner.absorb(&loser);
            slots[loser_index] = Slot::Redirect(winner_index);
            Ok(Some(winner))
        })?;

        let Some(winner) = merged else {
            return Ok(());
        };

        tracing::debug!(
            "Unified clocks into {}",
            winner.label(winner.state.lock().sync_mode())
        );

        // Sub-clocks inherited by a running clock must run too.
        if winner.params().is_some() {
            for sub_clock in self.sub_clocks() {
                if sub_clock.pending_sync().is_some() {
                    sub_clock.start(true)?;
                }
            }
        }
        Ok(())
    }
}

/// `Some(true)` keeps `a`, `Some(false)` keeps `b`, `None` is a conflict.
fn survivor_is_left(
    a: &ClockRecord,
    a_state: &ClockState,
    b: &ClockRecord,
    b_state: &ClockState,
) -> Option<bool> {
    match (a_state, b_state) {
        (ClockState::Stopped(left), ClockState::Stopped(right)) if left == right => {
            Some(a.has_id() || !b.has_id())
        }
        (ClockState::Stopped(left), other) if joins(*left, other) => Some(false),
        (other, ClockState::Stopped(right)) if joins(*right, other) => Some(true),
        _ => None,
    }
}

/// A stopped clock with `pending` sync may join `target`.
fn joins(pending: SyncMode, target: &ClockState) -> bool {
    pending == SyncMode::Automatic || pending == target.sync_mode()
}
