// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock scheduling: lifecycle, unification, ticking and pacing.

mod clock;
mod pacing;
mod registry;
mod state;
mod sync_mode;
mod thread_runner;
mod tick;
mod unify;

pub use clock::Clock;
pub use registry::{ClockOptions, ClockRegistry, ThreadPolicy};
pub use sync_mode::{ClockSync, SyncMode};
