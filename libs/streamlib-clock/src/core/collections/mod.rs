// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Ordered collections used for clock bookkeeping.

mod queue;
mod weak_queue;

pub use queue::Queue;
pub use weak_queue::WeakQueue;
