// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod cooperative_time;
mod manual_time;
mod monotonic_time;
mod time_provider;

pub use cooperative_time::CooperativeTimeProvider;
pub use manual_time::ManualTimeProvider;
pub use monotonic_time::MonotonicTimeProvider;
pub use time_provider::{from_secs, to_secs, SharedTimeProvider, TimeProvider, TimeProviderKind};
