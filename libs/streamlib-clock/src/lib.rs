// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Real-time clock and tick scheduler for streamlib source graphs.
//!
//! A [`Clock`] owns a set of sources and asks each of them for one frame per
//! tick, pacing ticks against real time. Clocks can be merged while a graph
//! is being built ([`Clock::unify`]), nested ([`Clock::create_sub_clock`]) and
//! driven either by their own thread or by the host ([`ThreadPolicy`]).
//!
//! ```no_run
//! use std::sync::Arc;
//! use streamlib_clock::{
//!     shared_source, ClockOptions, ClockRegistry, ClockSettings, Result, SchedulerSignals,
//!     SourceKind, StreamSource, SyncMode,
//! };
//!
//! struct Speaker;
//!
//! impl StreamSource for Speaker {
//!     fn id(&self) -> &str { "speaker" }
//!     fn kind(&self) -> SourceKind { SourceKind::Output }
//!     fn output(&mut self) -> Result<()> { Ok(()) }
//! }
//!
//! let signals = SchedulerSignals::new();
//! let registry = ClockRegistry::new(ClockSettings::default(), Arc::clone(&signals));
//! let clock = registry.create_clock(ClockOptions::new(SyncMode::Cpu).with_id("main"));
//! clock.attach(&shared_source(Speaker));
//! registry.start_pending()?;
//! # Ok::<(), streamlib_clock::StreamError>(())
//! ```

#![allow(clippy::type_complexity)] // Callback queue types are clear in context

pub mod core;

pub use core::{
    from_secs, install_signal_handlers, shared_source, shutdown_aware_loop, to_secs, Clock,
    ClockOptions, ClockRegistry, ClockSettings, ClockSync, CooperativeTimeProvider,
    LoopControl, ManualTimeProvider, MonotonicTimeProvider, Queue, Result, SchedulerSignals,
    SelfSync, SelfSyncMode, SelfSyncToken, SharedSource, SharedTimeProvider, SourceKind,
    StreamError, StreamSource, SyncMode, ThreadPolicy, TimeProvider, TimeProviderKind,
    WeakQueue,
};
