// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod clocks;
pub mod collections;
pub mod config;
pub mod error;
pub mod loop_utils;
pub mod scheduling;
pub mod signals;
pub mod traits;

pub use clocks::*;
pub use collections::*;
pub use config::ClockSettings;
pub use error::*;
pub use loop_utils::{shutdown_aware_loop, LoopControl};
pub use scheduling::*;
pub use signals::{install_signal_handlers, SchedulerSignals};
pub use traits::*;
