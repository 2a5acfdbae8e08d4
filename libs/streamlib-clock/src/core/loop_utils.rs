// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Loop utilities with shutdown signal support
//!
//! Clock threads and the tick algorithm poll [`SchedulerSignals`] between
//! steps instead of unwinding. Each step reports [`LoopControl`]; a `Break`
//! ends the tick (or the driver loop) cleanly at the next boundary.
//!
//! # Example
//! ```no_run
//! use streamlib_clock::{shutdown_aware_loop, LoopControl, SchedulerSignals};
//!
//! let signals = SchedulerSignals::new();
//! let mut frames = 0;
//! shutdown_aware_loop(&signals, || {
//!     frames += 1;
//!     if frames == 100 {
//!         return Ok::<_, ()>(LoopControl::Break);
//!     }
//!     Ok(LoopControl::Continue)
//! })
//! .unwrap();
//! ```

use crate::core::signals::SchedulerSignals;

/// Control flow for shutdown-aware loops
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopControl {
    /// Continue loop iteration
    Continue,
    /// Break loop and exit gracefully
    Break,
}

impl LoopControl {
    pub fn is_break(self) -> bool {
        self == LoopControl::Break
    }
}

/// Return `Ok(LoopControl::Break)` from the enclosing function if global
/// shutdown was requested.
macro_rules! bail_if_stopping {
    ($signals:expr) => {
        if $signals.is_stopping() {
            return Ok($crate::core::loop_utils::LoopControl::Break);
        }
    };
}
pub(crate) use bail_if_stopping;

/// Run `f` until it returns `Break`, fails, or shutdown is requested.
///
/// # Errors
/// Returns the error from the user closure if it fails.
pub fn shutdown_aware_loop<F, E>(signals: &SchedulerSignals, mut f: F) -> std::result::Result<(), E>
where
    F: FnMut() -> std::result::Result<LoopControl, E>,
{
    loop {
        if signals.is_stopping() {
            tracing::debug!("Shutdown requested, exiting loop");
            return Ok(());
        }

        match f()? {
            LoopControl::Continue => continue,
            LoopControl::Break => {
                tracing::trace!("Loop exited via LoopControl::Break");
                return Ok(());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_loop_control_break() {
        let signals = SchedulerSignals::new();
        let mut count = 0;

        let result = shutdown_aware_loop(&signals, || {
            count += 1;
            if count >= 5 {
                return Ok(LoopControl::Break);
            }
            Ok::<LoopControl, ()>(LoopControl::Continue)
        });

        assert!(result.is_ok());
        assert_eq!(count, 5);
    }

    #[test]
    fn test_shutdown_exits_loop() {
        let signals = SchedulerSignals::new();
        let counter = Arc::new(AtomicUsize::new(0));

        let thread_signals = Arc::clone(&signals);
        let thread_counter = Arc::clone(&counter);
        let handle = std::thread::spawn(move || {
            shutdown_aware_loop(&thread_signals, || {
                thread_counter.fetch_add(1, Ordering::Relaxed);
                std::thread::sleep(std::time::Duration::from_millis(5));
                Ok::<LoopControl, ()>(LoopControl::Continue)
            })
        });

        std::thread::sleep(std::time::Duration::from_millis(30));
        signals.request_shutdown(0);

        let result = handle.join();
        assert!(result.is_ok());
        assert!(result.unwrap().is_ok());
        assert!(counter.load(Ordering::Relaxed) > 0);
    }

    #[test]
    fn test_error_propagation() {
        let signals = SchedulerSignals::new();
        let result = shutdown_aware_loop(&signals, || Err::<LoopControl, &str>("test error"));
        assert_eq!(result.unwrap_err(), "test error");
    }

    #[test]
    fn test_bail_if_stopping() {
        fn step(signals: &SchedulerSignals) -> Result<LoopControl, ()> {
            bail_if_stopping!(signals);
            Ok(LoopControl::Continue)
        }

        let signals = SchedulerSignals::new();
        assert_eq!(step(&signals), Ok(LoopControl::Continue));
        signals.request_shutdown(0);
        assert_eq!(step(&signals), Ok(LoopControl::Break));
    }
}
