// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Process-wide scheduler signals
//!
//! [`SchedulerSignals`] replaces ambient global flags: one instance is
//! created by the host, handed to a [`ClockRegistry`](crate::ClockRegistry)
//! and cloned into every clock thread at spawn time. Tests create their own
//! instance and never touch process state.
//!
//! Shutdown is one-way. The first [`SchedulerSignals::request_shutdown`]
//! records its exit code and wakes every subscriber; later calls are no-ops.

use crossbeam_channel::{Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;

#[derive(Default)]
pub struct SchedulerSignals {
    started: AtomicBool,
    global_stop: AtomicBool,
    exit_code: AtomicI32,
    subscribers: Mutex<Vec<Sender<i32>>>,
}

impl SchedulerSignals {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Mark the scheduler as started. Clocks created afterwards with an
    /// output are started on the next `start_pending`.
    pub fn mark_started(&self) {
        self.started.store(true, Ordering::Release);
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }

    pub fn is_stopping(&self) -> bool {
        self.global_stop.load(Ordering::Acquire)
    }

    /// Exit code recorded by the first shutdown request, 0 otherwise.
    pub fn exit_code(&self) -> i32 {
        self.exit_code.load(Ordering::Acquire)
    }

    /// Request process-wide shutdown. Idempotent: the first code wins.
    ///
    /// Returns `true` if this call initiated the shutdown.
    pub fn request_shutdown(&self, code: i32) -> bool {
        let mut subscribers = self.subscribers.lock();
        if self.global_stop.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.exit_code.store(code, Ordering::Release);
        tracing::info!("Shutdown requested (exit code {})", code);

        for subscriber in subscribers.drain(..) {
            let _ = subscriber.send(code);
        }
        true
    }

    /// Channel that receives the exit code once shutdown is requested.
    ///
    /// Subscribing after shutdown yields an already-filled channel.
    pub fn subscribe(&self) -> Receiver<i32> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut subscribers = self.subscribers.lock();
        if self.is_stopping() {
            let _ = tx.send(self.exit_code());
        } else {
            subscribers.push(tx);
        }
        rx
    }
}

impl std::fmt::Debug for SchedulerSignals {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchedulerSignals")
            .field("started", &self.is_started())
            .field("global_stop", &self.is_stopping())
            .field("exit_code", &self.exit_code())
            .finish()
    }
}

/// Route Ctrl+C and SIGTERM to `signals.request_shutdown(0)`.
///
/// Can only be installed once per process.
pub fn install_signal_handlers(signals: &Arc<SchedulerSignals>) -> crate::core::Result<()> {
    let signals = Arc::clone(signals);
    ctrlc::set_handler(move || {
        tracing::info!("Termination signal received, triggering graceful shutdown");
        signals.request_shutdown(0);
    })
    .map_err(|e| {
        crate::core::StreamError::Runtime(format!("Failed to install signal handlers: {}", e))
    })?;

    tracing::info!("Signal handlers installed (SIGINT, SIGTERM)");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_first_shutdown_code_wins() {
        let signals = SchedulerSignals::new();
        assert!(!signals.is_stopping());

        assert!(signals.request_shutdown(1));
        assert!(!signals.request_shutdown(0));

        assert!(signals.is_stopping());
        assert_eq!(signals.exit_code(), 1);
    }

    #[test]
    fn test_subscribers_are_notified() {
        let signals = SchedulerSignals::new();
        let rx = signals.subscribe();

        let remote = Arc::clone(&signals);
        let handle = std::thread::spawn(move || {
            remote.request_shutdown(3);
        });

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), 3);
        handle.join().unwrap();
    }

    #[test]
    fn test_late_subscriber_sees_shutdown() {
        let signals = SchedulerSignals::new();
        signals.request_shutdown(2);
        assert_eq!(signals.subscribe().try_recv().unwrap(), 2);
    }

    #[test]
    fn test_started_flag() {
        let signals = SchedulerSignals::new();
        assert!(!signals.is_started());
        signals.mark_started();
        assert!(signals.is_started());
    }
}
