// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Tick scheduler
//!
//! One tick, in order:
//!
//! 1. wake up and classify pending sources
//! 2. snapshot sub-clocks with their tick counters
//! 3. animate outputs and active sources
//! 4. run `on_tick` callbacks
//! 5. tick sub-clocks that nothing else advanced since step 2
//! 6. advance the tick counter
//! 7. run `after_tick` callbacks, then pace against real time
//!
//! Global shutdown is checked between steps; a tick interrupted that way
//! returns [`LoopControl::Break`] without running the remaining steps.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::Ordering;
use std::sync::Arc;

use super::state::{ActiveParams, ClockRecord};
use super::Clock;
use crate::core::error::{panic_message, Result, StreamError};
use crate::core::loop_utils::{bail_if_stopping, LoopControl};
use crate::core::traits::{SharedSource, SourceKind};

impl Clock {
    /// Run one tick.
    ///
    /// Meant for clocks without an owning thread: passive clocks and clocks
    /// of a [`ThreadPolicy::External`](super::ThreadPolicy::External)
    /// registry.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the clock is stopped or driven by its own thread;
    /// `SelfSyncConflict` if several of its sources claim to pace it.
    pub fn tick(&self) -> Result<()> {
        let record = self.record();
        let params = record.params().ok_or_else(|| {
            StreamError::InvalidState(format!(
                "Cannot tick clock {}: clock is stopped",
                self.descr()
            ))
        })?;
        let driven_elsewhere = record.thread.lock().as_ref().is_some_and(|handle| {
            !handle.is_finished() && handle.thread().id() != std::thread::current().id()
        });
        if driven_elsewhere {
            return Err(StreamError::InvalidState(format!(
                "Cannot tick clock {}: clock is driven by its own thread",
                self.descr()
            )));
        }
        self.run_tick(&record, &params)?;
        Ok(())
    }

    pub(crate) fn run_tick(
        &self,
        record: &ClockRecord,
        params: &Arc<ActiveParams>,
    ) -> Result<LoopControl> {
        let signals = Arc::clone(self.registry().signals());
        let id = self.id();

        bail_if_stopping!(signals);
        self.activate_pending(&id, record, params);

        bail_if_stopping!(signals);
        let sub_clocks = self.snapshot_sub_clocks(&id);

        bail_if_stopping!(signals);
        self.animate(&id, record, params);

        bail_if_stopping!(signals);
        for callback in params.on_tick.drain() {
            callback();
        }

        bail_if_stopping!(signals);
        if self.tick_sub_clocks(&id, sub_clocks)?.is_break() {
            return Ok(LoopControl::Break);
        }

        let ticks = params.ticks.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::trace!("[{}] Tick {} done", id, ticks);

        bail_if_stopping!(signals);
        for callback in params.after_tick.drain() {
            callback();
        }
        self.pace(&id, params)?;

        Ok(LoopControl::Continue)
    }

    pub(crate) fn activate_pending(&self, id: &str, record: &ClockRecord, params: &ActiveParams) {
        record.pending_activations.flush(|source| {
            if params.is_activated(&source) {
                tracing::trace!("[{}] Source already activated, skipping", id);
                return;
            }

            let (source_id, kind) = {
                let mut guard = source.lock();
                guard.wake_up();
                (guard.id().to_string(), guard.kind())
            };

            match kind {
                SourceKind::Output => params.outputs.push(source),
                SourceKind::Active => params.active_sources.push(&source),
                SourceKind::Passive => params.passive_sources.push(&source),
            }
            tracing::debug!("[{}] Activated {} source {}", id, kind, source_id);
        });
    }

    fn snapshot_sub_clocks(&self, id: &str) -> Vec<(Clock, u64)> {
        self.sub_clocks()
            .into_iter()
            .filter_map(|sub_clock| match sub_clock.started_ticks() {
                Some(ticks) => Some((sub_clock, ticks)),
                None => {
                    tracing::trace!("[{}] Sub-clock {} is stopped", id, sub_clock.id());
                    None
                }
            })
            .collect()
    }

    fn animate(&self, id: &str, record: &ClockRecord, params: &ActiveParams) {
        for source in params.animated_sources() {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut guard = source.lock();
                guard.output().map_err(|e| (guard.id().to_string(), e.to_string()))
            }));

            let (source_id, message) = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(failure)) => failure,
                Err(payload) => (source.lock().id().to_string(), panic_message(&*payload)),
            };
            let error = StreamError::SourceFailed {
                source_id: source_id.clone(),
                message,
            };
            self.handle_source_error(id, record, params, &source, &source_id, &error);
        }
    }

    fn handle_source_error(
        &self,
        id: &str,
        record: &ClockRecord,
        params: &ActiveParams,
        source: &SharedSource,
        source_id: &str,
        error: &StreamError,
    ) {
        let handlers = record.on_error.snapshot();
        if !handlers.is_empty() {
            tracing::debug!(
                "[{}] Source {} failed, passing to {} error handler(s)",
                id,
                source_id,
                handlers.len()
            );
            for handler in handlers {
                handler(error);
            }
            return;
        }

        tracing::error!("[{}] {}", id, error);

        if params.allow_streaming_errors {
            tracing::warn!("[{}] Detaching source {}", id, source_id);
            self.detach(source);
        } else {
            self.registry().signals().request_shutdown(1);
        }
    }

    fn tick_sub_clocks(&self, id: &str, sub_clocks: Vec<(Clock, u64)>) -> Result<LoopControl> {
        for (sub_clock, ticks_before) in sub_clocks {
            let sub_record = sub_clock.record();
            let Some(sub_params) = sub_record.params() else {
                continue;
            };
            if sub_params.ticks() != ticks_before {
                tracing::trace!(
                    "[{}] Sub-clock {} already ticked this round",
                    id,
                    sub_clock.id()
                );
                continue;
            }
            if sub_clock.run_tick(&sub_record, &sub_params)?.is_break() {
                return Ok(LoopControl::Break);
            }
        }
        Ok(LoopControl::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::clocks::ManualTimeProvider;
    use crate::core::config::ClockSettings;
    use crate::core::scheduling::{ClockOptions, ClockRegistry, SyncMode, ThreadPolicy};
    use crate::core::signals::SchedulerSignals;
    use crate::core::traits::{shared_source, StreamSource};
    use parking_lot::Mutex;

    struct Recorder {
        id: &'static str,
        kind: SourceKind,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl StreamSource for Recorder {
        fn id(&self) -> &str {
            self.id
        }
        fn kind(&self) -> SourceKind {
            self.kind
        }
        fn wake_up(&mut self) {
            self.log.lock().push(format!("wake {}", self.id));
        }
        fn output(&mut self) -> Result<()> {
            self.log.lock().push(format!("output {}", self.id));
            Ok(())
        }
    }

    fn unsynced_registry() -> Arc<ClockRegistry> {
        ClockRegistry::with_options(
            ClockSettings::default(),
            SchedulerSignals::new(),
            Arc::new(ManualTimeProvider::new()),
            ThreadPolicy::External,
        )
    }

    #[test]
    fn test_tick_order_wake_then_output_then_callbacks() {
        let registry = unsynced_registry();
        let clock = registry.create_clock(ClockOptions::new(SyncMode::Unsynced));
        let log = Arc::new(Mutex::new(Vec::new()));

        let output = shared_source(Recorder {
            id: "out",
            kind: SourceKind::Output,
            log: Arc::clone(&log),
        });
        clock.attach(&output);
        clock.start(false).unwrap();

        let on_tick_log = Arc::clone(&log);
        clock
            .on_tick(move || on_tick_log.lock().push("on_tick".to_string()))
            .unwrap();
        let after_tick_log = Arc::clone(&log);
        let after_clock = clock.clone();
        clock
            .after_tick(move || {
                after_tick_log
                    .lock()
                    .push(format!("after_tick {}", after_clock.ticks()));
            })
            .unwrap();

        clock.tick().unwrap();

        assert_eq!(
            *log.lock(),
            vec!["wake out", "output out", "on_tick", "after_tick 1"]
        );
    }

    #[test]
    fn test_on_tick_is_one_shot() {
        let registry = unsynced_registry();
        let clock = registry.create_clock(ClockOptions::new(SyncMode::Unsynced));
        clock.start(true).unwrap();

        let count = Arc::new(Mutex::new(0));
        let counter = Arc::clone(&count);
        clock.on_tick(move || *counter.lock() += 1).unwrap();

        clock.tick().unwrap();
        clock.tick().unwrap();
        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_callback_registered_during_tick_runs_next_tick() {
        let registry = unsynced_registry();
        let clock = registry.create_clock(ClockOptions::new(SyncMode::Unsynced));
        clock.start(true).unwrap();

        let seen = Arc::new(Mutex::new(Vec::new()));
        let outer_seen = Arc::clone(&seen);
        let outer_clock = clock.clone();
        clock
            .on_tick(move || {
                outer_seen.lock().push(outer_clock.ticks());
                let inner_seen = Arc::clone(&outer_seen);
                let inner_clock = outer_clock.clone();
                outer_clock
                    .on_tick(move || inner_seen.lock().push(inner_clock.ticks()))
                    .unwrap();
            })
            .unwrap();

        clock.tick().unwrap();
        assert_eq!(*seen.lock(), vec![0]);
        clock.tick().unwrap();
        assert_eq!(*seen.lock(), vec![0, 1]);
    }

    #[test]
    fn test_duplicate_attach_is_activated_once() {
        let registry = unsynced_registry();
        let clock = registry.create_clock(ClockOptions::new(SyncMode::Unsynced));
        let log = Arc::new(Mutex::new(Vec::new()));
        let source = shared_source(Recorder {
            id: "twice",
            kind: SourceKind::Output,
            log: Arc::clone(&log),
        });
        clock.attach(&source);
        clock.attach(&source);
        clock.start(false).unwrap();

        clock.tick().unwrap();

        assert_eq!(clock.outputs().len(), 1);
        assert_eq!(*log.lock(), vec!["wake twice", "output twice"]);
    }

    #[test]
    fn test_tick_aborts_on_global_shutdown() {
        let registry = unsynced_registry();
        let clock = registry.create_clock(ClockOptions::new(SyncMode::Unsynced));
        clock.start(true).unwrap();

        registry.signals().request_shutdown(0);
        clock.tick().unwrap();

        assert_eq!(clock.ticks(), 0);
    }
}
