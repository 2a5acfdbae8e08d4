// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Clock - handle to a scheduling unit
//!
//! A [`Clock`] is a cheap, cloneable handle: a registry plus an arena index.
//! Every operation resolves the index to the current record first, so a
//! handle keeps working after its clock has been unified into another one.
//!
//! ## Lifecycle
//!
//! ```text
//! Stopped(sync) --start--> Started(params) --stop--> Stopping(params)
//!       ^                        |                          |
//!       |                        +--- passive / external ---+
//!       |                                  |
//!       +------------ cleanup: force_sleep, stop sub-clocks
//! ```
//!
//! Attached sources wait in the pending queue until the clock's next tick
//! wakes them up and classifies them.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use super::registry::{find, ClockOptions, ClockRegistry, HandleToken, ThreadPolicy};
use super::state::{same_source, ActiveParams, ClockRecord, ClockState};
use super::{thread_runner, ClockSync, SyncMode};
use crate::core::error::{Result, StreamError};
use crate::core::traits::SharedSource;

#[derive(Clone)]
pub struct Clock {
    registry: Arc<ClockRegistry>,
    index: usize,
    /// Keeps the clock from being freed while this handle exists.
    _handle: Arc<HandleToken>,
}

impl Clock {
    pub(crate) fn from_index(registry: Arc<ClockRegistry>, index: usize) -> Self {
        let handle = registry.acquire_handle(index);
        Self::with_handle(registry, index, handle)
    }

    pub(crate) fn with_handle(
        registry: Arc<ClockRegistry>,
        index: usize,
        handle: Arc<HandleToken>,
    ) -> Self {
        Self {
            registry,
            index,
            _handle: handle,
        }
    }

    /// Arena index this handle was created with, before redirects.
    pub(crate) fn index(&self) -> usize {
        self.index
    }

    pub(crate) fn record(&self) -> Arc<ClockRecord> {
        self.registry.resolve(self.index).1
    }

    pub(crate) fn root_index(&self) -> usize {
        self.registry.resolve(self.index).0
    }

    pub(crate) fn check_same_registry(&self, other: &Clock) -> Result<()> {
        if Arc::ptr_eq(&self.registry, &other.registry) {
            Ok(())
        } else {
            Err(StreamError::InvalidState(format!(
                "Clocks {} and {} belong to different registries",
                self.descr(),
                other.descr()
            )))
        }
    }

    pub fn registry(&self) -> &Arc<ClockRegistry> {
        &self.registry
    }

    // ========================================================================
    // Identity & introspection
    // ========================================================================

    /// Clock identifier. A generated one is assigned on first use.
    pub fn id(&self) -> String {
        let record = self.record();
        let mut id = record.id.lock();
        id.get_or_insert_with(|| self.registry.generate_id()).clone()
    }

    pub fn position(&self) -> Option<String> {
        self.record().position.lock().clone()
    }

    /// `id(sync)`, e.g. `main(cpu)`.
    pub fn descr(&self) -> String {
        format!("{}({})", self.id(), self.sync_mode())
    }

    pub fn sync(&self) -> ClockSync {
        let record = self.record();
        let state = record.state.lock();
        match &*state {
            ClockState::Stopped(_) => ClockSync::Stopped,
            ClockState::Stopping(_) => ClockSync::Stopping,
            ClockState::Started(params) => params.sync.into(),
        }
    }

    /// Pacing policy, whether or not the clock is running.
    pub fn sync_mode(&self) -> SyncMode {
        self.record().state.lock().sync_mode()
    }

    /// Policy the clock will start with, if it is stopped.
    pub fn pending_sync(&self) -> Option<SyncMode> {
        match &*self.record().state.lock() {
            ClockState::Stopped(sync) => Some(*sync),
            _ => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(&*self.record().state.lock(), ClockState::Started(_))
    }

    /// Completed ticks since start; 0 for a stopped clock.
    pub fn ticks(&self) -> u64 {
        self.record().params().map_or(0, |params| params.ticks())
    }

    /// Logical time of the clock, `t0 + frame_duration * ticks`.
    pub fn time(&self) -> Option<Duration> {
        self.record().params().map(|params| params.target_time())
    }

    /// Length of one tick for this clock once started.
    pub fn frame_duration(&self) -> Duration {
        match self.record().params() {
            Some(params) => params.frame_duration,
            None => self.registry.settings().frame_duration(),
        }
    }

    pub fn outputs(&self) -> Vec<SharedSource> {
        self.record()
            .params()
            .map(|params| params.outputs.snapshot())
            .unwrap_or_default()
    }

    pub fn active_sources(&self) -> Vec<SharedSource> {
        self.record()
            .params()
            .map(|params| params.active_sources.snapshot())
            .unwrap_or_default()
    }

    pub fn passive_sources(&self) -> Vec<SharedSource> {
        self.record()
            .params()
            .map(|params| params.passive_sources.snapshot())
            .unwrap_or_default()
    }

    pub fn pending_sources(&self) -> Vec<SharedSource> {
        self.record().pending_activations.snapshot()
    }

    /// Child clocks ticked by this one, without duplicates.
    pub fn sub_clocks(&self) -> Vec<Clock> {
        let (root, record) = self.registry.resolve(self.index);
        let mut seen = vec![root];
        let mut clocks = Vec::new();
        for index in record.sub_clocks.snapshot() {
            let clock = Clock::from_index(Arc::clone(&self.registry), index);
            let child_root = clock.root_index();
            if !seen.contains(&child_root) {
                seen.push(child_root);
                clocks.push(clock);
            }
        }
        clocks
    }

    pub fn parent(&self) -> Option<Clock> {
        let parent = *self.record().parent.lock();
        parent.map(|index| Clock::from_index(Arc::clone(&self.registry), index))
    }

    // ========================================================================
    // Sources
    // ========================================================================

    /// Queue `source` for activation on the clock's next tick.
    ///
    /// Safe to call from any thread, including from a source's own hooks.
    pub fn attach(&self, source: &SharedSource) {
        self.record().pending_activations.push(Arc::clone(source));
    }

    pub fn detach(&self, source: &SharedSource) {
        self.detach_where(|candidate| same_source(candidate, source));
    }

    /// Remove every source matching `predicate` from scheduling. Sources that
    /// were already activated are put to sleep.
    ///
    /// Must not be called from within a hook of a source being detached.
    pub fn detach_where<F>(&self, predicate: F)
    where
        F: Fn(&SharedSource) -> bool,
    {
        let record = self.record();
        let params = record.params();

        let activated = params
            .as_ref()
            .map(|params| params.all_sources())
            .unwrap_or_default();
        let doomed_pending: Vec<SharedSource> = record
            .pending_activations
            .snapshot()
            .into_iter()
            .filter(|source| predicate(source))
            .collect();
        let doomed_active: Vec<SharedSource> =
            activated.into_iter().filter(|source| predicate(source)).collect();

        let is_doomed = |source: &SharedSource| {
            doomed_pending
                .iter()
                .chain(doomed_active.iter())
                .any(|doomed| same_source(doomed, source))
        };

        record.pending_activations.retain(|source| !is_doomed(source));
        if let Some(params) = &params {
            params.outputs.retain(|source| !is_doomed(source));
            params.active_sources.retain(|source| !is_doomed(source));
            params.passive_sources.retain(|source| !is_doomed(source));
        }

        if doomed_pending.is_empty() && doomed_active.is_empty() {
            return;
        }

        let id = self.id();
        for source in &doomed_active {
            let mut guard = source.lock();
            tracing::debug!("[{}] Detaching source {}", id, guard.id());
            guard.force_sleep();
        }
        tracing::trace!(
            "[{}] Detached {} pending and {} active source(s)",
            id,
            doomed_pending.len(),
            doomed_active.len()
        );
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the clock if it has an output waiting, or unconditionally when
    /// `force` is set. Starting a started clock is a no-op.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the clock is still stopping; `Runtime` if its
    /// thread cannot be spawned.
    pub fn start(&self, force: bool) -> Result<()> {
        let record = self.record();
        if !force && !record.has_pending_output() {
            tracing::debug!("[{}] Not starting: no output attached", self.id());
            return Ok(());
        }

        let id = self.id();
        let params = {
            let mut state = record.state.lock();
            let sync = match &*state {
                ClockState::Stopped(sync) => *sync,
                ClockState::Started(_) => {
                    tracing::trace!("[{}] Already started", id);
                    return Ok(());
                }
                ClockState::Stopping(_) => {
                    return Err(StreamError::InvalidState(format!(
                        "Cannot start clock {}: clock is still stopping",
                        id
                    )));
                }
            };
            let params = Arc::new(ActiveParams::new(
                sync,
                self.registry.settings(),
                Arc::clone(self.registry.time_provider()),
            ));
            *state = ClockState::Started(Arc::clone(&params));
            params
        };

        tracing::info!(
            "[{}] Starting clock (sync: {}, time: {})",
            id,
            params.sync,
            params.time.description()
        );
        self.activate_pending(&id, &record, &params);

        if params.sync.owns_thread() && self.registry.thread_policy() == ThreadPolicy::Spawn {
            match thread_runner::spawn_clock_thread(self.clone()) {
                Ok(handle) => *record.thread.lock() = Some(handle),
                Err(e) => {
                    *record.state.lock() = ClockState::Stopped(params.sync);
                    return Err(e);
                }
            }
        }

        for sub_clock in self.sub_clocks() {
            sub_clock.start(true)?;
        }
        Ok(())
    }

    /// Request the clock to stop.
    ///
    /// Clocks without an owning thread (passive, or under
    /// [`ThreadPolicy::External`]) are cleaned up and `Stopped` when this
    /// returns. Others move to `Stopping` and their thread finishes the job.
    pub fn stop(&self) {
        let record = self.record();
        let synchronous = {
            let mut state = record.state.lock();
            let params = match &*state {
                ClockState::Started(params) => Arc::clone(params),
                ClockState::Stopping(_) | ClockState::Stopped(_) => return,
            };
            let synchronous = !params.sync.owns_thread()
                || self.registry.thread_policy() == ThreadPolicy::External;
            if !synchronous {
                *state = ClockState::Stopping(params);
            }
            synchronous
        };

        tracing::info!("[{}] Stopping clock", self.id());
        if synchronous {
            self.finish();
        }
    }

    /// Release every source and stop sub-clocks, then move to `Stopped`.
    pub(crate) fn finish(&self) {
        let record = self.record();
        let params = {
            let mut state = record.state.lock();
            let params = match &*state {
                ClockState::Stopped(_) => return,
                ClockState::Started(params) | ClockState::Stopping(params) => Arc::clone(params),
            };
            *state = ClockState::Stopping(Arc::clone(&params));
            params
        };

        let id = self.id();
        for source in params.all_sources() {
            source.lock().force_sleep();
        }
        for sub_clock in self.sub_clocks() {
            sub_clock.stop();
        }

        *record.state.lock() = ClockState::Stopped(params.sync);
        tracing::info!("[{}] Clock stopped after {} tick(s)", id, params.ticks());
    }

    /// Wait for the clock's thread, if it has one, to exit.
    pub fn join(&self) {
        let handle = self.record().thread.lock().take();
        let Some(handle) = handle else {
            return;
        };
        if handle.thread().id() == std::thread::current().id() {
            return;
        }
        if handle.join().is_err() {
            tracing::error!("[{}] Clock thread panicked", self.id());
        }
    }

    // ========================================================================
    // Callbacks
    // ========================================================================

    /// Run `callback` once, during the next tick, after sources produced.
    pub fn on_tick<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.running_params("register an on_tick callback")?
            .on_tick
            .push(Box::new(callback));
        Ok(())
    }

    /// Run `callback` once, at the end of the next tick, before pacing.
    pub fn after_tick<F>(&self, callback: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.running_params("register an after_tick callback")?
            .after_tick
            .push(Box::new(callback));
        Ok(())
    }

    /// Handle source failures instead of the default policy.
    pub fn on_error<F>(&self, handler: F)
    where
        F: Fn(&StreamError) + Send + Sync + 'static,
    {
        self.record().on_error.push(Arc::new(handler));
    }

    fn running_params(&self, action: &str) -> Result<Arc<ActiveParams>> {
        self.record().params().ok_or_else(|| {
            StreamError::InvalidState(format!(
                "Cannot {} on clock {}: clock is stopped",
                action,
                self.descr()
            ))
        })
    }

    // ========================================================================
    // Sub-clocks
    // ========================================================================

    /// Create a passive clock named `<id>.<name>` ticked by this one.
    pub fn create_sub_clock(&self, name: &str) -> Result<Clock> {
        let child = self.registry.create_clock(
            ClockOptions::new(SyncMode::Passive).with_id(format!("{}.{}", self.id(), name)),
        );
        self.add_sub_clock(&child)?;
        Ok(child)
    }

    /// Make `child` tick whenever this clock ticks.
    ///
    /// # Errors
    ///
    /// `InvalidState` if `child` is not passive, already has a parent, is
    /// this clock, or is one of its ancestors.
    pub fn add_sub_clock(&self, child: &Clock) -> Result<()> {
        self.check_same_registry(child)?;

        let parent_record = self.registry.with_slots(|slots| {
            let (parent_root, parent_record) = find(slots, self.index);
            let (child_root, child_record) = find(slots, child.index);
            let parent_descr = parent_record.label(parent_record.state.lock().sync_mode());
            let child_descr = child_record.label(child_record.state.lock().sync_mode());

            if parent_root == child_root {
                return Err(StreamError::InvalidState(format!(
                    "Clock {} cannot be its own sub-clock",
                    parent_descr
                )));
            }
            if child_record.state.lock().sync_mode() != SyncMode::Passive {
                return Err(StreamError::InvalidState(format!(
                    "Clock {} must be passive to be ticked by {}",
                    child_descr, parent_descr
                )));
            }
            if child_record.parent.lock().is_some() {
                return Err(StreamError::InvalidState(format!(
                    "Clock {} already has a parent clock",
                    child_descr
                )));
            }

            let mut ancestor = *parent_record.parent.lock();
            while let Some(index) = ancestor {
                let (root, record) = find(slots, index);
                if root == child_root {
                    return Err(StreamError::InvalidState(format!(
                        "Clock {} is an ancestor of {}",
                        child_descr, parent_descr
                    )));
                }
                ancestor = *record.parent.lock();
            }

            *child_record.parent.lock() = Some(parent_root);
            parent_record.sub_clocks.push(child_root);
            tracing::debug!("Added sub-clock {} to {}", child_descr, parent_descr);
            Ok(parent_record)
        })?;

        if parent_record.params().is_some() && child.pending_sync().is_some() {
            child.start(true)?;
        }
        Ok(())
    }

    /// Multi-line description used by [`ClockRegistry::dump`].
    pub(crate) fn describe(&self) -> String {
        let mut out = format!("{} ticks={}", self.descr(), self.ticks());
        let groups = [
            ("output", self.outputs()),
            ("active", self.active_sources()),
            ("passive", self.passive_sources()),
            ("pending", self.pending_sources()),
        ];
        for (label, sources) in groups {
            for source in sources {
                let guard = source.lock();
                let readiness = if guard.is_ready() { "ready" } else { "not ready" };
                let activity = if guard.is_active() { "" } else { ", inactive" };
                let _ = write!(
                    out,
                    "\n  {} {} ({}{})",
                    label,
                    guard.id(),
                    readiness,
                    activity
                );
            }
        }
        for sub_clock in self.sub_clocks() {
            let _ = write!(out, "\n  sub-clock {}", sub_clock.descr());
        }
        out
    }

    /// Ticks elapsed on a started clock, `None` if stopped.
    pub(crate) fn started_ticks(&self) -> Option<u64> {
        self.record().params().map(|params| params.ticks())
    }
}

impl PartialEq for Clock {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.registry, &other.registry) && self.root_index() == other.root_index()
    }
}

impl Eq for Clock {}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("index", &self.index)
            .field("descr", &self.descr())
            .finish()
    }
}
