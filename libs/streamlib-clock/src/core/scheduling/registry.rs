// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! ClockRegistry - arena of clock records
//!
//! Every [`Clock`] handle is an index into the registry's arena. A slot
//! either owns a record or redirects to another slot; unification turns the
//! losing clock's slot into a redirect. Lookups follow redirects to the root
//! and compress the path, so chains stay short and never loop: a slot is
//! only ever redirected onto a root.
//!
//! Clocks are freed once nothing can reach them: no [`Clock`] handle, no
//! parent or sub-clock link from a reachable clock, and not running. Freed
//! slots are reused by later clocks. Collection runs when clocks are created
//! or listed.
//!
//! The registry also carries what every clock shares: the scheduler signals,
//! the settings, the time provider and the thread policy.

use parking_lot::Mutex;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use super::state::ClockRecord;
use super::{Clock, SyncMode};
use crate::core::clocks::SharedTimeProvider;
use crate::core::config::ClockSettings;
use crate::core::error::Result;
use crate::core::signals::SchedulerSignals;

/// Whether started clocks get their own thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ThreadPolicy {
    /// One thread per non-passive clock.
    #[default]
    Spawn,
    /// No threads: the host calls [`Clock::tick`] itself (offline renders,
    /// embedding loops, tests). Stopping cleans up synchronously.
    External,
}

/// Parameters for [`ClockRegistry::create_clock`].
#[derive(Debug, Clone, Default)]
pub struct ClockOptions {
    pub id: Option<String>,
    pub sync: SyncMode,
    /// Where the clock was defined, for diagnostics.
    pub position: Option<String>,
}

impl ClockOptions {
    pub fn new(sync: SyncMode) -> Self {
        Self {
            sync,
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_position(mut self, position: impl Into<String>) -> Self {
        self.position = Some(position.into());
        self
    }
}

pub(crate) enum Slot {
    Root(Arc<ClockRecord>),
    Redirect(usize),
    /// Freed; reused by the next clock.
    Vacant,
}

/// Shared by every handle created for one arena index.
pub(crate) struct HandleToken;

#[derive(Default)]
struct Arena {
    slots: Vec<Slot>,
    /// Parallel to `slots`: alive while a handle to that index exists.
    handles: Vec<Weak<HandleToken>>,
    free: Vec<usize>,
}

impl Arena {
    fn insert(&mut self, record: ClockRecord) -> usize {
        let slot = Slot::Root(Arc::new(record));
        match self.free.pop() {
            Some(index) => {
                self.slots[index] = slot;
                self.handles[index] = Weak::new();
                index
            }
            None => {
                self.slots.push(slot);
                self.handles.push(Weak::new());
                self.slots.len() - 1
            }
        }
    }

    fn handle(&mut self, index: usize) -> Arc<HandleToken> {
        if let Some(token) = self.handles[index].upgrade() {
            return token;
        }
        let token = Arc::new(HandleToken);
        self.handles[index] = Arc::downgrade(&token);
        token
    }

    fn has_handles(&self, index: usize) -> bool {
        self.handles[index].strong_count() > 0
    }

    /// Vacate every unreachable slot and return the freed records, to be
    /// dropped once the arena is unlocked.
    fn collect(&mut self) -> Vec<Arc<ClockRecord>> {
        let len = self.slots.len();
        for index in 0..len {
            if matches!(self.slots[index], Slot::Redirect(_)) {
                find(&mut self.slots, index);
            }
        }

        let mut stack = Vec::new();
        for index in 0..len {
            let seed = match &self.slots[index] {
                Slot::Vacant => false,
                Slot::Redirect(_) => self.has_handles(index),
                Slot::Root(record) => {
                    self.has_handles(index) || !record.state.lock().is_stopped()
                }
            };
            if seed {
                stack.push(find(&mut self.slots, index).0);
            }
        }

        let mut live = vec![false; len];
        while let Some(root) = stack.pop() {
            if std::mem::replace(&mut live[root], true) {
                continue;
            }
            let Slot::Root(record) = &self.slots[root] else {
                continue;
            };
            let record = Arc::clone(record);

            // Links may name redirects; point them at roots so the
            // redirects can go.
            let slots = &mut self.slots;
            record
                .sub_clocks
                .update(|index| *index = find(slots, *index).0);
            let mut parent = record.parent.lock();
            if let Some(index) = *parent {
                *parent = Some(find(slots, index).0);
            }

            stack.extend(record.sub_clocks.snapshot());
            stack.extend(*parent);
        }

        let mut freed = Vec::new();
        for index in 0..len {
            let keep = match &self.slots[index] {
                Slot::Vacant => continue,
                Slot::Root(_) => live[index],
                Slot::Redirect(_) => self.has_handles(index),
            };
            if keep {
                continue;
            }
            if let Slot::Root(record) = std::mem::replace(&mut self.slots[index], Slot::Vacant) {
                freed.push(record);
            }
            self.handles[index] = Weak::new();
            self.free.push(index);
        }
        freed
    }
}

pub struct ClockRegistry {
    arena: Mutex<Arena>,
    signals: Arc<SchedulerSignals>,
    settings: ClockSettings,
    time: SharedTimeProvider,
    thread_policy: ThreadPolicy,
    next_id: AtomicU64,
}

impl ClockRegistry {
    /// Registry using the settings' time provider and one thread per clock.
    pub fn new(settings: ClockSettings, signals: Arc<SchedulerSignals>) -> Arc<Self> {
        let time = settings.time_provider.build();
        Self::with_options(settings, signals, time, ThreadPolicy::Spawn)
    }

    pub fn with_options(
        settings: ClockSettings,
        signals: Arc<SchedulerSignals>,
        time: SharedTimeProvider,
        thread_policy: ThreadPolicy,
    ) -> Arc<Self> {
        tracing::debug!(
            "Clock registry created (time: {}, threads: {:?})",
            time.description(),
            thread_policy
        );
        Arc::new(Self {
            arena: Mutex::new(Arena::default()),
            signals,
            settings,
            time,
            thread_policy,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn signals(&self) -> &Arc<SchedulerSignals> {
        &self.signals
    }

    pub fn settings(&self) -> &ClockSettings {
        &self.settings
    }

    pub fn time_provider(&self) -> &SharedTimeProvider {
        &self.time
    }

    pub fn thread_policy(&self) -> ThreadPolicy {
        self.thread_policy
    }

    pub fn create_clock(self: &Arc<Self>, options: ClockOptions) -> Clock {
        let record = ClockRecord::new(options.id, options.sync, options.position);
        let (index, handle, freed) = {
            let mut arena = self.arena.lock();
            let freed = arena.collect();
            let index = arena.insert(record);
            (index, arena.handle(index), freed)
        };
        log_freed(&freed);
        tracing::trace!("Created clock #{} ({})", index, options.sync);
        Clock::with_handle(Arc::clone(self), index, handle)
    }

    /// One handle per distinct clock, in creation order.
    pub fn clocks(self: &Arc<Self>) -> Vec<Clock> {
        self.live_roots()
            .into_iter()
            .map(|(index, handle)| Clock::with_handle(Arc::clone(self), index, handle))
            .collect()
    }

    /// Mark the scheduler started and start every stopped clock that has an
    /// output waiting to be activated.
    pub fn start_pending(self: &Arc<Self>) -> Result<()> {
        self.signals.mark_started();
        for clock in self.clocks() {
            let record = clock.record();
            let stopped = record.state.lock().is_stopped();
            if stopped && record.has_pending_output() {
                clock.start(false)?;
            }
        }
        Ok(())
    }

    pub fn stop_all(self: &Arc<Self>) {
        for clock in self.clocks() {
            clock.stop();
        }
    }

    /// Wait for every clock thread to exit.
    pub fn join_all(self: &Arc<Self>) {
        for clock in self.clocks() {
            clock.join();
        }
    }

    /// Human-readable description of every clock and its sources.
    pub fn dump(self: &Arc<Self>) -> String {
        let mut out = String::new();
        for clock in self.clocks() {
            let _ = writeln!(out, "{}", clock.describe());
        }
        out
    }

    /// Assign the next generated id.
    pub(crate) fn generate_id(&self) -> String {
        format!("clock.{}", self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    pub(crate) fn resolve(&self, index: usize) -> (usize, Arc<ClockRecord>) {
        find(&mut self.arena.lock().slots, index)
    }

    /// Token keeping `index` alive for one more handle.
    pub(crate) fn acquire_handle(&self, index: usize) -> Arc<HandleToken> {
        self.arena.lock().handle(index)
    }

    /// Run `f` with exclusive access to the arena.
    pub(crate) fn with_slots<R>(&self, f: impl FnOnce(&mut Vec<Slot>) -> R) -> R {
        f(&mut self.arena.lock().slots)
    }

    /// Live roots after freeing unreachable clocks, each with a handle
    /// taken under the same lock so it cannot be freed in between.
    fn live_roots(&self) -> Vec<(usize, Arc<HandleToken>)> {
        let (roots, freed) = {
            let mut arena = self.arena.lock();
            let freed = arena.collect();
            let indexes: Vec<usize> = arena
                .slots
                .iter()
                .enumerate()
                .filter_map(|(index, slot)| matches!(slot, Slot::Root(_)).then_some(index))
                .collect();
            let roots = indexes
                .into_iter()
                .map(|index| (index, arena.handle(index)))
                .collect::<Vec<_>>();
            (roots, freed)
        };
        log_freed(&freed);
        roots
    }
}

fn log_freed(freed: &[Arc<ClockRecord>]) {
    if !freed.is_empty() {
        tracing::trace!("Freed {} unreachable clock(s)", freed.len());
    }
}

impl std::fmt::Debug for ClockRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClockRegistry")
            .field("clocks", &self.live_roots().len())
            .field("time", &self.time.description())
            .field("thread_policy", &self.thread_policy)
            .finish()
    }
}

/// Follow redirects from `index` to its root, compressing the path.
pub(crate) fn find(slots: &mut [Slot], index: usize) -> (usize, Arc<ClockRecord>) {
    let mut root = index;
    let record = loop {
        match &slots[root] {
            Slot::Root(record) => break Arc::clone(record),
            Slot::Redirect(next) => root = *next,
            Slot::Vacant => unreachable!("clock slot {} freed while still referenced", root),
        }
    };

    let mut current = index;
    while current != root {
        let next = match slots[current] {
            Slot::Redirect(next) => next,
            Slot::Root(_) | Slot::Vacant => break,
        };
        slots[current] = Slot::Redirect(root);
        current = next;
    }

    (root, record)
}
