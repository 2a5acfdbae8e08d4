// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use super::SyncMode;
use crate::core::clocks::SharedTimeProvider;
use crate::core::collections::{Queue, WeakQueue};
use crate::core::config::ClockSettings;
use crate::core::error::StreamError;
use crate::core::traits::{SharedSource, StreamSource};

pub(crate) type TickCallback = Box<dyn FnOnce() + Send>;
pub(crate) type ErrorHandler = Arc<dyn Fn(&StreamError) + Send + Sync>;

/// Scheduling state of a running clock.
pub(crate) struct ActiveParams {
    pub sync: SyncMode,
    pub frame_duration: Duration,
    pub max_latency: Duration,
    pub log_delay: Duration,
    pub allow_streaming_errors: bool,
    pub time: SharedTimeProvider,

    pub outputs: Queue<SharedSource>,
    pub active_sources: WeakQueue<Mutex<dyn StreamSource>>,
    pub passive_sources: WeakQueue<Mutex<dyn StreamSource>>,
    pub on_tick: Queue<TickCallback>,
    pub after_tick: Queue<TickCallback>,
    pub ticks: AtomicU64,
    /// Moved forward when the clock gives up on catching up.
    pub t0: Mutex<Duration>,
    pub last_catchup_log: Mutex<Option<Duration>>,
}

impl ActiveParams {
    pub fn new(sync: SyncMode, settings: &ClockSettings, time: SharedTimeProvider) -> Self {
        let t0 = time.now();
        Self {
            sync,
            frame_duration: settings.frame_duration(),
            max_latency: settings.max_latency(),
            log_delay: settings.log_delay(),
            allow_streaming_errors: settings.allow_streaming_errors,
            time,
            outputs: Queue::new(),
            active_sources: WeakQueue::new(),
            passive_sources: WeakQueue::new(),
            on_tick: Queue::new(),
            after_tick: Queue::new(),
            ticks: AtomicU64::new(0),
            t0: Mutex::new(t0),
            last_catchup_log: Mutex::new(None),
        }
    }

    pub fn ticks(&self) -> u64 {
        self.ticks.load(Ordering::Acquire)
    }

    /// Logical time of the current tick: `t0 + frame_duration * ticks`.
    pub fn target_time(&self) -> Duration {
        *self.t0.lock() + elapsed(self.frame_duration, self.ticks())
    }

    /// Outputs followed by active sources: everything animated on a tick.
    pub fn animated_sources(&self) -> Vec<SharedSource> {
        let mut sources = self.outputs.snapshot();
        sources.extend(self.active_sources.snapshot());
        sources
    }

    /// Every activated source, animated or not.
    pub fn all_sources(&self) -> Vec<SharedSource> {
        let mut sources = self.animated_sources();
        sources.extend(self.passive_sources.snapshot());
        sources
    }

    pub fn is_activated(&self, source: &SharedSource) -> bool {
        self.outputs.any(|s| same_source(s, source))
            || self.active_sources.contains(source)
            || self.passive_sources.contains(source)
    }
}

/// `frame_duration * ticks`, in whole nanoseconds.
pub(crate) fn elapsed(frame_duration: Duration, ticks: u64) -> Duration {
    let nanos = frame_duration.as_nanos().saturating_mul(u128::from(ticks));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

pub(crate) fn same_source(a: &SharedSource, b: &SharedSource) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

pub(crate) enum ClockState {
    Stopped(SyncMode),
    Started(Arc<ActiveParams>),
    Stopping(Arc<ActiveParams>),
}

impl ClockState {
    /// Configured pacing policy, whatever the lifecycle stage.
    pub fn sync_mode(&self) -> SyncMode {
        match self {
            ClockState::Stopped(sync) => *sync,
            ClockState::Started(params) | ClockState::Stopping(params) => params.sync,
        }
    }

    /// Params of a clock that can still be ticked.
    pub fn params(&self) -> Option<&Arc<ActiveParams>> {
        match self {
            ClockState::Stopped(_) => None,
            ClockState::Started(params) | ClockState::Stopping(params) => Some(params),
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, ClockState::Stopped(_))
    }
}

impl std::fmt::Display for ClockState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClockState::Stopped(sync) => write!(f, "stopped({})", sync),
            ClockState::Started(params) => write!(f, "started({})", params.sync),
            ClockState::Stopping(params) => write!(f, "stopping({})", params.sync),
        }
    }
}

/// The mutable record behind one or more [`Clock`](super::Clock) handles.
pub(crate) struct ClockRecord {
    pub id: Mutex<Option<String>>,
    pub position: Mutex<Option<String>>,
    pub state: Mutex<ClockState>,
    pub pending_activations: Queue<SharedSource>,
    /// Arena indexes of child clocks.
    pub sub_clocks: Queue<usize>,
    pub on_error: Queue<ErrorHandler>,
    /// Arena index of the owning clock, if any.
    pub parent: Mutex<Option<usize>>,
    pub thread: Mutex<Option<JoinHandle<()>>>,
}

impl ClockRecord {
    pub fn new(id: Option<String>, sync: SyncMode, position: Option<String>) -> Self {
        Self {
            id: Mutex::new(id),
            position: Mutex::new(position),
            state: Mutex::new(ClockState::Stopped(sync)),
            pending_activations: Queue::new(),
            sub_clocks: Queue::new(),
            on_error: Queue::new(),
            parent: Mutex::new(None),
            thread: Mutex::new(None),
        }
    }

    pub fn params(&self) -> Option<Arc<ActiveParams>> {
        self.state.lock().params().cloned()
    }

    pub fn has_id(&self) -> bool {
        self.id.lock().is_some()
    }

    /// `id(sync)` without assigning an id to an unnamed clock.
    pub fn label(&self, sync: SyncMode) -> String {
        match &*self.id.lock() {
            Some(id) => format!("{}({})", id, sync),
            None => format!("<unnamed>({})", sync),
        }
    }

    pub fn has_pending_output(&self) -> bool {
        self.pending_activations
            .snapshot()
            .iter()
            .any(|source| source.lock().kind() == crate::core::traits::SourceKind::Output)
    }

    pub fn has_work(&self, params: &ActiveParams) -> bool {
        !self.pending_activations.is_empty()
            || !params.outputs.is_empty()
            || !params.active_sources.is_empty()
    }

    /// Move the queues of `loser` to the end of this record's queues and
    /// adopt whatever identity it has that this record lacks.
    pub fn absorb(&self, loser: &ClockRecord) {
        self.pending_activations.append_from(&loser.pending_activations);
        self.sub_clocks.append_from(&loser.sub_clocks);
        self.on_error.append_from(&loser.on_error);

        adopt(&self.id, &loser.id);
        adopt(&self.position, &loser.position);
        adopt(&self.parent, &loser.parent);
    }
}

fn adopt<T>(survivor: &Mutex<Option<T>>, loser: &Mutex<Option<T>>) {
    let mut survivor = survivor.lock();
    if survivor.is_none() {
        *survivor = loser.lock().take();
    }
}
