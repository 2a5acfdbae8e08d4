// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Test-only sources and registry helpers shared by the integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use streamlib_clock::{
    ClockRegistry, ClockSettings, ManualTimeProvider, Result, SchedulerSignals, SelfSync,
    SelfSyncToken, SharedSource, SourceKind, StreamError, StreamSource, ThreadPolicy,
};

/// Per-hook call counters, readable while the clock owns the source.
#[derive(Default)]
pub struct Counters {
    pub wake_ups: AtomicU64,
    pub outputs: AtomicU64,
    pub resets: AtomicU64,
    pub sleeps: AtomicU64,
}

impl Counters {
    pub fn wake_ups(&self) -> u64 {
        self.wake_ups.load(Ordering::SeqCst)
    }

    pub fn outputs(&self) -> u64 {
        self.outputs.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> u64 {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn sleeps(&self) -> u64 {
        self.sleeps.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Never,
    Error,
    Panic,
}

pub struct Device(pub &'static str);

impl SelfSyncToken for Device {
    fn description(&self) -> String {
        format!("device:{}", self.0)
    }
}

pub struct TestSource {
    id: String,
    kind: SourceKind,
    self_sync: SelfSync,
    failure: Failure,
    counters: Arc<Counters>,
}

impl TestSource {
    pub fn new(id: &str, kind: SourceKind) -> Self {
        Self {
            id: id.to_string(),
            kind,
            self_sync: SelfSync::none(),
            failure: Failure::Never,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn output(id: &str) -> Self {
        Self::new(id, SourceKind::Output)
    }

    pub fn active(id: &str) -> Self {
        Self::new(id, SourceKind::Active)
    }

    pub fn passive(id: &str) -> Self {
        Self::new(id, SourceKind::Passive)
    }

    pub fn self_synced(mut self, device: &'static str) -> Self {
        self.self_sync = SelfSync::active(Arc::new(Device(device)));
        self
    }

    pub fn failing(mut self, failure: Failure) -> Self {
        self.failure = failure;
        self
    }

    /// Share the source, keeping a handle on its counters.
    pub fn build(self) -> (SharedSource, Arc<Counters>) {
        let counters = Arc::clone(&self.counters);
        (Arc::new(Mutex::new(self)), counters)
    }
}

impl StreamSource for TestSource {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        self.kind
    }

    fn self_sync(&self) -> SelfSync {
        self.self_sync.clone()
    }

    fn wake_up(&mut self) {
        self.counters.wake_ups.fetch_add(1, Ordering::SeqCst);
    }

    fn force_sleep(&mut self) {
        self.counters.sleeps.fetch_add(1, Ordering::SeqCst);
    }

    fn output(&mut self) -> Result<()> {
        self.counters.outputs.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Failure::Never => Ok(()),
            Failure::Error => Err(StreamError::Runtime(format!("{} lost its device", self.id))),
            Failure::Panic => panic!("{} exploded", self.id),
        }
    }

    fn reset(&mut self) {
        self.counters.resets.fetch_add(1, Ordering::SeqCst);
    }
}

/// Registry driven by the test itself, on virtual time.
pub fn manual_registry(settings: ClockSettings) -> (Arc<ClockRegistry>, ManualTimeProvider) {
    let time = ManualTimeProvider::new();
    let registry = ClockRegistry::with_options(
        settings,
        SchedulerSignals::new(),
        Arc::new(time.clone()),
        ThreadPolicy::External,
    );
    (registry, time)
}

pub fn lenient_settings() -> ClockSettings {
    ClockSettings {
        allow_streaming_errors: true,
        ..ClockSettings::default()
    }
}

/// Poll `condition` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(1));
    }
    condition()
}
