// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Demo sources used by the `run` and `dump` commands.

use streamlib_clock::{Result, SourceKind, StreamError, StreamSource};

/// Output producing one (silent) frame per tick.
pub struct Tone {
    id: String,
    frames: u64,
    /// Fail on this frame, to exercise the error policy.
    fail_at: Option<u64>,
}

impl Tone {
    pub fn new(id: impl Into<String>, fail_at: Option<u64>) -> Self {
        Self {
            id: id.into(),
            frames: 0,
            fail_at,
        }
    }
}

impl StreamSource for Tone {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Output
    }

    fn wake_up(&mut self) {
        tracing::debug!("[{}] Waking up", self.id);
    }

    fn force_sleep(&mut self) {
        tracing::debug!("[{}] Going to sleep after {} frame(s)", self.id, self.frames);
    }

    fn output(&mut self) -> Result<()> {
        self.frames += 1;
        if self.fail_at == Some(self.frames) {
            return Err(StreamError::Runtime(format!(
                "simulated failure on frame {}",
                self.frames
            )));
        }
        tracing::trace!("[{}] Frame {}", self.id, self.frames);
        Ok(())
    }

    fn reset(&mut self) {
        tracing::info!("[{}] Reset at frame {}", self.id, self.frames);
    }
}

/// Output on the sub-clock, logging a level reading every `every` frames.
pub struct Meter {
    id: String,
    frames: u64,
    every: u64,
}

impl Meter {
    pub fn new(id: impl Into<String>, every: u64) -> Self {
        Self {
            id: id.into(),
            frames: 0,
            every: every.max(1),
        }
    }
}

impl StreamSource for Meter {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> SourceKind {
        SourceKind::Output
    }

    fn output(&mut self) -> Result<()> {
        self.frames += 1;
        if self.frames % self.every == 0 {
            tracing::info!("[{}] {} frame(s) metered", self.id, self.frames);
        }
        Ok(())
    }
}
