// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! StreamSource - the contract a unit must satisfy to be scheduled by a clock
//!
//! ## Source Kinds
//!
//! - **Output**: drives the graph. A clock only starts once it has one.
//! - **Active**: produces on every tick even when nothing pulls from it
//!   (e.g. a capture that must keep draining its device).
//! - **Passive**: produces only when another source pulls from it. The clock
//!   wakes it up and puts it to sleep but never animates it.
//!
//! ## Threading
//!
//! A clock animates its sources one after another on its own thread. The
//! mutex around each source is uncontended in steady state; it exists so
//! outside code can attach, inspect or drop sources safely.
//!
//! ## Example
//!
//! ```rust,ignore
//! struct FileOutput { id: String, writer: BufWriter<File> }
//!
//! impl StreamSource for FileOutput {
//!     fn id(&self) -> &str { &self.id }
//!     fn kind(&self) -> SourceKind { SourceKind::Output }
//!
//!     fn output(&mut self) -> Result<()> {
//!         self.writer.write_all(&[0u8; 1920])?;
//!         Ok(())
//!     }
//! }
//!
//! let output: SharedSource = Arc::new(Mutex::new(FileOutput { .. }));
//! clock.attach(&output);
//! ```

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::SelfSync;
use crate::core::error::Result;

/// Classification of a source, read once when its clock activates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Passive,
    Active,
    Output,
}

impl SourceKind {
    /// Active and output sources are animated on every tick.
    pub fn is_animated(self) -> bool {
        matches!(self, SourceKind::Active | SourceKind::Output)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Passive => write!(f, "passive"),
            SourceKind::Active => write!(f, "active"),
            SourceKind::Output => write!(f, "output"),
        }
    }
}

pub trait StreamSource: Send {
    /// Stable identifier, used in logs and diagnostics.
    fn id(&self) -> &str;

    fn kind(&self) -> SourceKind;

    fn self_sync(&self) -> SelfSync {
        SelfSync::none()
    }

    /// Whether the source is currently doing useful work.
    fn is_active(&self) -> bool {
        true
    }

    /// Whether the source could produce data right now.
    fn is_ready(&self) -> bool {
        true
    }

    /// Called once when the clock activates the source.
    fn wake_up(&mut self) {}

    /// Called when the clock stops; release devices and buffers here.
    fn force_sleep(&mut self) {}

    /// Produce one frame. Only called on active and output sources.
    ///
    /// # Errors
    ///
    /// A failure is routed through the clock's error policy: registered
    /// handlers, detaching this source, or process shutdown.
    fn output(&mut self) -> Result<()>;

    /// Recover after the clock fell too far behind real time
    /// (e.g. reconnect a network output or flush a device buffer).
    fn reset(&mut self) {}
}

/// How sources are shared between their owner and the clock.
pub type SharedSource = Arc<Mutex<dyn StreamSource>>;

/// Wrap a source for attachment to a clock.
pub fn shared_source<S: StreamSource + 'static>(source: S) -> SharedSource {
    Arc::new(Mutex::new(source))
}
