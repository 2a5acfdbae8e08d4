// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Self-synchronization descriptors
//!
//! A source that drives a real-time device (sound card callback, display
//! vsync) already runs at the device's pace. It reports this through
//! [`SelfSync`] so its clock can stop sleeping and let the device lead.
//!
//! Device backends identify themselves with a [`SelfSyncToken`]. The clock
//! never looks inside a token; it only renders it for diagnostics, so new
//! backends plug in without the scheduler knowing about them.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque identity of the device a source is synchronized to.
///
/// ```rust,ignore
/// struct AlsaDevice { card: String }
///
/// impl SelfSyncToken for AlsaDevice {
///     fn description(&self) -> String {
///         format!("alsa:{}", self.card)
///     }
/// }
/// ```
pub trait SelfSyncToken: Send + Sync {
    fn description(&self) -> String;
}

/// Whether a source's self-sync status can change while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelfSyncMode {
    /// Fixed for the lifetime of the source.
    Static,
    /// May switch on or off, e.g. when a device is opened or closed.
    Dynamic,
}

/// Self-synchronization descriptor reported by a source.
#[derive(Clone)]
pub struct SelfSync {
    pub mode: SelfSyncMode,
    pub token: Option<Arc<dyn SelfSyncToken>>,
}

impl SelfSync {
    /// Not synchronized to any device.
    pub fn none() -> Self {
        Self {
            mode: SelfSyncMode::Static,
            token: None,
        }
    }

    pub fn new(mode: SelfSyncMode, token: Option<Arc<dyn SelfSyncToken>>) -> Self {
        Self { mode, token }
    }

    /// Currently pacing against `token`.
    pub fn active(token: Arc<dyn SelfSyncToken>) -> Self {
        Self {
            mode: SelfSyncMode::Dynamic,
            token: Some(token),
        }
    }

    /// Dynamic with a device attached: the clock must not sleep on its own.
    pub fn is_active(&self) -> bool {
        self.mode == SelfSyncMode::Dynamic && self.token.is_some()
    }

    pub fn token_description(&self) -> Option<String> {
        self.token.as_ref().map(|token| token.description())
    }
}

impl Default for SelfSync {
    fn default() -> Self {
        Self::none()
    }
}

impl fmt::Debug for SelfSync {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SelfSync")
            .field("mode", &self.mode)
            .field("token", &self.token_description())
            .finish()
    }
}
