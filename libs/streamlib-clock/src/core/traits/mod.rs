// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod self_sync;
mod source;

pub use self_sync::{SelfSync, SelfSyncMode, SelfSyncToken};
pub use source::{shared_source, SharedSource, SourceKind, StreamSource};
