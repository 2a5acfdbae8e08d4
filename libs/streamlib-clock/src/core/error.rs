// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamError {
    /// Operation attempted on a clock whose state does not support it.
    #[error("Invalid clock state: {0}")]
    InvalidState(String),

    /// Two clocks with incompatible committed sync policies were unified.
    #[error("Clocks {left} and {right} cannot be unified{}", format_position(.position))]
    ClockConflict {
        left: String,
        right: String,
        position: Option<String>,
    },

    #[error(
        "Clock {clock_id} has multiple synchronization sources ({}). Do you have multiple sound cards in the same clock?",
        .sources.join(", ")
    )]
    SelfSyncConflict {
        clock_id: String,
        sources: Vec<String>,
    },

    #[error("Source {source_id} failed while streaming: {message}")]
    SourceFailed { source_id: String, message: String },

    #[error("Invalid configuration: {0}")]
    Configuration(String),

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn format_position(position: &Option<String>) -> String {
    match position {
        Some(pos) => format!(" (at {})", pos),
        None => String::new(),
    }
}

pub type Result<T> = std::result::Result<T, StreamError>;

/// Best-effort message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}
