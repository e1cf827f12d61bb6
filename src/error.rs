//! Structured error handling for the dispatch core.
//!
//! The core never aborts the process in steady state: misuse (posting to a
//! receiver with no thread affinity, draining from the wrong thread) degrades
//! to a logged no-op, while genuine resource pressure surfaces to the caller
//! as a [`DispatchError`]. Panics raised by user event handlers are not
//! wrapped; they propagate to the drain caller after internal counters have
//! been unwound.

use std::collections::TryReserveError;

/// Errors surfaced by the posted-event queue operations
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The posted-event queue could not grow to hold another entry; the
    /// payload was dropped and the queue left consistent
    #[error("Posted-event queue cannot grow: {0}")]
    QueueCapacity(#[from] TryReserveError),
}

pub type Result<T> = std::result::Result<T, DispatchError>;
