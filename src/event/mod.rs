//! # Event Model
//!
//! Payload types carried through the posted-event queue.
//!
//! An [`Event`] is an exclusively owned, heap-allocated payload tagged with an
//! [`EventKind`]. Posting transfers ownership of the payload to the receiver
//! thread's queue; the queue drops it exactly once, either after delivery or
//! on explicit removal. Handlers downcast through [`Event::as_any`] to recover
//! the concrete payload type.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

/// Discriminant identifying a class of events.
///
/// Built-in kinds live in [`crate::constants::kinds`]; applications allocate
/// their own values at or above `kinds::USER`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKind(pub i32);

impl EventKind {
    /// True for kinds the core itself interprets during draining
    pub fn is_builtin(self) -> bool {
        self.0 < crate::constants::kinds::USER.0
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventKind({})", self.0)
    }
}

/// An event payload deliverable through the dispatch pipeline
pub trait Event: Any + Send {
    /// The kind discriminant used for filtering, compression, and the
    /// deferred-destroy gate
    fn kind(&self) -> EventKind;

    /// Downcasting surface for handlers
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcasting surface for filters that rewrite payloads
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Handle identifying one queued entry, returned by `post_event`.
///
/// Handles are process-unique and never reused, so a stale handle held after
/// delivery simply fails to match anything during removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PostedEventId(u64);

static NEXT_EVENT_ID: AtomicU64 = AtomicU64::new(1);

impl PostedEventId {
    pub(crate) fn next() -> Self {
        Self(NEXT_EVENT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Minimal concrete event carrying only its kind.
///
/// Convenient for control events like quit and deferred-destroy requests
/// where the kind itself is the whole message.
#[derive(Debug)]
pub struct BasicEvent {
    kind: EventKind,
}

impl BasicEvent {
    pub fn new(kind: EventKind) -> Self {
        Self { kind }
    }
}

impl Event for BasicEvent {
    fn kind(&self) -> EventKind {
        self.kind
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
