//! # Dispatch Constants
//!
//! Well-known event kinds and the event priority scale shared across the
//! posting and draining pipeline.

use crate::event::EventKind;

/// Event priority scale.
///
/// Posted events are queued in descending priority order; any `i32` is a
/// valid priority, these are the conventional anchor points.
pub mod priority {
    /// Delivered before normal-priority events
    pub const HIGH: i32 = 1;
    /// Default priority for posted events
    pub const NORMAL: i32 = 0;
    /// Delivered after normal-priority events
    pub const LOW: i32 = -1;
}

/// Built-in event kinds understood by the dispatch core itself
pub mod kinds {
    use super::EventKind;

    /// Request to destroy the receiver once the posting loop frame has exited
    pub const DEFERRED_DELETE: EventKind = EventKind(52);

    /// Request to stop the receiver thread's event loop
    pub const QUIT: EventKind = EventKind(20);

    /// First kind value available for application-defined events
    pub const USER: EventKind = EventKind(1000);
}
