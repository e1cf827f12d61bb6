//! # Dispatch Pipeline
//!
//! The four operations over the posted-event queue:
//!
//! - [`post_event`]: the only cross-thread entry point; locks the target
//!   queue, compresses, inserts, and wakes the dispatcher
//! - [`send_posted_events`]: drains ready entries in bounded passes on the
//!   owning thread
//! - [`send_event`] / [`notify`]: immediate delivery through the filter
//!   pipeline
//! - [`remove_posted_events`] / [`remove_posted_event`]: synchronous
//!   cancellation of not-yet-delivered entries

pub mod drainer;
pub mod notify;
pub mod poster;
pub mod remover;

pub use drainer::send_posted_events;
pub use notify::{
    install_global_event_filter, notify, remove_global_event_filter, send_event,
};
pub use poster::post_event;
pub use remover::{has_pending_events, remove_posted_event, remove_posted_events};
