#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # Dispatch Core
//!
//! The asynchronous event-delivery substrate for an event-driven application
//! framework: a per-thread posted-event queue with priority/FIFO ordering,
//! thread affinity, idempotent de-duplication, and safely re-entrant
//! draining. Everything is in-process; the core adds no threads of its own
//! and has no wire or on-disk format.
//!
//! ## Architecture
//!
//! Every participating OS thread owns one [`ThreadContext`] with one
//! mutex-guarded posted-event queue. [`post_event`] may be called from any
//! thread: it locks the target queue, coalesces compressible kinds, inserts
//! in priority order, and wakes the owning thread's dispatcher.
//! [`send_posted_events`] runs only on the owning thread and delivers ready
//! entries through the notify pipeline (process-wide filters, per-object
//! filters, then the receiver's own handler), holding no lock while user code
//! runs. Two queue offsets bound each drain pass so handlers that re-post
//! events can never livelock a drain.
//!
//! ## Module Organization
//!
//! - [`event`] - Payload trait, kind discriminants, posted-event handles
//! - [`target`] - The receiver capability surface: affinity, handler, filters
//! - [`thread`] - Per-thread contexts, the registry, and the wake primitive
//! - [`queue`] - Offset-tracked queue bookkeeping
//! - [`dispatch`] - Poster, drainer, notify pipeline, and removers
//! - [`config`] - Process-wide tunables (the compression set)
//! - [`error`] - Structured error handling
//! - [`logging`] - Optional `tracing` initialization for hosts and tests
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use dispatch_core::{
//!     constants::priority, post_event, send_posted_events, BasicEvent, Event, EventKind,
//!     EventTarget, TargetState,
//! };
//!
//! struct Printer {
//!     state: TargetState,
//! }
//!
//! impl EventTarget for Printer {
//!     fn target_state(&self) -> &TargetState {
//!         &self.state
//!     }
//!     fn event(&self, event: &mut dyn Event) -> bool {
//!         println!("got event kind {}", event.kind());
//!         true
//!     }
//! }
//!
//! let printer: Arc<dyn EventTarget> = Arc::new(Printer { state: TargetState::new() });
//! post_event(&printer, Box::new(BasicEvent::new(EventKind(1000))), priority::NORMAL).unwrap();
//! send_posted_events(None, None); // delivers on this thread
//! ```

pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod logging;
pub mod queue;
pub mod target;
pub mod thread;

pub use config::DispatchConfig;
pub use dispatch::{
    has_pending_events, install_global_event_filter, notify, post_event, remove_global_event_filter,
    remove_posted_event, remove_posted_events, send_event, send_posted_events,
};
pub use error::{DispatchError, Result};
pub use event::{BasicEvent, Event, EventKind, PostedEventId};
pub use target::{detach_target, move_to_thread, EventFilter, EventTarget, TargetState};
pub use thread::ThreadContext;
