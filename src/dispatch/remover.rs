//! # Remover
//!
//! Synchronous cancellation of not-yet-delivered entries. The object teardown
//! path calls [`remove_posted_events`] so no queue retains a dangling entry;
//! [`remove_posted_event`] cancels one specific entry by handle and is logged
//! as a diagnostic, since needing it usually signals an upstream ownership
//! bug.
//!
//! Removal is best-effort against a concurrent drain: an entry whose slot has
//! already been cleared is already dispatching and cannot be cancelled.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::{Event, EventKind, PostedEventId};
use crate::target::{target_ptr, weak_target_ptr, EventTarget};
use crate::thread::ThreadContext;

/// Excise every still-pending entry matching `receiver` and/or `kind`,
/// decrementing pending counters per removal.
///
/// With `receiver = None` the calling thread's queue is filtered by `kind`
/// alone; with `kind = None` every entry for the receiver goes. Payloads are
/// dropped outside the queue lock. While a drain is on the stack the matching
/// slots are cleared in place; physical truncation happens only when no drain
/// is in recursion, so indices held by an unwinding drain stay valid.
pub fn remove_posted_events(receiver: Option<&Arc<dyn EventTarget>>, kind: Option<EventKind>) {
    let data = match receiver {
        Some(receiver) => match receiver.target_state().thread_context() {
            Some(data) => data,
            None => return, // already detached, nothing can be pending
        },
        None => ThreadContext::current(),
    };

    let mut dropped: Vec<Box<dyn Event>> = Vec::new();
    {
        let mut queue = data.queue().lock();

        // The teardown path calls this unconditionally; the object may have
        // nothing pending by the time we hold the lock.
        if receiver.is_some_and(|r| r.target_state().pending_event_count() == 0) {
            return;
        }

        let recursing = data.queue().is_recursing();
        let receiver_ptr = receiver.map(target_ptr);
        let mut kept = 0;
        for index in 0..queue.events.len() {
            let matches = {
                let entry = &queue.events[index];
                receiver_ptr.map_or(true, |ptr| weak_target_ptr(&entry.receiver) == ptr)
                    && entry
                        .event
                        .as_ref()
                        .is_some_and(|pending| kind.map_or(true, |k| pending.kind() == k))
            };
            if matches {
                if let Some(target) = queue.events[index].receiver.upgrade() {
                    target.target_state().decrement_pending();
                }
                if let Some(payload) = queue.events[index].event.take() {
                    dropped.push(payload);
                }
            } else if !recursing {
                queue.events.swap(index, kept);
                kept += 1;
            }
        }
        if !recursing {
            queue.events.truncate(kept);
        }
    }

    if !dropped.is_empty() {
        debug!(count = dropped.len(), "removed pending posted events");
    }
    // payloads are freed here, outside the queue lock
}

/// Cancel one specific queued entry by handle on the calling thread's queue.
///
/// Linear scan; warn-logged when it actually removes something. Returns true
/// if the entry was found with its payload still in place.
pub fn remove_posted_event(id: PostedEventId) -> bool {
    let data = ThreadContext::current();
    let mut removed: Option<Box<dyn Event>> = None;
    {
        let mut queue = data.queue().lock();
        for entry in queue.events.iter_mut() {
            if entry.id == id {
                if let Some(payload) = entry.event.take() {
                    if let Some(target) = entry.receiver.upgrade() {
                        target.target_state().decrement_pending();
                    }
                    removed = Some(payload);
                }
                break;
            }
        }
    }

    match removed {
        Some(payload) => {
            warn!(
                event_id = id.as_u64(),
                kind = %payload.kind(),
                "posted event removed by handle; this usually signals an upstream ownership bug"
            );
            true
        }
        None => false,
    }
}

/// Advisory check for still-pending posted events addressed to `receiver`.
///
/// Inherently racy: a concurrent post or drain can change the answer before
/// the caller acts on it.
pub fn has_pending_events(receiver: &Arc<dyn EventTarget>) -> bool {
    receiver.target_state().pending_event_count() > 0
}
