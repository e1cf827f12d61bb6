//! # Event Poster
//!
//! [`post_event`] is the only cross-thread entry point into a thread's
//! posted-event queue. It is fire-and-forget: beyond a short hold of the
//! target queue's mutex it never blocks, and it never waits for delivery.

use std::sync::Arc;
use std::thread;

use tracing::{debug, trace};

use crate::config::DispatchConfig;
use crate::constants::kinds;
use crate::error::Result;
use crate::event::{Event, PostedEventId};
use crate::queue::PostedEvent;
use crate::target::{target_ptr, weak_target_ptr, EventTarget};

/// Queue `event` for delivery to `receiver` on its owning thread.
///
/// Ownership of the payload transfers to the queue; it is dropped exactly
/// once, after delivery or on removal. Returns the queued entry's handle, or
/// `Ok(None)` when the event was intentionally discarded: the receiver has no
/// thread context (mid-teardown), or an equivalent entry of a compressible
/// kind is already pending.
///
/// Safe to call from any thread. The only error is allocation pressure while
/// growing the queue, in which case the payload is dropped and the queue is
/// left untouched.
pub fn post_event(
    receiver: &Arc<dyn EventTarget>,
    event: Box<dyn Event>,
    priority: i32,
) -> Result<Option<PostedEventId>> {
    let state = receiver.target_state();
    let kind = event.kind();

    let Some(mut data) = state.thread_context() else {
        debug!(%kind, "discarding event posted to a receiver without thread context");
        return Ok(None);
    };

    // If the receiver is concurrently reassigned to another thread, follow it:
    // lock the queue we resolved, then verify the affinity is still the same.
    let mut queue = loop {
        let guard = data.queue().lock();
        match state.thread_context() {
            Some(current) if Arc::ptr_eq(&current, &data) => break guard,
            Some(current) => {
                drop(guard);
                data = current;
            }
            None => {
                drop(guard);
                debug!(%kind, "receiver lost its thread context while posting; discarding");
                return Ok(None);
            }
        }
    };

    // Idempotent classes: a pending entry of the same (receiver, kind)
    // swallows the new event.
    if state.pending_event_count() > 0 && DispatchConfig::get().is_compressible(kind) {
        let receiver_ptr = target_ptr(receiver);
        let duplicate = queue.events.iter().any(|queued| {
            weak_target_ptr(&queued.receiver) == receiver_ptr
                && queued.event.as_ref().is_some_and(|pending| pending.kind() == kind)
        });
        if duplicate {
            drop(queue);
            trace!(%kind, "compressed duplicate posted event");
            return Ok(None);
        }
    }

    // Deferred-destroy events posted from the receiver's own thread remember
    // the loop depth, so the drainer can prove the posting frame has exited.
    let loop_level = if kind == kinds::DEFERRED_DELETE && data.thread_id() == thread::current().id()
    {
        data.loop_level()
    } else {
        0
    };

    queue.try_reserve()?;
    let id = PostedEventId::next();
    queue.add_event(PostedEvent {
        receiver: Arc::downgrade(receiver),
        event: Some(event),
        priority,
        id,
        loop_level,
    });
    state.increment_pending();
    data.set_can_wait(false);
    drop(queue);

    // Signal outside the lock so the woken dispatcher never contends with us.
    data.wake();
    Ok(Some(id))
}
