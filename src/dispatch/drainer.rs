//! # Event Drainer
//!
//! [`send_posted_events`] pops ready entries from the calling thread's queue
//! and delivers them through the notify pipeline. It runs only on the owning
//! thread but is safely reentrant: handlers may post, drain, and remove while
//! a drain is already on the stack.
//!
//! Termination is guaranteed by the two-offset scheme (see [`crate::queue`]):
//! each pass is bounded to the entries that existed when it started, so a
//! handler that keeps re-posting events of the kind being drained can never
//! extend the current pass. The queue mutex is released around every delivery
//! and reacquired afterwards on all exit paths, including handler panics.

use std::cell::Cell;
use std::sync::Arc;

use parking_lot::MutexGuard;
use tracing::{debug, warn};

use crate::constants::kinds;
use crate::event::EventKind;
use crate::queue::PostedEvent;
use crate::target::{target_ptr, weak_target_ptr, EventTarget};
use crate::thread::ThreadContext;

use super::notify::notify;

/// Drain pending posted events on the calling thread.
///
/// With no `receiver` and no `kind` this is a full drain: every ready entry
/// that existed at entry is delivered, and the consumed region is compacted
/// afterwards. Passing a `receiver` and/or `kind` restricts delivery to
/// matching entries; such partial drains never compact and never advance the
/// shared scan offset.
///
/// Deferred-destroy entries are delivered only once their stamped loop depth
/// proves the posting frame has exited, or when the drain explicitly targets
/// that kind; otherwise a full drain re-queues them unexamined for a later
/// pass.
///
/// Calling this for a receiver owned by another thread is a logged no-op.
pub fn send_posted_events(receiver: Option<&Arc<dyn EventTarget>>, kind: Option<EventKind>) {
    let data = ThreadContext::current();
    if let Some(receiver) = receiver {
        let owned_here = receiver
            .target_state()
            .thread_context()
            .is_some_and(|context| Arc::ptr_eq(&context, &data));
        if !owned_here {
            warn!("cannot send posted events for a receiver owned by another thread");
            return;
        }
    }
    send_posted_events_with(&data, receiver, kind);
}

pub(crate) fn send_posted_events_with(
    data: &Arc<ThreadContext>,
    receiver: Option<&Arc<dyn EventTarget>>,
    kind: Option<EventKind>,
) {
    // Declared before the lock guard so it drops after the lock is released:
    // the exit wake must happen outside the mutex.
    let recursion = RecursionGuard::enter(data);
    let mut queue = data.queue().lock();

    // The dispatcher may sleep only if nothing was pending when we started;
    // any skipped entry or concurrent post clears the flag again.
    data.set_can_wait(queue.events.is_empty());

    if queue.events.is_empty()
        || receiver.is_some_and(|r| r.target_state().pending_event_count() == 0)
    {
        recursion.skip_wake();
        return;
    }
    data.set_can_wait(true);

    let full = receiver.is_none() && kind.is_none();
    // Full drains advance the shared start offset so nested full drains
    // resume where the outer one stands; partial drains keep a local cursor.
    let mut cursor = queue.start_offset;
    queue.insertion_offset = queue.events.len();

    loop {
        let index = if full { queue.start_offset } else { cursor };
        if index >= queue.events.len() || index >= queue.insertion_offset {
            break;
        }
        if full {
            queue.start_offset += 1;
        } else {
            cursor += 1;
        }

        let (entry_kind, entry_level) = match queue.events[index].event.as_ref() {
            None => continue, // slot already consumed
            Some(pending) => (pending.kind(), queue.events[index].loop_level),
        };

        let matches = receiver
            .map_or(true, |r| weak_target_ptr(&queue.events[index].receiver) == target_ptr(r))
            && kind.map_or(true, |k| k == entry_kind);
        if !matches {
            data.set_can_wait(false);
            continue;
        }

        if entry_kind == kinds::DEFERRED_DELETE {
            let level = data.loop_level();
            let allow = entry_level > level
                || (entry_level == 0 && level > 0)
                || (kind == Some(kinds::DEFERRED_DELETE) && entry_level == level);
            if !allow {
                if full {
                    // Keep the entry for a later pass; only full drains may
                    // move it, partial drains leave it untouched in place.
                    let moved = PostedEvent {
                        receiver: queue.events[index].receiver.clone(),
                        event: queue.events[index].event.take(),
                        priority: queue.events[index].priority,
                        id: queue.events[index].id,
                        loop_level: entry_level,
                    };
                    queue.add_event(moved);
                }
                continue;
            }
        }

        // Claim the entry: clear the slot and settle the pending counter
        // before anyone can observe the event as still queued.
        let Some(payload) = queue.events[index].event.take() else {
            continue;
        };
        let target = queue.events[index].receiver.clone();
        if let Some(receiver) = target.upgrade() {
            receiver.target_state().decrement_pending();
        }

        // Deliver unlocked; the guard relocks on return and on unwind, and
        // the payload is dropped either way.
        MutexGuard::unlocked(&mut queue, || {
            let mut payload = payload;
            match target.upgrade() {
                Some(receiver) => {
                    notify(&receiver, payload.as_mut());
                }
                None => {
                    debug!(
                        kind = %entry_kind,
                        "receiver destroyed before delivery; dropping payload"
                    );
                }
            }
        });
        // The handler may have posted, drained, or removed; every iteration
        // re-reads the queue state from scratch.
    }

    if full {
        queue.compact();
    }
}

/// Tracks drain nesting and performs the exit handshake: when the outermost
/// drain leaves with `can_wait` false, the dispatcher is woken once more so
/// deferred work is picked up promptly.
struct RecursionGuard<'a> {
    data: &'a ThreadContext,
    wake_on_exit: Cell<bool>,
}

impl<'a> RecursionGuard<'a> {
    fn enter(data: &'a ThreadContext) -> Self {
        data.queue().enter_recursion();
        Self {
            data,
            wake_on_exit: Cell::new(true),
        }
    }

    fn skip_wake(&self) {
        self.wake_on_exit.set(false);
    }
}

impl Drop for RecursionGuard<'_> {
    fn drop(&mut self) {
        let remaining = self.data.queue().leave_recursion();
        if remaining == 0 && self.wake_on_exit.get() && !self.data.can_wait() {
            self.data.wake();
        }
    }
}
