//! # Notify Pipeline
//!
//! Immediate delivery of one event to one receiver, on the receiver's owning
//! thread. Order: process-wide filters (root-context receivers only), then
//! the receiver's own filters (most recently installed first), then the
//! receiver's virtual handler. Any stage may consume the event and
//! short-circuit the rest.
//!
//! Delivery brackets the thread's loop-depth counter with a drop guard, so a
//! panicking handler unwinds the counter before the panic propagates. That
//! counter is what the deferred-destroy gate in the drainer consumes.

use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;
use tracing::warn;

use crate::event::Event;
use crate::target::{EventFilter, EventTarget};
use crate::thread::ThreadContext;

static GLOBAL_FILTERS: OnceLock<RwLock<Vec<Weak<dyn EventFilter>>>> = OnceLock::new();

fn global_filters() -> &'static RwLock<Vec<Weak<dyn EventFilter>>> {
    GLOBAL_FILTERS.get_or_init(|| RwLock::new(Vec::new()))
}

/// Install a process-wide filter, ahead of previously installed ones.
///
/// Process-wide filters run only for receivers living on the root context's
/// thread. Held weakly; a dropped filter is skipped.
pub fn install_global_event_filter(filter: &Arc<dyn EventFilter>) {
    global_filters().write().insert(0, Arc::downgrade(filter));
}

/// Remove a previously installed process-wide filter
pub fn remove_global_event_filter(filter: &Arc<dyn EventFilter>) {
    let target = Arc::as_ptr(filter) as *const ();
    global_filters()
        .write()
        .retain(|installed| installed.as_ptr() as *const () != target);
}

/// Deliver `event` to `receiver` immediately, bypassing the queue.
///
/// Must be called on the receiver's owning thread. Returns the pipeline's
/// verdict: true when some stage consumed the event.
pub fn send_event(receiver: &Arc<dyn EventTarget>, event: &mut dyn Event) -> bool {
    notify(receiver, event)
}

/// Run the filter-then-handler pipeline for one event.
///
/// A receiver that lost its thread context mid-teardown is logged and treated
/// as handled so a racing destruction cannot cascade failures. The delivery
/// is bracketed on the thread's loop-depth counter, unwound even on panic.
pub fn notify(receiver: &Arc<dyn EventTarget>, event: &mut dyn Event) -> bool {
    let Some(data) = receiver.target_state().thread_context() else {
        warn!(kind = %event.kind(), "dropping event for a receiver without thread context");
        return true;
    };
    debug_assert_eq!(
        data.thread_id(),
        std::thread::current().id(),
        "events must be delivered on the receiver's owning thread"
    );
    let _depth = LoopLevelGuard::enter(&data);

    if send_through_global_filters(receiver, event, &data) {
        return true;
    }
    if send_through_object_filters(receiver, event) {
        return true;
    }
    receiver.event(event)
}

fn send_through_global_filters(
    receiver: &Arc<dyn EventTarget>,
    event: &mut dyn Event,
    data: &ThreadContext,
) -> bool {
    if !data.is_root() {
        // process-wide filters only see receivers on the root thread
        return false;
    }
    let filters = global_filters().read().clone();
    for filter in filters {
        if let Some(filter) = filter.upgrade() {
            if filter.event_filter(receiver, event) {
                return true;
            }
        }
    }
    false
}

fn send_through_object_filters(receiver: &Arc<dyn EventTarget>, event: &mut dyn Event) -> bool {
    for filter in receiver.target_state().filters_snapshot() {
        if let Some(filter) = filter.upgrade() {
            if filter.event_filter(receiver, event) {
                return true;
            }
        }
    }
    false
}

/// Brackets one delivery on the thread's loop-depth counter; unwinds on panic
struct LoopLevelGuard<'a> {
    data: &'a ThreadContext,
}

impl<'a> LoopLevelGuard<'a> {
    fn enter(data: &'a ThreadContext) -> Self {
        data.enter_loop_level();
        Self { data }
    }
}

impl Drop for LoopLevelGuard<'_> {
    fn drop(&mut self) {
        self.data.leave_loop_level();
    }
}
