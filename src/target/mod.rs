//! # Event Target Surface
//!
//! The capability surface the dispatch core requires of a receiver: a thread
//! affinity slot, a virtual event handler, and an ordered list of installed
//! filters. Applications embed a [`TargetState`] in their object and
//! implement [`EventTarget`] over it.
//!
//! Receivers are addressed through `Arc<dyn EventTarget>` and held `Weak`
//! inside the queue, so a queued entry never keeps its receiver alive and a
//! lookup after destruction yields "gone" rather than a dangle. Teardown goes
//! through [`detach_target`], which excises every pending entry before the
//! affinity slot is cleared; affinity reassignment goes through
//! [`move_to_thread`], which migrates the object's pending entries to the new
//! thread's queue.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{MutexGuard, RwLock};
use tracing::{debug, warn};

use crate::dispatch::remove_posted_events;
use crate::event::Event;
use crate::queue::{PostedEvent, QueueState};
use crate::thread::ThreadContext;

/// An addressable receiver of dispatched events.
///
/// Implementations embed a [`TargetState`] and return it from
/// [`target_state`](EventTarget::target_state); the dispatch core keeps all
/// of its per-object bookkeeping there. [`event`](EventTarget::event) is the
/// virtual handler at the end of the notify pipeline; it returns true when
/// the event was handled.
pub trait EventTarget: Send + Sync {
    fn target_state(&self) -> &TargetState;

    /// Handle one delivered event. Runs on the receiver's owning thread with
    /// no queue lock held, so it may freely post, drain, and remove.
    fn event(&self, event: &mut dyn Event) -> bool;
}

/// A filter interposed ahead of a receiver's handler.
///
/// Returning true consumes the event and short-circuits the rest of the
/// pipeline. Filters are held weakly, both per object and process-wide; a
/// dropped filter is skipped.
pub trait EventFilter: Send + Sync {
    fn event_filter(&self, receiver: &Arc<dyn EventTarget>, event: &mut dyn Event) -> bool;
}

/// Per-object dispatch state: the thread affinity slot, the pending-event
/// counter, and the object's filter list.
///
/// The pending counter equals the number of non-empty queue slots addressed
/// to this object across all thread queues; the poster increments it and
/// delivery or removal decrements it.
pub struct TargetState {
    thread: RwLock<Option<Arc<ThreadContext>>>,
    pending: AtomicUsize,
    filters: RwLock<Vec<Weak<dyn EventFilter>>>,
}

impl TargetState {
    /// Fresh state affined to the calling thread, establishing that thread's
    /// context if it has none yet
    pub fn new() -> Self {
        Self {
            thread: RwLock::new(Some(ThreadContext::current())),
            pending: AtomicUsize::new(0),
            filters: RwLock::new(Vec::new()),
        }
    }

    /// The thread context this object is currently affined to, or `None`
    /// once the object has been detached for teardown
    pub fn thread_context(&self) -> Option<Arc<ThreadContext>> {
        self.thread.read().clone()
    }

    /// Raw affinity-slot write. Callers that need pending entries to follow
    /// the object go through [`move_to_thread`] instead.
    pub(crate) fn set_thread_context(&self, context: Option<Arc<ThreadContext>>) {
        *self.thread.write() = context;
    }

    /// Number of still-pending queue entries addressed to this object.
    /// Advisory under concurrency; exact on the owning thread.
    pub fn pending_event_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    pub(crate) fn increment_pending(&self) {
        self.pending.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn decrement_pending(&self) {
        let previous = self.pending.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "pending-event counter underflow");
    }

    /// Install `filter` ahead of previously installed ones. Held weakly; the
    /// caller keeps the filter alive for as long as it should apply.
    pub fn install_event_filter(&self, filter: &Arc<dyn EventFilter>) {
        let mut filters = self.filters.write();
        filters.retain(|installed| installed.strong_count() > 0);
        filters.insert(0, Arc::downgrade(filter));
    }

    /// Remove a previously installed filter; unknown filters are ignored
    pub fn remove_event_filter(&self, filter: &Arc<dyn EventFilter>) {
        let target = Arc::as_ptr(filter) as *const ();
        self.filters
            .write()
            .retain(|installed| installed.as_ptr() as *const () != target);
    }

    /// Snapshot of the filter list, most recently installed first. Taken so
    /// filters run without the list lock held and may themselves install or
    /// remove filters.
    pub(crate) fn filters_snapshot(&self) -> Vec<Weak<dyn EventFilter>> {
        self.filters.read().clone()
    }
}

impl Default for TargetState {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TargetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetState")
            .field("pending", &self.pending_event_count())
            .field("attached", &self.thread.read().is_some())
            .finish()
    }
}

/// Identity of a receiver for queue-entry matching
pub(crate) fn target_ptr(receiver: &Arc<dyn EventTarget>) -> *const () {
    Arc::as_ptr(receiver) as *const ()
}

/// Identity of a queued entry's receiver without upgrading it
pub(crate) fn weak_target_ptr(receiver: &Weak<dyn EventTarget>) -> *const () {
    receiver.as_ptr() as *const ()
}

/// Teardown hook: excise every pending entry for `receiver`, then clear its
/// affinity slot so later posts are discarded.
///
/// Call before the object's final destruction; afterwards the object can
/// never receive another event and its pending counter is zero.
pub fn detach_target(receiver: &Arc<dyn EventTarget>) {
    remove_posted_events(Some(receiver), None);
    receiver.target_state().set_thread_context(None);
    debug!("event target detached");
}

/// Reassign `receiver` to `context`, carrying its pending queue entries
/// along so they are delivered on the new thread.
///
/// Must be called from the object's current owning thread; a wrong-thread
/// call is a logged no-op. Passing `None` clears the affinity slot without
/// touching queued entries, which then drop undelivered at drain time.
pub fn move_to_thread(receiver: &Arc<dyn EventTarget>, context: Option<Arc<ThreadContext>>) {
    let state = receiver.target_state();
    let Some(from) = state.thread_context() else {
        // a detached object may be re-adopted by any thread
        state.set_thread_context(context);
        return;
    };
    if from.thread_id() != std::thread::current().id() {
        warn!("cannot move an object owned by another thread");
        return;
    }

    let Some(to) = context else {
        state.set_thread_context(None);
        return;
    };
    if Arc::ptr_eq(&from, &to) {
        return;
    }

    let receiver_ptr = target_ptr(receiver);
    let mut moved = 0usize;
    {
        // Both queue mutexes are held while the affinity flips, so a
        // concurrent poster's resolve-verify-retry loop cannot land an entry
        // in the old queue after migration has passed it.
        let (mut source, mut dest) = lock_queue_pair(&from, &to);
        state.set_thread_context(Some(Arc::clone(&to)));
        for entry in source.events.iter_mut() {
            if weak_target_ptr(&entry.receiver) != receiver_ptr {
                continue;
            }
            let Some(payload) = entry.event.take() else {
                continue;
            };
            dest.add_event(PostedEvent {
                receiver: entry.receiver.clone(),
                event: Some(payload),
                priority: entry.priority,
                id: entry.id,
                loop_level: entry.loop_level,
            });
            moved += 1;
        }
    }

    if moved > 0 {
        to.set_can_wait(false);
        // signaled outside both locks, as the poster does
        to.wake();
        debug!(count = moved, "pending posted events followed their object");
    }
}

/// Lock two thread queues in address order so concurrent moves in opposite
/// directions cannot deadlock. Returns the guards as (first, second) in the
/// caller's argument order.
fn lock_queue_pair<'a>(
    first: &'a ThreadContext,
    second: &'a ThreadContext,
) -> (MutexGuard<'a, QueueState>, MutexGuard<'a, QueueState>) {
    let first_addr = std::ptr::from_ref(first.queue()) as usize;
    let second_addr = std::ptr::from_ref(second.queue()) as usize;
    if first_addr < second_addr {
        let a = first.queue().lock();
        let b = second.queue().lock();
        (a, b)
    } else {
        let b = second.queue().lock();
        let a = first.queue().lock();
        (a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    struct Sink {
        state: TargetState,
    }

    impl EventTarget for Sink {
        fn target_state(&self) -> &TargetState {
            &self.state
        }
        fn event(&self, _event: &mut dyn Event) -> bool {
            true
        }
    }

    struct Named(&'static str, Arc<Mutex<Vec<&'static str>>>);

    impl EventFilter for Named {
        fn event_filter(&self, _receiver: &Arc<dyn EventTarget>, _event: &mut dyn Event) -> bool {
            self.1.lock().push(self.0);
            false
        }
    }

    #[test]
    fn new_state_is_affined_to_the_calling_thread() {
        let state = TargetState::new();
        let context = state.thread_context().expect("affined");
        assert_eq!(context.thread_id(), std::thread::current().id());
        assert_eq!(state.pending_event_count(), 0);
    }

    #[test]
    fn pending_counter_round_trips() {
        let state = TargetState::new();
        state.increment_pending();
        state.increment_pending();
        assert_eq!(state.pending_event_count(), 2);
        state.decrement_pending();
        assert_eq!(state.pending_event_count(), 1);
        state.decrement_pending();
        assert_eq!(state.pending_event_count(), 0);
    }

    #[test]
    fn filters_snapshot_newest_first_and_removal_works() {
        let state = TargetState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let older: Arc<dyn EventFilter> = Arc::new(Named("older", seen.clone()));
        let newer: Arc<dyn EventFilter> = Arc::new(Named("newer", seen));

        state.install_event_filter(&older);
        state.install_event_filter(&newer);
        let snapshot = state.filters_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot[0].ptr_eq(&Arc::downgrade(&newer)));
        assert!(snapshot[1].ptr_eq(&Arc::downgrade(&older)));

        state.remove_event_filter(&newer);
        let snapshot = state.filters_snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot[0].ptr_eq(&Arc::downgrade(&older)));
    }

    #[test]
    fn dropped_filters_are_pruned_on_install() {
        let state = TargetState::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let short_lived: Arc<dyn EventFilter> = Arc::new(Named("gone", seen.clone()));
            state.install_event_filter(&short_lived);
        }
        let survivor: Arc<dyn EventFilter> = Arc::new(Named("kept", seen));
        state.install_event_filter(&survivor);
        assert_eq!(state.filters_snapshot().len(), 1);
    }

    #[test]
    fn detach_clears_the_affinity_slot() {
        let target: Arc<dyn EventTarget> = Arc::new(Sink {
            state: TargetState::new(),
        });
        assert!(target.target_state().thread_context().is_some());
        detach_target(&target);
        assert!(target.target_state().thread_context().is_none());
        assert_eq!(target.target_state().pending_event_count(), 0);
    }

    #[test]
    fn moving_to_the_same_context_is_a_no_op() {
        let target: Arc<dyn EventTarget> = Arc::new(Sink {
            state: TargetState::new(),
        });
        let here = ThreadContext::current();
        move_to_thread(&target, Some(here.clone()));
        let context = target.target_state().thread_context().expect("still affined");
        assert!(Arc::ptr_eq(&context, &here));
    }

    #[test]
    fn a_detached_object_may_be_readopted() {
        let target: Arc<dyn EventTarget> = Arc::new(Sink {
            state: TargetState::new(),
        });
        detach_target(&target);
        move_to_thread(&target, Some(ThreadContext::current()));
        assert!(target.target_state().thread_context().is_some());
    }
}
