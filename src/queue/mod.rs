//! # Posted-Event Queue Bookkeeping
//!
//! One mutex-guarded [`PostedEventList`] exists per thread context. Entries
//! are kept in descending priority order, insertion-order stable among equal
//! priorities, and consumed in place: delivering or removing an entry clears
//! its payload slot rather than shifting the vector, so indices held by an
//! in-flight drain stay valid.
//!
//! Two offsets bound each drain pass. `start_offset` marks the region of
//! fully consumed slots that may be physically erased; `insertion_offset` is
//! the snapshot taken at drain entry that separates "this generation" from
//! entries appended while the drain was running. A handler that keeps
//! re-posting events can therefore never extend the pass it is running
//! inside; its new entries wait for the next invocation.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Weak;

use parking_lot::{Mutex, MutexGuard};
use tracing::debug;

use crate::error::Result;
use crate::event::{Event, PostedEventId};
use crate::target::EventTarget;

/// One queued entry: a weak back-reference to the receiver and the exclusively
/// owned payload.
///
/// The payload slot becomes `None` the moment the entry is claimed for
/// delivery or removal; a cleared slot is skipped by every later scan. The
/// `loop_level` stamp is meaningful only for deferred-destroy entries.
pub(crate) struct PostedEvent {
    pub(crate) receiver: Weak<dyn EventTarget>,
    pub(crate) event: Option<Box<dyn Event>>,
    pub(crate) priority: i32,
    pub(crate) id: PostedEventId,
    pub(crate) loop_level: usize,
}

/// Mutable queue state, always accessed under the list mutex
pub(crate) struct QueueState {
    pub(crate) events: Vec<PostedEvent>,
    /// Slots below this index are consumed and erasable
    pub(crate) start_offset: usize,
    /// Snapshot boundary set at drain entry; appends land at or past it
    pub(crate) insertion_offset: usize,
}

impl QueueState {
    /// Reserve room for one more entry, surfacing allocation pressure to the
    /// poster instead of aborting
    pub(crate) fn try_reserve(&mut self) -> Result<()> {
        self.events.try_reserve(1)?;
        Ok(())
    }

    /// Insert preserving descending priority and insertion-order stability.
    ///
    /// Entries inside the current drain snapshot are never reordered, so the
    /// search starts at `insertion_offset`. The common case (equal or lower
    /// priority than the tail) is a plain append.
    pub(crate) fn add_event(&mut self, entry: PostedEvent) {
        let len = self.events.len();
        let append = match self.events.last() {
            None => true,
            Some(last) => last.priority >= entry.priority || self.insertion_offset >= len,
        };
        if append {
            self.events.push(entry);
        } else {
            let base = self.insertion_offset;
            let at = base
                + self.events[base..].partition_point(|queued| queued.priority >= entry.priority);
            self.events.insert(at, entry);
        }
    }

    /// Erase the consumed region below `start_offset`.
    ///
    /// Only full, unfiltered drains call this; partial drains hold local
    /// cursors that erasure would invalidate.
    pub(crate) fn compact(&mut self) {
        if self.start_offset == 0 {
            return;
        }
        self.events.drain(..self.start_offset);
        self.insertion_offset = self.insertion_offset.saturating_sub(self.start_offset);
        self.start_offset = 0;
    }
}

/// The per-thread posted-event queue: guarded state plus the drain recursion
/// depth tracked beside the mutex so unwinding paths can decrement it without
/// reacquiring the lock.
pub struct PostedEventList {
    state: Mutex<QueueState>,
    recursion: AtomicUsize,
}

impl PostedEventList {
    pub(crate) fn new(reserve: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                events: Vec::with_capacity(reserve),
                start_offset: 0,
                insertion_offset: 0,
            }),
            recursion: AtomicUsize::new(0),
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }

    pub(crate) fn enter_recursion(&self) {
        self.recursion.fetch_add(1, Ordering::AcqRel);
    }

    /// Returns the depth remaining after this exit
    pub(crate) fn leave_recursion(&self) -> usize {
        self.recursion.fetch_sub(1, Ordering::AcqRel) - 1
    }

    pub(crate) fn is_recursing(&self) -> bool {
        self.recursion.load(Ordering::Acquire) > 0
    }

    /// Advisory count of not-yet-consumed entries (includes cleared slots
    /// above `start_offset`; callers treat this as racy)
    pub fn pending_count(&self) -> usize {
        let state = self.state.lock();
        state.events.len().saturating_sub(state.start_offset)
    }

    /// Drop every queued payload and reset the offsets, fixing up receiver
    /// pending counters. Used when a thread context is released.
    pub(crate) fn clear_all(&self) -> usize {
        let mut dropped: Vec<Box<dyn Event>> = Vec::new();
        {
            let mut state = self.state.lock();
            for entry in state.events.iter_mut() {
                if let Some(payload) = entry.event.take() {
                    if let Some(receiver) = entry.receiver.upgrade() {
                        receiver.target_state().decrement_pending();
                    }
                    dropped.push(payload);
                }
            }
            state.events.clear();
            state.start_offset = 0;
            state.insertion_offset = 0;
        }
        self.recursion.store(0, Ordering::Release);
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "cleared undelivered posted events");
        }
        dropped.len()
    }
}
