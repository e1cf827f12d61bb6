//! # Thread Context
//!
//! Process-wide per-thread state for the dispatch core. Each OS thread that
//! participates in event delivery owns exactly one [`ThreadContext`] holding
//! its posted-event queue, a loop-depth counter, the `can_wait` flag consumed
//! by blocking dispatchers, and a wake primitive that any thread may signal.
//!
//! Contexts live in an explicit registry keyed by [`ThreadId`] rather than in
//! ad hoc statics: [`ThreadContext::current`] establishes (and caches) the
//! calling thread's context, and [`ThreadContext::release_current`] tears it
//! down when the thread stops, dropping any undelivered payloads. The first
//! context established becomes the root context; process-wide event filters
//! apply only to receivers living on the root thread.

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread::{self, ThreadId};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::config::DispatchConfig;
use crate::queue::PostedEventList;

struct ContextRegistry {
    contexts: DashMap<ThreadId, Arc<ThreadContext>>,
    root: OnceLock<ThreadId>,
}

static REGISTRY: OnceLock<ContextRegistry> = OnceLock::new();

fn registry() -> &'static ContextRegistry {
    REGISTRY.get_or_init(|| ContextRegistry {
        contexts: DashMap::new(),
        root: OnceLock::new(),
    })
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<ThreadContext>>> = const { RefCell::new(None) };
}

/// Per-thread dispatch state: one posted-event queue, the blocking-dispatcher
/// handshake, and the loop-depth counter behind the deferred-destroy gate.
pub struct ThreadContext {
    thread_id: ThreadId,
    queue: PostedEventList,
    /// True while the thread's dispatcher may block; any post or skipped
    /// entry clears it
    can_wait: AtomicBool,
    /// Nesting depth of event deliveries currently on this thread's stack
    loop_level: AtomicUsize,
    quit_requested: AtomicBool,
    wake_state: Mutex<bool>,
    wake_cond: Condvar,
}

impl ThreadContext {
    fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            queue: PostedEventList::new(DispatchConfig::get().queue_reserve),
            can_wait: AtomicBool::new(true),
            loop_level: AtomicUsize::new(0),
            quit_requested: AtomicBool::new(false),
            wake_state: Mutex::new(false),
            wake_cond: Condvar::new(),
        }
    }

    /// The calling thread's context, establishing and registering it on first
    /// use. The first thread to call this becomes the root context.
    pub fn current() -> Arc<ThreadContext> {
        CURRENT.with(|cell| {
            if let Some(context) = cell.borrow().as_ref() {
                return Arc::clone(context);
            }
            let context = Arc::new(ThreadContext::new(thread::current().id()));
            let registry = registry();
            registry.contexts.insert(context.thread_id, Arc::clone(&context));
            let is_root = registry.root.set(context.thread_id).is_ok();
            debug!(thread_id = ?context.thread_id, is_root, "thread context established");
            *cell.borrow_mut() = Some(Arc::clone(&context));
            context
        })
    }

    /// The calling thread's context if one has been established
    pub fn current_if_registered() -> Option<Arc<ThreadContext>> {
        CURRENT.with(|cell| cell.borrow().clone())
    }

    /// Look up another thread's context
    pub fn for_thread(thread_id: ThreadId) -> Option<Arc<ThreadContext>> {
        registry().contexts.get(&thread_id).map(|entry| Arc::clone(&entry))
    }

    /// Tear down the calling thread's context: unregister it and drop any
    /// undelivered posted events. Call when the thread's event loop stops.
    pub fn release_current() {
        let context = CURRENT.with(|cell| cell.borrow_mut().take());
        if let Some(context) = context {
            registry().contexts.remove(&context.thread_id);
            let dropped = context.queue.clear_all();
            debug!(thread_id = ?context.thread_id, dropped, "thread context released");
        }
    }

    pub fn thread_id(&self) -> ThreadId {
        self.thread_id
    }

    /// Whether this is the root (first-established) context
    pub fn is_root(&self) -> bool {
        registry().root.get() == Some(&self.thread_id)
    }

    pub(crate) fn queue(&self) -> &PostedEventList {
        &self.queue
    }

    /// Advisory count of not-yet-consumed entries in this thread's queue
    pub fn pending_event_count(&self) -> usize {
        self.queue.pending_count()
    }

    /// Current delivery nesting depth on this thread
    pub fn loop_level(&self) -> usize {
        self.loop_level.load(Ordering::Acquire)
    }

    pub(crate) fn enter_loop_level(&self) {
        self.loop_level.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn leave_loop_level(&self) {
        let previous = self.loop_level.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "loop-level counter underflow");
    }

    pub(crate) fn can_wait(&self) -> bool {
        self.can_wait.load(Ordering::Acquire)
    }

    pub(crate) fn set_can_wait(&self, value: bool) {
        self.can_wait.store(value, Ordering::Release);
    }

    /// Interrupt this thread's blocking dispatcher so it re-checks its queue.
    /// Callable from any thread; never blocks beyond the wake mutex.
    pub fn wake(&self) {
        let mut woken = self.wake_state.lock();
        *woken = true;
        self.wake_cond.notify_one();
    }

    /// Block until woken, until `timeout` elapses, or immediately if events
    /// are already pending. Returns true when the caller should drain.
    pub fn wait_for_events(&self, timeout: Duration) -> bool {
        let mut woken = self.wake_state.lock();
        if *woken {
            *woken = false;
            return true;
        }
        if !self.can_wait() {
            return true;
        }
        let result = self.wake_cond.wait_for(&mut woken, timeout);
        let signaled = *woken;
        *woken = false;
        signaled || !result.timed_out()
    }

    /// Ask this thread's event loop to stop; sets the flag and wakes the
    /// dispatcher
    pub fn request_quit(&self) {
        self.quit_requested.store(true, Ordering::Release);
        self.wake();
    }

    pub fn quit_requested(&self) -> bool {
        self.quit_requested.load(Ordering::Acquire)
    }

    pub fn reset_quit(&self) {
        self.quit_requested.store(false, Ordering::Release);
    }
}

impl std::fmt::Debug for ThreadContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadContext")
            .field("thread_id", &self.thread_id)
            .field("loop_level", &self.loop_level())
            .field("can_wait", &self.can_wait())
            .field("quit_requested", &self.quit_requested())
            .finish()
    }
}
