//! Process-wide event filters: root-thread scope, install order, and removal.
//!
//! This file holds a single test so the test thread is guaranteed to be the
//! first (root) context established in the process.

mod common;

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use common::{as_target, LabelEvent, Recorder};
use dispatch_core::constants::{kinds, priority};
use dispatch_core::{
    install_global_event_filter, post_event, remove_global_event_filter, send_posted_events, Event,
    EventFilter, EventKind, EventTarget, ThreadContext,
};

struct Tagging {
    name: &'static str,
    seen: Arc<Mutex<Vec<String>>>,
    consume_kind: Option<EventKind>,
}

impl EventFilter for Tagging {
    fn event_filter(&self, _receiver: &Arc<dyn EventTarget>, event: &mut dyn Event) -> bool {
        self.seen.lock().push(format!("{}:{}", self.name, event.kind().0));
        self.consume_kind == Some(event.kind())
    }
}

#[test]
fn global_filters_scope_order_and_removal() {
    let context = ThreadContext::current();
    assert!(context.is_root(), "this test must own the root context");

    let seen = Arc::new(Mutex::new(Vec::new()));
    let blocked_kind = EventKind(kinds::USER.0 + 1);
    let open_kind = EventKind(kinds::USER.0 + 2);

    let older: Arc<dyn EventFilter> = Arc::new(Tagging {
        name: "older",
        seen: seen.clone(),
        consume_kind: Some(blocked_kind),
    });
    let newer: Arc<dyn EventFilter> = Arc::new(Tagging {
        name: "newer",
        seen: seen.clone(),
        consume_kind: None,
    });
    install_global_event_filter(&older);
    install_global_event_filter(&newer);

    let recorder = Recorder::new();
    let target = as_target(&recorder);

    post_event(&target, Box::new(LabelEvent::new(blocked_kind, "blocked")), priority::NORMAL)
        .unwrap();
    post_event(&target, Box::new(LabelEvent::new(open_kind, "allowed")), priority::NORMAL)
        .unwrap();
    send_posted_events(None, None);

    // the consumed event never reached the handler
    assert_eq!(recorder.log(), vec!["allowed"]);
    // most recently installed filter runs first; the consumer stops the chain
    assert_eq!(
        seen.lock().clone(),
        vec![
            format!("newer:{}", blocked_kind.0),
            format!("older:{}", blocked_kind.0),
            format!("newer:{}", open_kind.0),
            format!("older:{}", open_kind.0),
        ]
    );

    // receivers on non-root threads bypass process-wide filters entirely
    let (tx, rx) = mpsc::channel();
    let worker = thread::spawn(move || {
        let recorder = Recorder::new();
        let target = as_target(&recorder);
        post_event(&target, Box::new(LabelEvent::new(blocked_kind, "off root")), priority::NORMAL)
            .unwrap();
        send_posted_events(None, None);
        tx.send(recorder.log()).unwrap();
        ThreadContext::release_current();
    });
    assert_eq!(rx.recv().unwrap(), vec!["off root"]);
    worker.join().unwrap();

    // removal restores delivery on the root thread
    remove_global_event_filter(&older);
    seen.lock().clear();
    post_event(&target, Box::new(LabelEvent::new(blocked_kind, "unblocked")), priority::NORMAL)
        .unwrap();
    send_posted_events(None, None);
    assert_eq!(recorder.log(), vec!["allowed", "unblocked"]);
    assert_eq!(seen.lock().clone(), vec![format!("newer:{}", blocked_kind.0)]);
}
