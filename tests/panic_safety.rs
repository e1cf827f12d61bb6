//! A panicking handler must not corrupt the queue: counters unwind, the
//! in-flight payload is freed, and the next drain picks up where the failed
//! one stopped.

mod common;

use std::panic::{catch_unwind, AssertUnwindSafe};

use common::{as_target, LabelEvent, Recorder};
use dispatch_core::constants::{kinds, priority};
use dispatch_core::{post_event, send_posted_events, EventTarget, ThreadContext};

#[test]
fn handler_panic_unwinds_counters_and_frees_the_payload() {
    let recorder = Recorder::new();
    recorder.set_hook(Box::new(|event| {
        let is_boom = event
            .as_any()
            .downcast_ref::<LabelEvent>()
            .is_some_and(|labeled| labeled.label == "boom");
        if is_boom {
            panic!("handler exploded");
        }
    }));
    let target = as_target(&recorder);

    post_event(&target, Box::new(LabelEvent::new(kinds::USER, "boom")), priority::NORMAL).unwrap();
    post_event(&target, Box::new(LabelEvent::new(kinds::USER, "after")), priority::NORMAL)
        .unwrap();

    let outcome = catch_unwind(AssertUnwindSafe(|| send_posted_events(None, None)));
    assert!(outcome.is_err(), "the handler panic must propagate to the drain caller");

    let context = ThreadContext::current();
    assert_eq!(context.loop_level(), 0, "loop depth must unwind");
    assert_eq!(
        recorder.target_state().pending_event_count(),
        1,
        "the in-flight payload was consumed, the queued one remains"
    );

    // the queue is still usable and delivers the survivor
    send_posted_events(None, None);
    assert_eq!(recorder.log(), vec!["boom", "after"]);
    assert_eq!(recorder.target_state().pending_event_count(), 0);
}
