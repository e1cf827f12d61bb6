//! Shared test fixtures: a recording event target and a labeled payload.
#![allow(dead_code)] // not every test binary uses every fixture

use std::sync::Arc;

use parking_lot::Mutex;

use dispatch_core::{Event, EventKind, EventTarget, TargetState};

/// Payload carrying a label so tests can assert delivery order
#[derive(Debug)]
pub struct LabelEvent {
    kind: EventKind,
    pub label: String,
}

impl LabelEvent {
    pub fn new(kind: EventKind, label: impl Into<String>) -> Self {
        Self {
            kind,
            label: label.into(),
        }
    }
}

impl Event for LabelEvent {
    fn kind(&self) -> EventKind {
        self.kind
    }
    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}

pub type EventHook = Box<dyn FnMut(&mut dyn Event) + Send>;

/// Event target that records the labels it receives, with an optional hook
/// run inside the handler (for re-posting and panic scenarios)
pub struct Recorder {
    state: TargetState,
    log: Mutex<Vec<String>>,
    hook: Mutex<Option<EventHook>>,
}

impl Recorder {
    pub fn new() -> Arc<Recorder> {
        Arc::new(Self {
            state: TargetState::new(),
            log: Mutex::new(Vec::new()),
            hook: Mutex::new(None),
        })
    }

    pub fn set_hook(&self, hook: EventHook) {
        *self.hook.lock() = Some(hook);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().clone()
    }
}

impl EventTarget for Recorder {
    fn target_state(&self) -> &TargetState {
        &self.state
    }

    fn event(&self, event: &mut dyn Event) -> bool {
        let label = event
            .as_any()
            .downcast_ref::<LabelEvent>()
            .map(|labeled| labeled.label.clone())
            .unwrap_or_else(|| format!("kind:{}", event.kind().0));
        self.log.lock().push(label);
        // The hook runs with the slot unlocked so it may deliver back into
        // this recorder re-entrantly; it is reinstalled afterwards unless it
        // installed a replacement. The take is a separate statement so the
        // guard drops before the hook runs.
        let taken = self.hook.lock().take();
        if let Some(mut hook) = taken {
            hook(event);
            let mut slot = self.hook.lock();
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
        true
    }
}

/// Upcast helper: most of the public API takes `&Arc<dyn EventTarget>`
pub fn as_target(recorder: &Arc<Recorder>) -> Arc<dyn EventTarget> {
    recorder.clone()
}
