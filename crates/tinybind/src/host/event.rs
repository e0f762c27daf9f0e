use alloc::string::String;
use core::cell::Cell;

use super::NodeId;

/// Where an event is dispatched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventTarget {
    Window,
    Node(NodeId),
}

/// A dispatched or dispatchable event
#[derive(Debug)]
pub struct Event {
    event_type: String,
    cancelable: bool,
    target: Cell<Option<EventTarget>>,
    default_prevented: Cell<bool>,
}

impl Event {
    /// An event as created by module code, which cannot be canceled
    pub fn new(event_type: impl Into<String>) -> Self {
        Self { event_type: event_type.into(), cancelable: false, target: Cell::new(None), default_prevented: Cell::new(false) }
    }

    /// An event whose default action can be prevented, e.g. simulated user input
    pub fn cancelable(event_type: impl Into<String>) -> Self {
        Self { cancelable: true, ..Self::new(event_type) }
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The target of the last dispatch
    pub fn target(&self) -> Option<EventTarget> {
        self.target.get()
    }

    pub(crate) fn set_target(&self, target: EventTarget) {
        self.target.set(Some(target));
    }

    /// Only cancelable events record the request
    pub fn prevent_default(&self) {
        if self.cancelable {
            self.default_prevented.set(true);
        }
    }

    pub fn default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}
