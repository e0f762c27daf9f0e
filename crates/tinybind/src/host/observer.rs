use alloc::vec::Vec;
use std::collections::HashMap;

use super::NodeId;
use crate::closure::HostClosure;

/// Identifies an intersection observer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObserverId(u32);

/// A change in a target's intersection with the viewport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObserverEntry {
    pub target: NodeId,
    pub is_intersecting: bool,
}

#[derive(Debug)]
struct Observer {
    callback: HostClosure,
    targets: Vec<NodeId>,
    threshold: f64,
}

/// Intersection observers over a viewport the embedder controls
#[derive(Debug, Default)]
pub struct Observers {
    observers: Vec<Observer>,
    intersecting: HashMap<NodeId, bool>,
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create(&mut self, callback: HostClosure) -> ObserverId {
        self.observers.push(Observer { callback, targets: Vec::new(), threshold: 0.0 });
        ObserverId(self.observers.len() as u32 - 1)
    }

    pub fn set_threshold(&mut self, observer: ObserverId, threshold: f64) {
        if let Some(observer) = self.observers.get_mut(observer.0 as usize) {
            observer.threshold = threshold;
        }
    }

    pub fn threshold(&self, observer: ObserverId) -> Option<f64> {
        self.observers.get(observer.0 as usize).map(|o| o.threshold)
    }

    /// Start watching `target`; observing a target twice has no effect
    pub fn observe(&mut self, observer: ObserverId, target: NodeId) {
        if let Some(observer) = self.observers.get_mut(observer.0 as usize) {
            if !observer.targets.contains(&target) {
                observer.targets.push(target);
            }
        }
    }

    pub fn unobserve(&mut self, observer: ObserverId, target: NodeId) {
        if let Some(observer) = self.observers.get_mut(observer.0 as usize) {
            observer.targets.retain(|t| *t != target);
        }
    }

    pub fn is_intersecting(&self, target: NodeId) -> bool {
        self.intersecting.get(&target).copied().unwrap_or(false)
    }

    /// Record a target entering or leaving the viewport
    ///
    /// Returns the callbacks to notify, which is nothing if the state did
    /// not change.
    pub fn set_intersecting(&mut self, target: NodeId, intersecting: bool) -> Vec<(HostClosure, ObserverEntry)> {
        if self.is_intersecting(target) == intersecting {
            return Vec::new();
        }
        self.intersecting.insert(target, intersecting);

        let entry = ObserverEntry { target, is_intersecting: intersecting };
        self.observers
            .iter()
            .filter(|observer| observer.targets.contains(&target))
            .map(|observer| (observer.callback.clone(), entry))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::closure::{ClosureRegistry, GuestFn};
    use crate::host::Document;

    #[test]
    fn only_changes_notify_observers() {
        let registry = ClosureRegistry::new();
        let mut doc = Document::new();
        let (a, b) = (doc.create_element("div").unwrap(), doc.create_element("div").unwrap());

        let mut observers = Observers::new();
        let id = observers.create(registry.wrap(1, 0, GuestFn::new("dtor"), GuestFn::new("invoke")));
        observers.observe(id, a);
        observers.observe(id, a);

        let notified = observers.set_intersecting(a, true);
        assert_eq!(notified.len(), 1);
        assert_eq!(notified[0].1, ObserverEntry { target: a, is_intersecting: true });
        assert!(observers.set_intersecting(a, true).is_empty());
        assert!(observers.set_intersecting(b, true).is_empty());
        assert!(observers.is_intersecting(b));

        observers.unobserve(id, a);
        assert!(observers.set_intersecting(a, false).is_empty());
    }
}
