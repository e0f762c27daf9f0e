use alloc::collections::BTreeMap;
use log::trace;

use crate::closure::HostClosure;

/// Timers on a virtual clock
///
/// Time only moves when the embedder advances it; timers due at the same
/// instant fire in the order they were scheduled.
#[derive(Debug, Default)]
pub struct Timers {
    now: u64,
    next_id: i32,
    pending: BTreeMap<(u64, i32), HostClosure>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Milliseconds since the clock started
    pub fn now(&self) -> u64 {
        self.now
    }

    /// Schedule `callback` after `delay` milliseconds, returning a positive id
    pub fn set_timeout(&mut self, callback: HostClosure, delay: i32) -> i32 {
        self.next_id += 1;
        let due = self.now + delay.max(0) as u64;
        trace!("timer {} due at {due}", self.next_id);
        self.pending.insert((due, self.next_id), callback);
        self.next_id
    }

    /// Cancel a timer. Unknown ids are ignored.
    pub fn clear_timeout(&mut self, id: i32) {
        self.pending.retain(|(_, timer), _| *timer != id);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Take the next timer due at or before `until`, moving the clock to it
    ///
    /// Callbacks may schedule further timers, so the caller should fire
    /// timers one at a time.
    pub fn next_due(&mut self, until: u64) -> Option<(i32, HostClosure)> {
        let (&(due, id), _) = self.pending.first_key_value()?;
        if due > until {
            return None;
        }

        let callback = self.pending.remove(&(due, id))?;
        self.now = self.now.max(due);
        Some((id, callback))
    }

    /// Move the clock forward without firing anything
    pub fn advance_clock(&mut self, until: u64) {
        self.now = self.now.max(until);
    }
}
