use alloc::{rc::Rc, string::String};
use core::cell::Cell;
use log::debug;
use tinywasm::types::WasmValue;

use crate::closure::{ClosureRegistry, HostClosure};
use crate::guest::Guest;
use crate::heap::{ExternrefTable, UNDEFINED};
use crate::host::{Event, EventTarget, Host, NodeId};
use crate::memory::MemoryViews;
use crate::string::{Allocator, Encoded, Utf8Decoder, encode, write_string_ret};
use crate::value::HostValue;
use crate::{Config, Error, HostError, Result};

/// State shared between the embedder and every host function of one module
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) config: Config,
    pub(crate) views: MemoryViews,
    pub(crate) decoder: Utf8Decoder,
    pub(crate) table: ExternrefTable,
    pub(crate) closures: ClosureRegistry,
    pub(crate) host: Host,
    has_realloc: Cell<Option<bool>>,
}

impl Shared {
    pub(crate) fn new(config: Config) -> Result<Self> {
        Ok(Self {
            views: MemoryViews::new(),
            decoder: Utf8Decoder::new(config.decode_ceiling),
            table: ExternrefTable::new(),
            closures: ClosureRegistry::new(),
            host: Host::new(&config)?,
            has_realloc: Cell::new(None),
            config,
        })
    }

    /// Forget everything derived from a previous instance
    pub(crate) fn reset(&self) {
        self.views.invalidate();
        self.has_realloc.set(None);
        self.table.clear();
        self.closures.forget();
    }

    /// Throw away a failed instance together with the page it built
    pub(crate) fn discard(&self) -> Result<()> {
        self.reset();
        self.host.reset_page(&self.config)
    }

    pub(crate) fn allocator<G: Guest + ?Sized>(&self, guest: &G) -> Allocator<'_> {
        let exports = &self.config.exports;
        let has_realloc = match self.has_realloc.get() {
            Some(has_realloc) => has_realloc,
            None => {
                let has_realloc = guest.has_export(&exports.realloc);
                self.has_realloc.set(Some(has_realloc));
                has_realloc
            }
        };

        Allocator { malloc: &exports.malloc, realloc: has_realloc.then_some(exports.realloc.as_str()) }
    }

    pub(crate) fn string<G: Guest + ?Sized>(&self, guest: &mut G, ptr: i32, len: i32) -> Result<String> {
        self.decoder.decode(guest, &self.views, ptr as u32, len as usize)
    }

    pub(crate) fn encode<G: Guest + ?Sized>(&self, guest: &mut G, text: &str) -> Result<Encoded> {
        let alloc = self.allocator(guest);
        encode(guest, &self.views, text, &alloc)
    }

    pub(crate) fn write_string_ret<G: Guest + ?Sized>(&self, guest: &mut G, ret: i32, text: Option<&str>) -> Result<()> {
        let alloc = self.allocator(guest);
        write_string_ret(guest, &self.views, ret as u32, text, &alloc)
    }

    pub(crate) fn put<G: Guest + ?Sized>(&self, guest: &mut G, value: HostValue) -> Result<i32> {
        Ok(self.table.add(guest, &self.config.exports.table_alloc, value)? as i32)
    }

    pub(crate) fn value(&self, handle: i32) -> Result<HostValue> {
        self.table.get(handle as u32)
    }

    /// Hand a host exception to the module
    pub(crate) fn store_exception<G: Guest + ?Sized>(&self, guest: &mut G, err: HostError) -> Result<()> {
        debug!("storing exception: {err}");
        let idx = self.put(guest, HostValue::Error(err))?;
        guest.call(&self.config.exports.exn_store, &[WasmValue::I32(idx)])?;
        Ok(())
    }

    /// Call a closure with a host value as its argument
    pub(crate) fn call_closure<G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        closure: &HostClosure,
        arg: Option<HostValue>,
    ) -> Result<()> {
        let arg = match arg {
            Some(value) => self.put(guest, value)?,
            None => UNDEFINED as i32,
        };
        closure.invoke(guest, &[WasmValue::I32(arg)])?;
        Ok(())
    }

    /// Dispatch an event, returning `false` if a listener prevented its default action
    pub(crate) fn dispatch<G: Guest + ?Sized>(&self, guest: &mut G, target: EventTarget, event: Rc<Event>) -> Result<bool> {
        if let EventTarget::Node(node) = target {
            self.host.document().check(node)?;
        }

        event.set_target(target);
        let listeners = self.host.document().event_path(target, event.event_type());
        debug!("dispatching '{}' to {} listeners", event.event_type(), listeners.len());

        for listener in listeners {
            match self.call_closure(guest, &listener, Some(HostValue::Event(event.clone()))) {
                Err(Error::ClosureDestroyed) => debug!("skipping destroyed listener"),
                other => other?,
            }
        }

        Ok(!event.default_prevented())
    }

    /// Advance the virtual clock, firing every timer that comes due
    pub(crate) fn advance_timers<G: Guest + ?Sized>(&self, guest: &mut G, ms: u64) -> Result<usize> {
        let until = self.host.timers().now() + ms;
        let mut fired = 0;

        loop {
            // the timers borrow ends before the callback can schedule new ones
            let Some((id, callback)) = self.host.timers_mut().next_due(until) else {
                break;
            };

            debug!("firing timer {id}");
            self.call_closure(guest, &callback, None)?;
            fired += 1;
        }

        self.host.timers_mut().advance_clock(until);
        Ok(fired)
    }

    /// Move a node in or out of the viewport, notifying observers
    pub(crate) fn set_intersecting<G: Guest + ?Sized>(&self, guest: &mut G, node: NodeId, intersecting: bool) -> Result<usize> {
        self.host.document().check(node)?;
        let notified = self.host.observers_mut().set_intersecting(node, intersecting);
        let count = notified.len();
        for (callback, entry) in notified {
            self.call_closure(guest, &callback, Some(HostValue::ObserverEntry(entry)))?;
        }
        Ok(count)
    }
}
