//! The external reference table.
//!
//! Modules cannot store host values in linear memory, so they hold small
//! integer handles into this table instead. Slot indices are chosen by the
//! module (`__externref_table_alloc`, which keeps the free list); the host
//! only grows the table on request and stores values.

use alloc::vec::Vec;
use core::cell::RefCell;
use log::trace;
use tinywasm::types::WasmValue;

use crate::guest::Guest;
use crate::value::HostValue;
use crate::{Error, Result};

/// Handles below this index are preloaded and never hold application values
///
/// `0` is "no value", followed by `undefined`, `null`, `true` and `false`.
pub const RESERVED_HANDLES: u32 = 5;

/// Handle of the preloaded `undefined`
pub const UNDEFINED: u32 = 1;
/// Handle of the preloaded `null`
pub const NULL: u32 = 2;
/// Handle of the preloaded `true`
pub const TRUE: u32 = 3;
/// Handle of the preloaded `false`
pub const FALSE: u32 = 4;

#[derive(Debug)]
pub struct ExternrefTable {
    slots: RefCell<Vec<Option<HostValue>>>,
}

impl Default for ExternrefTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ExternrefTable {
    /// A table with a single empty slot, like a freshly instantiated module's
    pub fn new() -> Self {
        Self { slots: RefCell::new(alloc::vec![None]) }
    }

    /// Drop every slot, leaving the table as a fresh instance would
    pub fn clear(&self) {
        *self.slots.borrow_mut() = alloc::vec![None];
    }

    /// Number of slots, live or not
    pub fn len(&self) -> usize {
        self.slots.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.borrow().is_empty()
    }

    /// Number of slots holding application values
    pub fn live(&self) -> usize {
        self.slots.borrow().iter().skip(RESERVED_HANDLES as usize).filter(|slot| slot.is_some()).count()
    }

    /// Grow the table by `delta` empty slots, returning the previous length
    pub fn grow(&self, delta: u32) -> u32 {
        let mut slots = self.slots.borrow_mut();
        let previous = slots.len();
        slots.resize(previous + delta as usize, None);
        trace!("externref table grown by {delta} to {}", slots.len());
        previous as u32
    }

    /// Seed the reserved slots
    pub fn init(&self) {
        let offset = self.grow(4) as usize;
        let mut slots = self.slots.borrow_mut();
        slots[0] = Some(HostValue::Undefined);
        slots[offset] = Some(HostValue::Undefined);
        slots[offset + 1] = Some(HostValue::Null);
        slots[offset + 2] = Some(HostValue::Bool(true));
        slots[offset + 3] = Some(HostValue::Bool(false));
    }

    /// Store a value in an existing slot
    pub fn set(&self, idx: u32, value: HostValue) -> Result<()> {
        let mut slots = self.slots.borrow_mut();
        let slot = slots.get_mut(idx as usize).ok_or(Error::InvalidHandle(idx))?;
        *slot = Some(value);
        Ok(())
    }

    /// Clone the value behind a handle
    pub fn get(&self, idx: u32) -> Result<HostValue> {
        self.slots.borrow().get(idx as usize).cloned().flatten().ok_or(Error::InvalidHandle(idx))
    }

    /// Ask the module for a slot and store `value` there
    ///
    /// No borrow of the table is held while the module runs, since its
    /// allocator may call back to grow the table.
    pub fn add<G: Guest + ?Sized>(&self, guest: &mut G, alloc: &str, value: HostValue) -> Result<u32> {
        let idx = guest.call_i32(alloc, &[])? as u32;
        if idx < RESERVED_HANDLES {
            return Err(Error::ReservedHandle(idx));
        }

        self.set(idx, value)?;
        trace!("externref {idx} allocated");
        Ok(idx)
    }

    /// Clear a slot the module released. Reserved handles are ignored.
    pub fn drop_handle(&self, idx: u32) {
        if idx < RESERVED_HANDLES {
            return;
        }

        if let Some(slot) = self.slots.borrow_mut().get_mut(idx as usize) {
            *slot = None;
        }
    }

    /// The argument for passing a handle to the module
    pub fn arg(idx: u32) -> WasmValue {
        WasmValue::I32(idx as i32)
    }
}
