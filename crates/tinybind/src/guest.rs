use alloc::{format, vec::Vec};
use tinywasm::types::WasmValue;
use tinywasm::{FuncContext, ModuleInstance, Store};

use crate::{Error, Result};

/// Size of a WebAssembly page in bytes
pub const PAGE_SIZE: usize = 65536;

/// Identity of a linear memory's backing buffer
///
/// Two snapshots with the same id refer to the same buffer. Growing a memory
/// replaces its buffer, so the id changes with every growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct BufferId(pub u64);

/// A snapshot of a linear memory's backing buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferInfo {
    /// Identity of the buffer
    pub id: BufferId,
    /// Length of the buffer in bytes
    pub byte_len: usize,
    /// Whether the buffer has been detached from the memory
    pub detached: bool,
}

impl BufferInfo {
    /// Describe a WebAssembly memory with the given number of pages
    ///
    /// WebAssembly memories never shrink, so the page count identifies the buffer.
    pub fn from_pages(pages: usize) -> Self {
        Self { id: BufferId(pages as u64), byte_len: pages * PAGE_SIZE, detached: false }
    }
}

/// An instantiated module, seen from the host
///
/// Everything the marshaling layer needs from the module goes through this
/// trait: the identity and length of its memory, raw reads and writes, and
/// calls to its exports. Calls may re-enter the host.
pub trait Guest {
    /// Snapshot of the current memory buffer
    fn buffer(&mut self) -> Result<BufferInfo>;

    /// Copy `len` bytes starting at `offset` out of linear memory
    fn read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>>;

    /// Copy `data` into linear memory at `offset`
    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()>;

    /// Call an exported function
    fn call(&mut self, export: &str, args: &[WasmValue]) -> Result<Vec<WasmValue>>;

    /// Whether the module exports a function with the given name
    fn has_export(&self, export: &str) -> bool;

    /// Call an exported function returning a single `i32`
    fn call_i32(&mut self, export: &str, args: &[WasmValue]) -> Result<i32> {
        match self.call(export, args)?.as_slice() {
            [WasmValue::I32(value)] => Ok(*value),
            other => Err(Error::InvalidResult(format!("{export} returned {other:?}, expected a single i32"))),
        }
    }
}

/// A module driven from the embedder, outside of any host call
pub struct InstanceGuest<'a> {
    store: &'a mut Store,
    instance: &'a ModuleInstance,
    memory: &'a str,
}

impl<'a> InstanceGuest<'a> {
    /// Create a guest over an instance and the store it lives in
    pub fn new(store: &'a mut Store, instance: &'a ModuleInstance, memory: &'a str) -> Self {
        Self { store, instance, memory }
    }
}

impl Guest for InstanceGuest<'_> {
    fn buffer(&mut self) -> Result<BufferInfo> {
        let mut memory = self.instance.exported_memory_mut(&mut *self.store, self.memory)?;
        Ok(BufferInfo::from_pages(memory.page_count()))
    }

    fn read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let memory = self.instance.exported_memory_mut(&mut *self.store, self.memory)?;
        Ok(memory.load_vec(offset, len)?)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let mut memory = self.instance.exported_memory_mut(&mut *self.store, self.memory)?;
        Ok(memory.store(offset, data.len(), data)?)
    }

    fn call(&mut self, export: &str, args: &[WasmValue]) -> Result<Vec<WasmValue>> {
        let func = self.instance.exported_func_untyped(&*self.store, export)?;
        Ok(func.call(&mut *self.store, args)?)
    }

    fn has_export(&self, export: &str) -> bool {
        self.instance.exported_func_untyped(&*self.store, export).is_ok()
    }
}

/// A module seen from inside one of its imports
pub struct CallerGuest<'a, 's> {
    ctx: FuncContext<'a>,
    instance: ModuleInstance,
    memory: &'s str,
}

impl<'a, 's> CallerGuest<'a, 's> {
    /// Wrap the context tinywasm hands to a host function
    pub fn new(ctx: FuncContext<'a>, memory: &'s str) -> Self {
        let instance = ctx.module().clone();
        Self { ctx, instance, memory }
    }
}

impl Guest for CallerGuest<'_, '_> {
    fn buffer(&mut self) -> Result<BufferInfo> {
        let mut memory = self.ctx.exported_memory_mut(self.memory)?;
        Ok(BufferInfo::from_pages(memory.page_count()))
    }

    fn read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let memory = self.ctx.exported_memory_mut(self.memory)?;
        Ok(memory.load_vec(offset, len)?)
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let mut memory = self.ctx.exported_memory_mut(self.memory)?;
        Ok(memory.store(offset, data.len(), data)?)
    }

    fn call(&mut self, export: &str, args: &[WasmValue]) -> Result<Vec<WasmValue>> {
        let func = self.instance.exported_func_untyped(self.ctx.store(), export)?;
        Ok(func.call(self.ctx.store_mut(), args)?)
    }

    fn has_export(&self, export: &str) -> bool {
        self.instance.exported_func_untyped(self.ctx.store(), export).is_ok()
    }
}
