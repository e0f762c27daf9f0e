//! An in-process stand-in for an instantiated module, used by unit tests.

use alloc::{format, rc::Rc, string::String, vec, vec::Vec};
use std::collections::HashMap;
use tinywasm::types::WasmValue;

use crate::guest::{BufferId, BufferInfo, Guest, PAGE_SIZE};
use crate::{Error, Result};

type Handler = Rc<dyn Fn(&mut MockGuest, &[WasmValue]) -> Result<Vec<WasmValue>>>;

pub(crate) struct MockGuest {
    pub(crate) memory: Vec<u8>,
    pub(crate) generation: u64,
    pub(crate) detached: bool,
    pub(crate) next: usize,
    pub(crate) calls: Vec<(String, Vec<WasmValue>)>,
    exports: HashMap<String, Handler>,
}

impl MockGuest {
    /// A guest with a bump allocator exported as `__wbindgen_malloc`/`__wbindgen_realloc`
    pub(crate) fn new(pages: usize) -> Self {
        let mut guest = Self {
            memory: vec![0; pages * PAGE_SIZE],
            generation: 0,
            detached: false,
            next: 8,
            calls: Vec::new(),
            exports: HashMap::new(),
        };

        guest.export("__wbindgen_malloc", |guest, args| {
            let size = arg(args, 0)? as usize;
            Ok(vec![WasmValue::I32(guest.bump(size) as i32)])
        });

        guest.export("__wbindgen_realloc", |guest, args| {
            let (ptr, old, new) = (arg(args, 0)? as usize, arg(args, 1)? as usize, arg(args, 2)? as usize);
            let dst = guest.bump(new);
            let keep = old.min(new);
            guest.memory.copy_within(ptr..ptr + keep, dst);
            Ok(vec![WasmValue::I32(dst as i32)])
        });

        guest
    }

    pub(crate) fn without_realloc(mut self) -> Self {
        self.exports.remove("__wbindgen_realloc");
        self
    }

    pub(crate) fn export(
        &mut self,
        name: &str,
        handler: impl Fn(&mut MockGuest, &[WasmValue]) -> Result<Vec<WasmValue>> + 'static,
    ) -> &mut Self {
        self.exports.insert(name.into(), Rc::new(handler));
        self
    }

    /// Grow the memory, replacing its buffer
    pub(crate) fn grow(&mut self, pages: usize) {
        self.memory.resize(self.memory.len() + pages * PAGE_SIZE, 0);
        self.generation += 1;
    }

    pub(crate) fn count(&self, name: &str) -> usize {
        self.calls.iter().filter(|(export, _)| export == name).count()
    }

    fn bump(&mut self, size: usize) -> usize {
        let ptr = self.next;
        self.next += size.max(1);
        if self.next > self.memory.len() {
            let missing = self.next - self.memory.len();
            self.grow(missing.div_ceil(PAGE_SIZE));
        }
        ptr
    }
}

pub(crate) fn arg(args: &[WasmValue], idx: usize) -> Result<i32> {
    match args.get(idx) {
        Some(WasmValue::I32(value)) => Ok(*value),
        other => Err(Error::InvalidResult(format!("argument {idx} is {other:?}"))),
    }
}

impl Guest for MockGuest {
    fn buffer(&mut self) -> Result<BufferInfo> {
        Ok(BufferInfo { id: BufferId(self.generation), byte_len: self.memory.len(), detached: self.detached })
    }

    fn read(&mut self, offset: usize, len: usize) -> Result<Vec<u8>> {
        let max = self.memory.len();
        self.memory.get(offset..offset + len).map(<[u8]>::to_vec).ok_or(Error::OutOfBounds { offset, len, max })
    }

    fn write(&mut self, offset: usize, data: &[u8]) -> Result<()> {
        let max = self.memory.len();
        let len = data.len();
        let dst = self.memory.get_mut(offset..offset + len).ok_or(Error::OutOfBounds { offset, len, max })?;
        dst.copy_from_slice(data);
        Ok(())
    }

    fn call(&mut self, export: &str, args: &[WasmValue]) -> Result<Vec<WasmValue>> {
        let handler = self.exports.get(export).cloned().ok_or_else(|| Error::MissingExport(export.into()))?;
        self.calls.push((export.into(), args.to_vec()));
        handler(self, args)
    }

    fn has_export(&self, export: &str) -> bool {
        self.exports.contains_key(export)
    }
}
