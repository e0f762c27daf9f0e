//! Moving text across the module boundary.
//!
//! Strings live in linear memory as UTF-8 `(ptr, len)` slices allocated by
//! the module's own allocator. The host never frees them.

use alloc::string::String;
use core::cell::Cell;
use log::debug;
use tinywasm::types::WasmValue;

use crate::guest::Guest;
use crate::memory::{MemoryViews, offset_by};
use crate::Result;

/// Decoded bytes after which the decoder is recycled
pub const MAX_DECODE_BYTES: usize = 2_146_435_072;

/// A string written into linear memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Encoded {
    /// Start of the allocation
    pub ptr: u32,
    /// Number of bytes written
    pub len: u32,
    /// How often the allocation was resized while encoding
    pub reallocations: u32,
}

/// The module exports used to allocate string storage
#[derive(Debug, Clone, Copy)]
pub struct Allocator<'a> {
    /// `malloc(size, align) -> ptr`
    pub malloc: &'a str,
    /// `realloc(ptr, old_size, new_size, align) -> ptr`
    pub realloc: Option<&'a str>,
}

impl<'a> Allocator<'a> {
    /// Use `realloc` only if the module exports it
    pub fn detect<G: Guest + ?Sized>(guest: &G, malloc: &'a str, realloc: &'a str) -> Self {
        Self { malloc, realloc: guest.has_export(realloc).then_some(realloc) }
    }

    fn malloc<G: Guest + ?Sized>(&self, guest: &mut G, size: usize) -> Result<u32> {
        Ok(guest.call_i32(self.malloc, &[WasmValue::I32(size as i32), WasmValue::I32(1)])? as u32)
    }

    fn realloc<G: Guest + ?Sized>(&self, guest: &mut G, realloc: &str, ptr: u32, old: usize, new: usize) -> Result<u32> {
        let args = [WasmValue::I32(ptr as i32), WasmValue::I32(old as i32), WasmValue::I32(new as i32), WasmValue::I32(1)];
        Ok(guest.call_i32(realloc, &args)? as u32)
    }
}

/// Write `text` into freshly allocated module memory
///
/// Without `realloc` the exact byte length is allocated up front. With it,
/// one byte per character is allocated and the ASCII prefix is copied; the
/// first non-ASCII character triggers a single reallocation to the final
/// length.
pub fn encode<G: Guest + ?Sized>(guest: &mut G, views: &MemoryViews, text: &str, alloc: &Allocator<'_>) -> Result<Encoded> {
    let Some(realloc) = alloc.realloc else {
        let ptr = alloc.malloc(guest, text.len())?;
        views.bytes(guest)?.write(guest, ptr, text.as_bytes())?;
        return Ok(Encoded { ptr, len: text.len() as u32, reallocations: 0 });
    };

    let reserved = text.chars().count();
    let mut ptr = alloc.malloc(guest, reserved)?;

    let ascii = text.bytes().take_while(u8::is_ascii).count();
    views.bytes(guest)?.write(guest, ptr, &text.as_bytes()[..ascii])?;

    if ascii == text.len() {
        return Ok(Encoded { ptr, len: ascii as u32, reallocations: 0 });
    }

    let rest = &text[ascii..];
    ptr = alloc.realloc(guest, realloc, ptr, reserved, text.len())?;
    // the allocator may have grown memory, the view is re-derived
    views.bytes(guest)?.write(guest, offset_by(ptr, ascii as u32)?, rest.as_bytes())?;
    Ok(Encoded { ptr, len: text.len() as u32, reallocations: 1 })
}

/// Write an optional string and store its `(ptr, len)` pair at `ret`
///
/// `None` is written as a null pointer with length 0.
pub fn write_string_ret<G: Guest + ?Sized>(
    guest: &mut G,
    views: &MemoryViews,
    ret: u32,
    text: Option<&str>,
    alloc: &Allocator<'_>,
) -> Result<()> {
    let encoded = match text {
        Some(text) => encode(guest, views, text, alloc)?,
        None => Encoded { ptr: 0, len: 0, reallocations: 0 },
    };

    let words = views.words(guest)?;
    words.set_i32(guest, offset_by(ret, 4)?, encoded.len as i32)?;
    words.set_i32(guest, ret, encoded.ptr as i32)
}

/// A fatal, BOM-preserving UTF-8 decoder
///
/// Tracks how many bytes it has decoded and starts a new generation once a
/// ceiling is crossed.
#[derive(Debug)]
pub struct Utf8Decoder {
    decoded: Cell<usize>,
    generation: Cell<u32>,
    ceiling: usize,
}

impl Default for Utf8Decoder {
    fn default() -> Self {
        Self::new(MAX_DECODE_BYTES)
    }
}

impl Utf8Decoder {
    pub fn new(ceiling: usize) -> Self {
        Self { decoded: Cell::new(0), generation: Cell::new(0), ceiling }
    }

    /// Decode the string slice `(ptr, len)`
    pub fn decode<G: Guest + ?Sized>(&self, guest: &mut G, views: &MemoryViews, ptr: u32, len: usize) -> Result<String> {
        let bytes = views.bytes(guest)?.read(guest, ptr, len)?;
        self.decode_bytes(bytes)
    }

    /// Decode raw bytes, failing on invalid UTF-8
    pub fn decode_bytes(&self, bytes: alloc::vec::Vec<u8>) -> Result<String> {
        let decoded = self.decoded.get().saturating_add(bytes.len());
        if decoded >= self.ceiling {
            self.generation.set(self.generation.get() + 1);
            debug!("recycling utf-8 decoder after {decoded} bytes (generation {})", self.generation.get());
            self.decoded.set(bytes.len());
        } else {
            self.decoded.set(decoded);
        }

        Ok(String::from_utf8(bytes)?)
    }

    /// Bytes decoded by the current generation
    pub fn decoded(&self) -> usize {
        self.decoded.get()
    }

    /// How often the decoder was recycled
    pub fn generation(&self) -> u32 {
        self.generation.get()
    }
}
