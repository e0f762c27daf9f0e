//! Cached views over a module's linear memory.
//!
//! A view remembers the buffer it was derived from. Before every use the
//! cache compares that buffer with the live one and re-derives the view when
//! the memory has grown (or was detached), so a view never describes a stale
//! buffer.

use alloc::vec::Vec;
use core::cell::Cell;
use log::trace;

use crate::guest::{BufferId, BufferInfo, Guest};
use crate::{Error, Result};

/// A view derived from a snapshot of the memory buffer
pub trait DerivedView: Copy {
    /// Build a view over the given buffer
    fn derive(info: &BufferInfo) -> Self;

    /// Whether the view no longer describes the live buffer
    fn is_stale(&self, info: &BufferInfo) -> bool;
}

/// A cached [`DerivedView`], re-derived whenever its staleness check fails
#[derive(Debug)]
pub struct ViewCache<V: DerivedView> {
    cached: Cell<Option<V>>,
    rebuilds: Cell<u64>,
}

impl<V: DerivedView> Default for ViewCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: DerivedView> ViewCache<V> {
    pub fn new() -> Self {
        Self { cached: Cell::new(None), rebuilds: Cell::new(0) }
    }

    /// Get a view over the live buffer
    pub fn get<G: Guest + ?Sized>(&self, guest: &mut G) -> Result<V> {
        let info = guest.buffer()?;
        match self.cached.get() {
            Some(view) if !view.is_stale(&info) => Ok(view),
            _ => {
                trace!("rebuilding memory view: buffer={:?}, len={}", info.id, info.byte_len);
                let view = V::derive(&info);
                self.cached.set(Some(view));
                self.rebuilds.set(self.rebuilds.get() + 1);
                Ok(view)
            }
        }
    }

    /// Drop the cached view
    pub fn invalidate(&self) {
        self.cached.set(None);
    }

    /// How often the view has been derived
    pub fn rebuilds(&self) -> u64 {
        self.rebuilds.get()
    }
}

/// A byte-addressed view over linear memory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteView {
    buffer: BufferId,
    len: usize,
}

impl DerivedView for ByteView {
    fn derive(info: &BufferInfo) -> Self {
        Self { buffer: info.id, len: info.byte_len }
    }

    fn is_stale(&self, info: &BufferInfo) -> bool {
        self.len == 0 || self.buffer != info.id || self.len != info.byte_len
    }
}

impl ByteView {
    /// Length of the viewed buffer in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Copy a range out of linear memory
    pub fn read<G: Guest + ?Sized>(&self, guest: &mut G, offset: u32, len: usize) -> Result<Vec<u8>> {
        let offset = check_bounds(self.len, offset, len)?;
        guest.read(offset, len)
    }

    /// Copy `data` into linear memory at `offset`
    pub fn write<G: Guest + ?Sized>(&self, guest: &mut G, offset: u32, data: &[u8]) -> Result<()> {
        let offset = check_bounds(self.len, offset, data.len())?;
        guest.write(offset, data)
    }
}

/// A view for fixed-width little-endian values at arbitrary byte offsets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordView {
    buffer: BufferId,
    len: usize,
}

impl DerivedView for WordView {
    fn derive(info: &BufferInfo) -> Self {
        Self { buffer: info.id, len: info.byte_len }
    }

    fn is_stale(&self, info: &BufferInfo) -> bool {
        info.detached || self.buffer != info.id || self.len != info.byte_len
    }
}

impl WordView {
    /// Length of the viewed buffer in bytes
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Load a value from memory
    pub fn get<const N: usize, T: MemLoadable<N>, G: Guest + ?Sized>(&self, guest: &mut G, offset: u32) -> Result<T> {
        let offset = check_bounds(self.len, offset, N)?;
        let bytes = guest.read(offset, N)?;
        let bytes: [u8; N] =
            bytes.try_into().map_err(|_| Error::OutOfBounds { offset, len: N, max: self.len })?;
        Ok(T::from_le_bytes(bytes))
    }

    /// Store a value in memory
    pub fn set<const N: usize, T: MemStorable<N>, G: Guest + ?Sized>(
        &self,
        guest: &mut G,
        offset: u32,
        value: T,
    ) -> Result<()> {
        let offset = check_bounds(self.len, offset, N)?;
        guest.write(offset, &value.to_mem_bytes())
    }

    pub fn get_i32<G: Guest + ?Sized>(&self, guest: &mut G, offset: u32) -> Result<i32> {
        self.get::<4, i32, G>(guest, offset)
    }

    pub fn set_i32<G: Guest + ?Sized>(&self, guest: &mut G, offset: u32, value: i32) -> Result<()> {
        self.set::<4, i32, G>(guest, offset, value)
    }

    pub fn get_f64<G: Guest + ?Sized>(&self, guest: &mut G, offset: u32) -> Result<f64> {
        self.get::<8, f64, G>(guest, offset)
    }

    pub fn set_f64<G: Guest + ?Sized>(&self, guest: &mut G, offset: u32, value: f64) -> Result<()> {
        self.set::<8, f64, G>(guest, offset, value)
    }
}

#[inline]
fn check_bounds(max: usize, offset: u32, len: usize) -> Result<usize> {
    let offset = offset as usize;
    match offset.checked_add(len) {
        Some(end) if end <= max => Ok(offset),
        _ => Err(Error::OutOfBounds { offset, len, max }),
    }
}

/// The address `delta` bytes past `base`, which a 32-bit memory must be able to hold
#[inline]
pub fn offset_by(base: u32, delta: u32) -> Result<u32> {
    base.checked_add(delta).ok_or(Error::OutOfBounds { offset: base as usize, len: delta as usize, max: u32::MAX as usize })
}

/// The views the marshaling layer keeps over one module's memory
#[derive(Debug, Default)]
pub struct MemoryViews {
    bytes: ViewCache<ByteView>,
    words: ViewCache<WordView>,
}

impl MemoryViews {
    pub fn new() -> Self {
        Self::default()
    }

    /// A byte view over the live buffer
    pub fn bytes<G: Guest + ?Sized>(&self, guest: &mut G) -> Result<ByteView> {
        self.bytes.get(guest)
    }

    /// A word view over the live buffer
    pub fn words<G: Guest + ?Sized>(&self, guest: &mut G) -> Result<WordView> {
        self.words.get(guest)
    }

    /// Forget both views, e.g. after a new module was instantiated
    pub fn invalidate(&self) {
        self.bytes.invalidate();
        self.words.invalidate();
    }

    /// How often each view has been derived, as `(bytes, words)`
    pub fn rebuilds(&self) -> (u64, u64) {
        (self.bytes.rebuilds(), self.words.rebuilds())
    }
}

/// A trait for types that can be stored in memory
pub trait MemStorable<const N: usize> {
    /// Little-endian bytes of the value
    fn to_mem_bytes(self) -> [u8; N];
}

/// A trait for types that can be loaded from memory
pub trait MemLoadable<const N: usize>: Sized + Copy {
    /// Read the value from little-endian bytes
    fn from_le_bytes(bytes: [u8; N]) -> Self;
}

macro_rules! impl_mem_traits {
    ($($type:ty, $size:expr),*) => {
        $(
            impl MemLoadable<$size> for $type {
                #[inline(always)]
                fn from_le_bytes(bytes: [u8; $size]) -> Self {
                    <$type>::from_le_bytes(bytes)
                }
            }

            impl MemStorable<$size> for $type {
                #[inline(always)]
                fn to_mem_bytes(self) -> [u8; $size] {
                    self.to_le_bytes()
                }
            }
        )*
    }
}

impl_mem_traits!(u8, 1, i8, 1, u16, 2, i16, 2, u32, 4, i32, 4, f32, 4, u64, 8, i64, 8, f64, 8);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guest::PAGE_SIZE;
    use crate::testing::MockGuest;

    #[test]
    fn view_reflects_growth() {
        let mut guest = MockGuest::new(1);
        let views = MemoryViews::new();

        let before = views.bytes(&mut guest).unwrap();
        assert_eq!(before.len(), PAGE_SIZE);

        guest.grow(2);
        let after = views.bytes(&mut guest).unwrap();
        assert_eq!(after.len(), 3 * PAGE_SIZE);
        assert_eq!(views.rebuilds().0, 2);
    }

    #[test]
    fn view_is_reused_while_buffer_is_unchanged() {
        let mut guest = MockGuest::new(1);
        let views = MemoryViews::new();

        for _ in 0..5 {
            views.bytes(&mut guest).unwrap();
            views.words(&mut guest).unwrap();
        }
        assert_eq!(views.rebuilds(), (1, 1));
    }

    #[test]
    fn word_view_rebuilds_when_detached() {
        let mut guest = MockGuest::new(1);
        let views = MemoryViews::new();

        views.words(&mut guest).unwrap();
        guest.detached = true;
        views.words(&mut guest).unwrap();
        views.bytes(&mut guest).unwrap();
        views.bytes(&mut guest).unwrap();
        assert_eq!(views.rebuilds(), (1, 2));
    }

    #[test]
    fn stale_view_rejects_access_past_its_length() {
        let mut guest = MockGuest::new(1);
        let views = MemoryViews::new();
        let stale = views.bytes(&mut guest).unwrap();
        guest.grow(1);

        let offset = PAGE_SIZE as u32 + 16;
        assert!(matches!(stale.write(&mut guest, offset, b"abc"), Err(Error::OutOfBounds { .. })));
        views.bytes(&mut guest).unwrap().write(&mut guest, offset, b"abc").unwrap();
        assert_eq!(guest.memory[offset as usize..offset as usize + 3], *b"abc");
    }

    #[test]
    fn words_are_little_endian() {
        let mut guest = MockGuest::new(1);
        let views = MemoryViews::new();
        let words = views.words(&mut guest).unwrap();

        words.set_i32(&mut guest, 16, 0x0102_0304).unwrap();
        assert_eq!(guest.memory[16..20], [4, 3, 2, 1]);
        assert_eq!(words.get_i32(&mut guest, 16).unwrap(), 0x0102_0304);

        words.set_f64(&mut guest, 24, 1.5).unwrap();
        assert_eq!(words.get_f64(&mut guest, 24).unwrap(), 1.5);
        assert!(words.get_i32(&mut guest, PAGE_SIZE as u32 - 2).is_err());
    }

    #[test]
    fn offsets_never_wrap() {
        assert_eq!(offset_by(16, 8).unwrap(), 24);
        assert!(matches!(offset_by(u32::MAX - 3, 8), Err(Error::OutOfBounds { offset, len: 8, .. }) if offset == u32::MAX as usize - 3));
    }
}
