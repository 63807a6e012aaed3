use std::{
    alloc::{self, Layout},
    collections::BTreeMap,
    ptr::NonNull,
};

use crate::{Engine, Error, Word};

/// Host memory handed out by `xalloc`, outside the arena.
///
/// Every live block is recorded by base address. The pointer words only
/// touch bytes that lie entirely inside one recorded block, and blocks still
/// live when the engine is dropped are released then.
#[derive(Debug, Default)]
pub(crate) struct Heap {
    blocks: BTreeMap<usize, Block>,
}

#[derive(Debug)]
struct Block {
    ptr: NonNull<u8>,
    size: usize,
}

// SAFETY: the heap exclusively owns its blocks; nothing else holds the
// pointers except as plain integers on the engine's stacks.
unsafe impl Send for Heap {}

impl Heap {
    const ALIGN: usize = 8;

    fn layout(size: usize) -> Option<Layout> {
        Layout::from_size_align(size.max(1), Self::ALIGN).ok()
    }

    /// Allocate `size` zeroed bytes. Running out of memory aborts the process.
    ///
    /// Returns `None` only when `size` is too large to describe.
    fn alloc(&mut self, size: usize) -> Option<NonNull<u8>> {
        let layout = Self::layout(size)?;
        // SAFETY: `layout` never has a zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        self.blocks.insert(ptr.as_ptr() as usize, Block { ptr, size });
        Some(ptr)
    }

    fn free(&mut self, addr: usize) -> bool {
        let Some(block) = self.blocks.remove(&addr) else {
            return false;
        };
        Self::release(block);
        true
    }

    fn release(block: Block) {
        if let Some(layout) = Self::layout(block.size) {
            // SAFETY: `block` came from `alloc` with this same layout and
            // has just been removed from the registry.
            unsafe { alloc::dealloc(block.ptr.as_ptr(), layout) }
        }
    }

    /// Pointer to `len` bytes at `addr`, if they lie inside one live block.
    fn locate(&self, addr: usize, len: usize) -> Option<*mut u8> {
        let (&base, block) = self.blocks.range(..=addr).next_back()?;
        let offset = addr - base;
        let end = offset.checked_add(len)?;
        if end > block.size {
            return None;
        }
        // SAFETY: `offset + len` is within the block.
        Some(unsafe { block.ptr.as_ptr().add(offset) })
    }

    pub(crate) fn live_blocks(&self) -> usize {
        self.blocks.len()
    }
}

impl Drop for Heap {
    fn drop(&mut self) {
        let blocks = core::mem::take(&mut self.blocks);
        if !blocks.is_empty() {
            tracing::debug!(live = blocks.len(), "releasing heap blocks");
        }
        blocks.into_values().for_each(Self::release);
    }
}

impl<T: 'static> Engine<T> {
    fn heap_ptr(&self, raw: Word, len: usize) -> Result<*mut u8, Error> {
        let addr = usize::try_from(raw.as_u64()).map_err(|_| Error::BadHeapPointer(raw))?;
        self.heap
            .locate(addr, len)
            .ok_or(Error::BadHeapPointer(raw))
    }

    /// Blocks handed out by `xalloc` and not yet freed.
    pub fn heap_blocks(&self) -> usize {
        self.heap.live_blocks()
    }

    /// `( size -- ptr )`
    pub fn xalloc(&mut self) -> Result<(), Error> {
        let raw = self.pop()?;
        let size = usize::try_from(raw.as_i64()).map_err(|_| Error::BadAllocSize(raw))?;
        let ptr = self.heap.alloc(size).ok_or(Error::BadAllocSize(raw))?;
        tracing::trace!(size, ?ptr, "xalloc");
        self.push(Word::ptr(ptr.as_ptr()))?;
        self.next()
    }

    /// `( ptr -- )`. Freeing a null pointer does nothing.
    pub fn xfree(&mut self) -> Result<(), Error> {
        let raw = self.pop()?;
        if !raw.is_zero() {
            let addr = usize::try_from(raw.as_u64()).map_err(|_| Error::BadHeapPointer(raw))?;
            if !self.heap.free(addr) {
                return Err(Error::BadHeapPointer(raw));
            }
        }
        self.next()
    }

    pub fn ptr_fetch(&mut self) -> Result<(), Error> {
        let raw = self.pop()?;
        let ptr = self.heap_ptr(raw, 8)?;
        // SAFETY: eight bytes at `ptr` lie inside a live block.
        let val = unsafe { ptr.cast::<u64>().read_unaligned() };
        self.push(Word::uint(val))?;
        self.next()
    }

    /// `( w ptr -- )`
    pub fn ptr_store(&mut self) -> Result<(), Error> {
        let raw = self.pop()?;
        let val = self.pop()?;
        let ptr = self.heap_ptr(raw, 8)?;
        // SAFETY: eight bytes at `ptr` lie inside a live block.
        unsafe { ptr.cast::<u64>().write_unaligned(val.as_u64()) };
        self.next()
    }

    pub fn ptr_byte_fetch(&mut self) -> Result<(), Error> {
        let raw = self.pop()?;
        let ptr = self.heap_ptr(raw, 1)?;
        // SAFETY: the byte at `ptr` lies inside a live block.
        let val = unsafe { ptr.read() };
        self.push(Word::data(i64::from(val)))?;
        self.next()
    }

    /// `( c ptr -- )`
    pub fn ptr_byte_store(&mut self) -> Result<(), Error> {
        let raw = self.pop()?;
        let val = self.pop()?.as_i64();
        let ptr = self.heap_ptr(raw, 1)?;
        // SAFETY: the byte at `ptr` lies inside a live block.
        unsafe { ptr.write(val as u8) };
        self.next()
    }
}
