use core::fmt;

use crate::{layout::LayoutError, Error};

/// A contiguous byte region with a capacity and a fill watermark.
///
/// Only the first `fill` bytes hold valid data. Cloning copies exactly those
/// bytes into a fresh region of the same capacity; [`MemoryArena::take`]
/// moves the storage out and leaves an empty arena behind.
///
/// The arena hands out its valid prefix as a slice and nothing else: there is
/// no cell accessor here. Addressing and bounds discipline belong to the
/// [`Engine`](crate::Engine).
pub struct MemoryArena {
    memory: Box<[u8]>,
    fill: usize,
}

impl MemoryArena {
    pub const DEFAULT_CAPACITY: usize = 16384;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            memory: vec![0u8; capacity].into_boxed_slice(),
            fill: 0,
        }
    }

    /// An arena that owns no storage at all.
    pub fn empty() -> Self {
        Self {
            memory: Box::default(),
            fill: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    #[inline]
    pub fn fill(&self) -> usize {
        self.fill
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fill == 0
    }

    /// The valid prefix.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.memory[..self.fill]
    }

    #[inline]
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.memory[..self.fill]
    }

    /// Move the fill watermark. Bytes between the old and new watermark keep
    /// whatever the storage held (zeroes for fresh storage).
    pub fn commit(&mut self, fill: usize) -> Result<(), Error> {
        if fill > self.capacity() {
            return Err(LayoutError::CapacityExceeded {
                requested: fill,
                capacity: self.capacity(),
            }
            .into());
        }
        self.fill = fill;
        Ok(())
    }

    pub fn append(&mut self, bytes: &[u8]) -> Result<(), Error> {
        let start = self.fill;
        let end = start + bytes.len();
        self.commit(end)?;
        self.memory[start..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn clear(&mut self) {
        self.fill = 0;
    }

    /// Reallocate to `capacity` bytes, keeping the valid prefix.
    ///
    /// Shrinking below `fill` truncates the valid prefix.
    pub fn resize(&mut self, capacity: usize) {
        let mut memory = vec![0u8; capacity].into_boxed_slice();
        let keep = self.fill.min(capacity);
        memory[..keep].copy_from_slice(&self.memory[..keep]);
        self.memory = memory;
        self.fill = keep;
    }

    /// Take ownership of the storage, leaving `self` with no storage and a
    /// capacity and fill of zero.
    pub fn take(&mut self) -> MemoryArena {
        core::mem::replace(self, MemoryArena::empty())
    }
}

impl Default for MemoryArena {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MemoryArena {
    fn clone(&self) -> Self {
        let mut new = MemoryArena::with_capacity(self.capacity());
        new.memory[..self.fill].copy_from_slice(self.as_bytes());
        new.fill = self.fill;
        new
    }

    /// Copy-assignment: reuse the existing storage when it can hold the
    /// source's valid prefix, otherwise grow to the source's capacity.
    fn clone_from(&mut self, source: &Self) {
        if source.fill > self.capacity() {
            *self = source.clone();
            return;
        }
        self.memory[..source.fill].copy_from_slice(source.as_bytes());
        self.fill = source.fill;
    }
}

impl fmt::Debug for MemoryArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryArena")
            .field("capacity", &self.capacity())
            .field("fill", &self.fill)
            .finish()
    }
}

#[cfg(test)]
mod test {
    use super::MemoryArena;

    #[test]
    fn starts_empty() {
        let arena = MemoryArena::new();
        assert_eq!(arena.capacity(), MemoryArena::DEFAULT_CAPACITY);
        assert_eq!(arena.fill(), 0);
        assert!(arena.as_bytes().is_empty());
    }

    #[test]
    fn commit_respects_capacity() {
        let mut arena = MemoryArena::with_capacity(16);
        assert!(arena.commit(16).is_ok());
        assert!(arena.commit(17).is_err());
        assert_eq!(arena.fill(), 16);
    }

    #[test]
    fn clone_is_independent() {
        let mut a = MemoryArena::with_capacity(64);
        a.append(b"hello").unwrap();

        let mut b = a.clone();
        assert_eq!(b.capacity(), 64);
        assert_eq!(b.as_bytes(), b"hello");

        b.as_bytes_mut()[0] = b'j';
        assert_eq!(b.as_bytes(), b"jello");
        assert_eq!(a.as_bytes(), b"hello");
    }

    #[test]
    fn clone_from_reuses_or_grows() {
        let mut src = MemoryArena::with_capacity(64);
        src.append(&[7u8; 40]).unwrap();

        let mut roomy = MemoryArena::with_capacity(48);
        roomy.clone_from(&src);
        assert_eq!(roomy.capacity(), 48);
        assert_eq!(roomy.as_bytes(), &[7u8; 40][..]);

        let mut small = MemoryArena::with_capacity(8);
        small.clone_from(&src);
        assert_eq!(small.capacity(), 64);
        assert_eq!(small.fill(), 40);
    }

    #[test]
    fn take_leaves_source_empty() {
        let mut a = MemoryArena::with_capacity(32);
        a.append(b"abc").unwrap();
        let before = a.as_bytes().as_ptr();

        let b = a.take();
        assert_eq!(a.capacity(), 0);
        assert_eq!(a.fill(), 0);
        assert_eq!(b.capacity(), 32);
        assert_eq!(b.as_bytes(), b"abc");
        // the storage itself moved, it was not copied
        assert_eq!(b.as_bytes().as_ptr(), before);
    }

    #[test]
    fn resize_keeps_prefix() {
        let mut a = MemoryArena::with_capacity(4);
        a.append(b"abcd").unwrap();
        a.resize(12);
        assert_eq!(a.capacity(), 12);
        assert_eq!(a.as_bytes(), b"abcd");
        a.resize(2);
        assert_eq!(a.as_bytes(), b"ab");
    }
}
