use std::io::{self, ErrorKind, Read};

use crate::arena::MemoryArena;

/// A read buffer backed by a [`MemoryArena`].
///
/// Each [`IoBuffer::read`] replaces the buffer contents with the next chunk
/// of the source, leaving the arena's fill at the number of bytes read.
#[derive(Debug)]
pub struct IoBuffer<R> {
    inner: R,
    buf: MemoryArena,
}

impl<R: Read> IoBuffer<R> {
    pub fn new(inner: R) -> Self {
        Self::with_capacity(inner, MemoryArena::DEFAULT_CAPACITY)
    }

    pub fn with_capacity(inner: R, capacity: usize) -> Self {
        Self {
            inner,
            buf: MemoryArena::with_capacity(capacity),
        }
    }

    /// Fill the buffer with up to `capacity` bytes. Returns the number of
    /// bytes read, zero at end of input.
    pub fn read(&mut self) -> io::Result<usize> {
        let capacity = self.buf.capacity();
        self.buf
            .commit(capacity)
            .map_err(|e| io::Error::new(ErrorKind::Other, e))?;
        loop {
            match self.inner.read(self.buf.as_bytes_mut()) {
                Ok(n) => {
                    self.buf
                        .commit(n)
                        .map_err(|e| io::Error::new(ErrorKind::Other, e))?;
                    return Ok(n);
                }
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    self.buf.clear();
                    return Err(e);
                }
            }
        }
    }
}

impl<R> IoBuffer<R> {
    /// Bytes from the last read.
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.buf.as_bytes()
    }

    #[inline]
    pub fn fill(&self) -> usize {
        self.buf.fill()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}
